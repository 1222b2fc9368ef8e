//! Per-render-context memoization (§4.D).
//!
//! `memo(node)` returns a behaviorally equivalent `Node` guaranteed
//! idempotent per render context: an element's underlying render is invoked
//! at most once per context, an eventual's resolved value is itself
//! memoized, and a lazy producer replays its buffered prefix to late
//! joiners instead of re-driving the underlying stream.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex as AsyncMutex, OnceCell};
use tokio_util::sync::CancellationToken;

use crate::context::{ContextId, RenderContext};
use crate::element::{Element, Tag};
use crate::error::RenderError;
use crate::node::{BoxProducerStream, Eventual, LazyNode, LazyState, Node};

/// Returns a `Node` behaviorally equivalent to `node` but idempotent per
/// render context (§4.D). Recurses structurally over scalars and sequences;
/// wraps elements, eventuals and lazy producers in their respective caching
/// combinators. `memo(memo(x))` is observationally equal to `memo(x)`: each
/// wrapper carries a flag that short-circuits re-wrapping.
pub fn memo(node: Node) -> Node {
    match node {
        Node::Leaf(_) | Node::AppendOnly => node,
        Node::Sequence(children) => Node::Sequence(children.into_iter().map(memo).collect()),
        Node::Element(el) => {
            if matches!(el.tag(), Tag::Memo(_)) {
                Node::Element(el)
            } else {
                Node::Element(wrap_element(el))
            }
        }
        Node::Eventual(ev) => Node::Eventual(memoize_eventual(ev)),
        Node::Lazy(lazy) => Node::Lazy(memoize_lazy(lazy)),
    }
}

fn wrap_element(inner: Element) -> Element {
    let tag = Tag::Memo(Arc::new(MemoizedElement::new(inner)));
    crate::element::create_element(tag, crate::element::Props::new(), vec![])
}

/// Per-context weak-style cache for one element's one-level expansion. Not
/// a true weak map (Rust has no convenient weak-keyed `HashMap`); entries
/// live as long as this `MemoizedElement` does, which in practice is the
/// lifetime of the element itself (§9: "in languages without weak maps,
/// attach the cache to the context and discard with it" — here we attach it
/// to the element side of that pair instead, which is dropped at the same
/// point for any tree that doesn't retain the element past its one render).
pub struct MemoizedElement {
    inner: Element,
    #[allow(clippy::type_complexity)]
    cache: std::sync::Mutex<HashMap<ContextId, Arc<OnceCell<Result<(Node, RenderContext), RenderError>>>>>,
}

impl MemoizedElement {
    fn new(inner: Element) -> Self {
        MemoizedElement {
            inner,
            cache: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Resolves the wrapped element's one-level expansion under `ctx`,
    /// invoking the underlying render exactly once regardless of how many
    /// concurrent or sequential callers observe it. Failures are cached too
    /// (§7): a retrier must construct a fresh element outside the cache.
    pub(crate) async fn resolve(
        &self,
        ctx: &RenderContext,
        signal: CancellationToken,
    ) -> Result<(Node, RenderContext), RenderError> {
        let cell = {
            let mut guard = self.cache.lock().expect("memo cache poisoned");
            guard
                .entry(ctx.id())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };
        let inner = self.inner.clone();
        let ctx = ctx.clone();
        cell.get_or_init(|| async move {
            match crate::engine::expand_element_once(&inner, &ctx, signal) {
                Ok((node, inner_ctx)) => Ok((memo(node), inner_ctx)),
                Err(e) => Err(e),
            }
        })
        .await
        .clone()
    }
}

fn memoize_eventual(ev: Eventual) -> Eventual {
    if ev.memoized {
        return ev;
    }
    let inner = ev.fut.clone();
    let mut memoized = Eventual::new(async move {
        let node = inner.await?;
        Ok(memo(node))
    });
    memoized.memoized = true;
    memoized
}

fn memoize_lazy(lazy: LazyNode) -> LazyNode {
    if lazy.is_memoized() {
        return lazy;
    }
    match Arc::try_unwrap(lazy.0) {
        Ok(LazyState::Fresh(slot)) => {
            let stream = slot
                .into_inner()
                .expect("memo() called on a lazy producer that was already consumed");
            LazyNode(Arc::new(LazyState::Memoized(Arc::new(MemoizedProducer::new(stream)))))
        }
        Ok(LazyState::Memoized(producer)) => LazyNode(Arc::new(LazyState::Memoized(producer))),
        Err(shared) => {
            // Another clone of this `Arc<LazyState>` is held elsewhere (the
            // node was itself already shared, e.g. cloned out of a
            // sequence). We cannot take ownership of its stream without
            // racing that other holder, so memoizing a second time is a
            // no-op: the node already behaves like a single shared producer
            // for every clone that observes it.
            LazyNode(shared)
        }
    }
}

/// Backing store for a memoized lazy producer (§4.D, §5). Buffers every
/// frame the underlying stream has produced so late joiners can replay the
/// prefix before awaiting live frames; concurrent consumers serialize on the
/// same internal lock, so exactly one underlying `next` is ever outstanding.
pub struct MemoizedProducer {
    state: AsyncMutex<ProducerState>,
}

struct ProducerState {
    stream: Option<BoxProducerStream>,
    frames: Vec<Result<Node, RenderError>>,
}

impl MemoizedProducer {
    fn new(stream: BoxProducerStream) -> Self {
        MemoizedProducer {
            state: AsyncMutex::new(ProducerState {
                stream: Some(stream),
                frames: Vec::new(),
            }),
        }
    }

    /// Returns the frame at `index`, pulling the underlying stream if it
    /// hasn't been observed yet. Returns `None` once the producer is
    /// exhausted and `index` is past the end.
    pub(crate) async fn frame_at(&self, index: usize) -> Option<Result<Node, RenderError>> {
        loop {
            use futures_util::StreamExt;
            let mut guard = self.state.lock().await;
            if index < guard.frames.len() {
                return Some(guard.frames[index].clone());
            }
            let Some(stream) = guard.stream.as_mut() else {
                return None;
            };
            // Held across the await: this is what serializes concurrent
            // consumers onto a single outstanding `next` (§5 backpressure).
            match stream.next().await {
                Some(item) => guard.frames.push(item),
                None => {
                    guard.stream = None;
                    return None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{create_render_context, RenderContextOptions};
    use crate::element::{create_element, Props, Tag};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(flavor = "current_thread")]
    async fn memoized_element_invokes_component_once_per_context() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let el = create_element(
            Tag::component(move |_props, _cx| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                Ok(Node::text("hi"))
            }),
            Props::new(),
            vec![],
        );
        let memoized = memo(Node::Element(el));
        let ctx = create_render_context(RenderContextOptions::new());

        for _ in 0..7 {
            let text = crate::engine::render(memoized.clone(), &ctx, crate::options::RenderOptions::new())
                .await
                .unwrap()
                .into_text()
                .unwrap();
            assert_eq!(text, "hi");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn memo_of_memo_does_not_add_another_layer() {
        let el = create_element(Tag::Fragment, Props::new(), vec![Node::text("x")]);
        let once = memo(Node::Element(el));
        let twice = memo(once.clone());
        match (&once, &twice) {
            (Node::Element(a), Node::Element(b)) => assert_eq!(a, b),
            _ => panic!("expected elements"),
        }
    }
}
