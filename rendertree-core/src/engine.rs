//! The streaming render engine (§4.C): structural recursion over a [`Node`]
//! with cooperative concurrency, producing a monotonic sequence of frames.
//!
//! Everything below composes around one recursive primitive, [`render_node`],
//! which always yields the *current cumulative value* of a sub-tree (full
//! text/segments, never a delta) no matter how deep it sits in the tree.
//! [`render_stream`] is the only place deltas get computed, by diffing
//! consecutive cumulative frames — valid because every producer discipline
//! this engine honors (plain growth, or the `APPEND_ONLY` replay buffer it
//! builds itself) only ever grows that cumulative value, never rewrites it.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::context::{ComponentContext, RenderContext};
use crate::element::{Element, Tag};
use crate::error::{ErrorCode, RenderError};
use crate::memo::MemoizedProducer;
use crate::node::{BoxProducerStream, LazyState, Node};
use crate::options::{OptionsInner, RenderOptions};

/// One interleaved unit of a rendered sub-tree: a text run, or — when a stop
/// predicate arrested expansion — an opaque, un-rendered element (§4.C).
#[derive(Clone, Debug, PartialEq)]
pub enum Segment {
    Text(String),
    Element(Element),
}

/// An ordered run of [`Segment`]s. With no stop predicate in play this is
/// always a single coalesced `Text` segment.
pub type Segments = Vec<Segment>;

fn coalesce(segments: Segments) -> Segments {
    let mut out: Segments = Vec::with_capacity(segments.len());
    for seg in segments {
        match (out.last_mut(), &seg) {
            (Some(Segment::Text(prev)), Segment::Text(next)) => prev.push_str(next),
            _ => out.push(seg),
        }
    }
    out
}

/// `Some(text)` iff `segments` contains no opaque elements.
fn plain_text(segments: &Segments) -> Option<String> {
    let mut out = String::new();
    for seg in segments {
        match seg {
            Segment::Text(t) => out.push_str(t),
            Segment::Element(_) => return None,
        }
    }
    Some(out)
}

/// The frame shape yielded by [`render_stream`]: plain text (growing in
/// cumulative mode, a delta in append-only mode) when no stop predicate is
/// in effect, or the full interleaved sequence of text runs and opaque
/// elements when one is (§4.C).
#[derive(Clone, Debug)]
pub enum RenderFrame {
    Text(String),
    Segments(Segments),
}

/// The final value [`render`] resolves to — the same two shapes as
/// [`RenderFrame`], taken once rendering has run to completion.
#[derive(Clone, Debug)]
pub enum RenderOutput {
    Text(String),
    Segments(Segments),
}

impl RenderOutput {
    fn from_segments(segments: Segments) -> Self {
        match plain_text(&segments) {
            Some(text) => RenderOutput::Text(text),
            None => RenderOutput::Segments(segments),
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            RenderOutput::Text(t) => Some(t),
            RenderOutput::Segments(_) => None,
        }
    }

    pub fn into_segments(self) -> Segments {
        match self {
            RenderOutput::Text(t) => vec![Segment::Text(t)],
            RenderOutput::Segments(s) => s,
        }
    }
}

pub(crate) type BoxSegStream = Pin<Box<dyn Stream<Item = Result<Segments, RenderError>> + Send>>;
pub(crate) type Opts = Arc<OptionsInner>;

fn check_cancelled(opts: &Opts) -> Result<(), RenderError> {
    if opts.signal.is_cancelled() {
        Err(RenderError::cancelled())
    } else {
        Ok(())
    }
}

/// Renders `node` to completion, returning the concatenation of all frames
/// (§4.C).
pub async fn render(
    node: Node,
    ctx: &RenderContext,
    opts: RenderOptions,
) -> Result<RenderOutput, RenderError> {
    let inner = Arc::new(opts.into_inner());
    let segments = render_to_segments(node, ctx.clone(), inner).await?;
    Ok(RenderOutput::from_segments(segments))
}

/// Renders `node` incrementally. Each yielded value is either the running
/// complete string (cumulative mode) or the delta to append (append-only
/// mode), consistently for the duration of the stream. The mode is decided
/// once, from whether `node`'s root is recognized as append-only or
/// `opts.append_only` forces it (§4.C).
pub fn render_stream(
    node: Node,
    ctx: &RenderContext,
    opts: RenderOptions,
) -> impl Stream<Item = Result<RenderFrame, RenderError>> + Send + 'static {
    let forced = opts.is_append_only_forced();
    let ctx = ctx.clone();
    let inner = Arc::new(opts.into_inner());
    async_stream::stream! {
        let root_flag = Arc::new(AtomicBool::new(false));
        let mut stream = render_node(node, ctx, inner, Some(root_flag.clone()));
        let mut prev_text = String::new();
        let mut emitted_any = false;

        while let Some(item) = stream.next().await {
            let segments = match item {
                Ok(s) => s,
                Err(e) => { yield Err(e); return; }
            };
            let append_only_now = forced || root_flag.load(Ordering::SeqCst);
            match (append_only_now, plain_text(&segments)) {
                (true, Some(full_text)) => {
                    if let Some(delta) = full_text.strip_prefix(prev_text.as_str()) {
                        let delta = delta.to_string();
                        prev_text = full_text;
                        if !delta.is_empty() || !emitted_any {
                            emitted_any = true;
                            yield Ok(RenderFrame::Text(delta));
                        }
                    } else {
                        log::warn!("append-only producer did not grow its previous value monotonically; surfacing the full value instead of a delta");
                        prev_text = full_text.clone();
                        emitted_any = true;
                        yield Ok(RenderFrame::Text(full_text));
                    }
                }
                (false, Some(full_text)) => {
                    emitted_any = true;
                    yield Ok(RenderFrame::Text(full_text));
                }
                (_, None) => {
                    emitted_any = true;
                    yield Ok(RenderFrame::Segments(segments));
                }
            }
        }
    }
}

async fn render_to_segments(node: Node, ctx: RenderContext, opts: Opts) -> Result<Segments, RenderError> {
    let mut stream = render_node(node, ctx, opts, None);
    let mut last = Segments::new();
    while let Some(item) = stream.next().await {
        last = item?;
    }
    Ok(last)
}

/// Resolves a non-memoized element's tag by one level: a component call, a
/// Fragment pass-through, or a Provider's context derivation (§4.C). `Memo`
/// tags never reach here — they're resolved through
/// [`crate::memo::MemoizedElement::resolve`], which calls back into this
/// function on the cache's first fill.
pub(crate) fn expand_element_once(
    element: &Element,
    ctx: &RenderContext,
    signal: CancellationToken,
) -> Result<(Node, RenderContext), RenderError> {
    if signal.is_cancelled() {
        return Err(RenderError::cancelled());
    }
    match element.tag() {
        Tag::Fragment => Ok((element.props().children(), ctx.clone())),
        Tag::Provider(provider) => {
            let child_ctx = ctx.push_context_raw(provider.key_id, provider.value.clone());
            Ok((element.props().children(), child_ctx))
        }
        Tag::Component(component) => {
            let cc = ComponentContext::new(ctx.clone(), signal);
            let props = element.props().clone();
            let label = element.label();
            let component = component.clone();
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
                component.call(props, cc)
            }));
            match outcome {
                Ok(Ok(node)) => Ok((node, ctx.clone())),
                Ok(Err(e)) => Err(e.with_element(label)),
                Err(payload) => {
                    Err(RenderError::internal(ErrorCode::ComponentThrew, panic_message(&payload))
                        .with_element(label))
                }
            }
        }
        Tag::Memo(_) => unreachable!(
            "Memo tag is resolved via MemoizedElement::resolve before reaching expand_element_once"
        ),
    }
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "component panicked with a non-string payload".to_string()
    }
}

/// Structural recursion over a [`Node`] (§4.C algorithm). `root_flag`, when
/// present, is propagated through every single-child delegation (element
/// expansion, eventual resolution) so that whichever `Lazy` producer
/// ultimately sits at the root of a transparent chain can report whether it
/// declared itself append-only; it is finalized to `false` the moment the
/// node is no longer a single-child delegation (a sequence, or a
/// stop-arrested element).
pub(crate) fn render_node(
    node: Node,
    ctx: RenderContext,
    opts: Opts,
    root_flag: Option<Arc<AtomicBool>>,
) -> BoxSegStream {
    Box::pin(async_stream::stream! {
        match node {
            Node::Leaf(leaf) => {
                yield Ok(vec![Segment::Text(leaf.to_string())]);
            }
            Node::AppendOnly => {
                log::warn!("APPEND_ONLY sentinel encountered outside a lazy producer; ignoring it");
                yield Ok(Segments::new());
            }
            Node::Sequence(children) => {
                if let Some(flag) = &root_flag {
                    flag.store(false, Ordering::SeqCst);
                }
                let child_streams: Vec<BoxSegStream> = children
                    .into_iter()
                    .map(|child| render_node(child, ctx.clone(), opts.clone(), None))
                    .collect();
                let mut seq = SequenceStream::new(child_streams);
                while let Some(item) = seq.next().await {
                    match item {
                        Ok(seg) => yield Ok(seg),
                        Err(e) => { yield Err(e); return; }
                    }
                }
            }
            Node::Element(el) => {
                if let Err(e) = check_cancelled(&opts) {
                    yield Err(e);
                    return;
                }
                if let Some(stop) = opts.stop.as_ref() {
                    if stop(&el) {
                        if let Some(flag) = &root_flag {
                            flag.store(false, Ordering::SeqCst);
                        }
                        log::trace!("stop predicate arrested expansion of {}", el.label());
                        yield Ok(vec![Segment::Element(el)]);
                        return;
                    }
                }
                let expansion: Result<(Node, RenderContext), RenderError> = if let Tag::Memo(m) = el.tag() {
                    log::trace!("resolving memoized element {}", el.label());
                    m.resolve(&ctx, opts.signal.clone()).await
                } else {
                    expand_element_once(&el, &ctx, opts.signal.clone())
                };
                let (inner_node, inner_ctx) = match expansion {
                    Ok(pair) => pair,
                    Err(e) => { yield Err(e); return; }
                };
                let mut inner = render_node(inner_node, inner_ctx, opts.clone(), root_flag.clone());
                while let Some(item) = inner.next().await {
                    match item {
                        Ok(seg) => yield Ok(seg),
                        Err(e) => { yield Err(e); return; }
                    }
                }
            }
            Node::Eventual(ev) => {
                if let Err(e) = check_cancelled(&opts) {
                    yield Err(e);
                    return;
                }
                yield Ok(Segments::new());
                let resolved = match ev.resolve().await {
                    Ok(node) => node,
                    Err(e) => { yield Err(e); return; }
                };
                if let Err(e) = check_cancelled(&opts) {
                    yield Err(e);
                    return;
                }
                let mut inner = render_node(resolved, ctx.clone(), opts.clone(), root_flag.clone());
                while let Some(item) = inner.next().await {
                    match item {
                        Ok(seg) => yield Ok(seg),
                        Err(e) => { yield Err(e); return; }
                    }
                }
            }
            Node::Lazy(lazy) => {
                if let Err(e) = check_cancelled(&opts) {
                    yield Err(e);
                    return;
                }
                let source = match &*lazy.0 {
                    LazyState::Fresh(slot) => {
                        let mut guard = slot.lock().await;
                        match guard.take() {
                            Some(stream) => FrameSource::Direct(stream),
                            None => {
                                yield Err(RenderError::user(
                                    ErrorCode::LazyProducerAlreadyConsumed,
                                    "lazy producer has only one consumer; wrap it with memo() to share it",
                                ));
                                return;
                            }
                        }
                    }
                    LazyState::Memoized(producer) => FrameSource::Replay(producer.clone(), 0),
                };
                let mut driver = drive_producer(source, ctx.clone(), opts.clone(), root_flag.clone());
                while let Some(item) = driver.next().await {
                    match item {
                        Ok(seg) => yield Ok(seg),
                        Err(e) => { yield Err(e); return; }
                    }
                }
            }
        }
    })
}

/// Where a lazy producer's items come from: a fresh, single-consumer stream,
/// or a memoized producer's replay buffer (§4.D).
enum FrameSource {
    Direct(BoxProducerStream),
    Replay(Arc<MemoizedProducer>, usize),
}

impl FrameSource {
    async fn next(&mut self) -> Option<Result<Node, RenderError>> {
        match self {
            FrameSource::Direct(stream) => stream.next().await,
            FrameSource::Replay(producer, index) => {
                let item = producer.frame_at(*index).await;
                if item.is_some() {
                    *index += 1;
                }
                item
            }
        }
    }
}

/// Drives a lazy producer's frames (§4.C.6, §4.C edge cases). The first
/// yielded item decides the discipline for the rest of the stream: the
/// `APPEND_ONLY` sentinel switches into delta-accumulation, anything else is
/// treated as the first full value under the default (replace) discipline.
fn drive_producer(
    mut source: FrameSource,
    ctx: RenderContext,
    opts: Opts,
    root_flag: Option<Arc<AtomicBool>>,
) -> BoxSegStream {
    Box::pin(async_stream::stream! {
        if let Err(e) = check_cancelled(&opts) {
            yield Err(e);
            return;
        }
        let mut append_only = false;
        let mut cumulative: Segments = Vec::new();

        match source.next().await {
            None => {
                // A lazy producer that yields no values before returning
                // behaves as if it yielded the empty string (§4.C edge cases).
                yield Ok(Segments::new());
                return;
            }
            Some(Err(e)) => { yield Err(e); return; }
            Some(Ok(Node::AppendOnly)) => {
                append_only = true;
                if let Some(flag) = &root_flag {
                    flag.store(true, Ordering::SeqCst);
                }
                log::debug!("lazy producer declared itself append-only");
            }
            Some(Ok(first_node)) => {
                cumulative = match render_to_segments(first_node, ctx.clone(), opts.clone()).await {
                    Ok(s) => s,
                    Err(e) => { yield Err(e); return; }
                };
                yield Ok(cumulative.clone());
            }
        }

        loop {
            if let Err(e) = check_cancelled(&opts) {
                yield Err(e);
                return;
            }
            match source.next().await {
                None => return,
                Some(Err(e)) => { yield Err(e); return; }
                Some(Ok(node)) => {
                    let piece = match render_to_segments(node, ctx.clone(), opts.clone()).await {
                        Ok(s) => s,
                        Err(e) => { yield Err(e); return; }
                    };
                    cumulative = if append_only {
                        coalesce(cumulative.into_iter().chain(piece).collect())
                    } else {
                        piece
                    };
                    yield Ok(cumulative.clone());
                }
            }
        }
    })
}

#[derive(Clone)]
enum ChildState {
    Pending,
    Active(Segments),
    Done(Segments),
}

impl ChildState {
    fn is_done(&self) -> bool {
        matches!(self, ChildState::Done(_))
    }

    fn current(&self) -> Segments {
        match self {
            ChildState::Pending => Segments::new(),
            ChildState::Active(s) | ChildState::Done(s) => s.clone(),
        }
    }
}

/// Combines a sequence's children into one monotonic frame stream (§4.C.2).
///
/// Children are polled every call, so all of them make progress whenever
/// this stream is polled — genuinely concurrent, not a chain of sequential
/// awaits. But the *emitted* frame only ever reveals the frozen text of
/// already-finished children followed by the partial text of the leftmost
/// still-active child (the "frontier"); children past the frontier
/// contribute nothing yet even though they may already be producing frames
/// in the background. This is what keeps the combined frame a strict
/// prefix-extension of itself across updates (§3 invariants, §8 property 2):
/// a growing frontier frame can only ever append to what came before it.
struct SequenceStream {
    children: Vec<BoxSegStream>,
    states: Vec<ChildState>,
    frontier: usize,
    finished: bool,
    last_emitted: Option<Segments>,
}

impl SequenceStream {
    fn new(children: Vec<BoxSegStream>) -> Self {
        let states = children.iter().map(|_| ChildState::Pending).collect();
        SequenceStream {
            children,
            states,
            frontier: 0,
            finished: false,
            last_emitted: None,
        }
    }

    fn assemble(&self) -> Segments {
        let mut out = Vec::new();
        for (i, state) in self.states.iter().enumerate() {
            if i > self.frontier {
                break;
            }
            out.extend(state.current());
        }
        coalesce(out)
    }
}

impl Stream for SequenceStream {
    type Item = Result<Segments, RenderError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if this.children.is_empty() {
            if this.finished {
                return Poll::Ready(None);
            }
            this.finished = true;
            return Poll::Ready(Some(Ok(Segments::new())));
        }

        loop {
            let mut any_ready = false;
            for i in 0..this.children.len() {
                if this.states[i].is_done() {
                    continue;
                }
                match this.children[i].as_mut().poll_next(cx) {
                    Poll::Ready(Some(Ok(seg))) => {
                        this.states[i] = ChildState::Active(seg);
                        any_ready = true;
                    }
                    Poll::Ready(Some(Err(e))) => return Poll::Ready(Some(Err(e))),
                    Poll::Ready(None) => {
                        let snapshot = this.states[i].current();
                        this.states[i] = ChildState::Done(snapshot);
                        any_ready = true;
                    }
                    Poll::Pending => {}
                }
            }

            while this.frontier < this.states.len() && this.states[this.frontier].is_done() {
                this.frontier += 1;
            }

            if this.frontier == this.states.len() {
                if this.finished {
                    return Poll::Ready(None);
                }
                this.finished = true;
                return Poll::Ready(Some(Ok(this.assemble())));
            }

            if !any_ready {
                return Poll::Pending;
            }

            let combined = this.assemble();
            if Some(&combined) != this.last_emitted.as_ref() {
                this.last_emitted = Some(combined.clone());
                return Poll::Ready(Some(Ok(combined)));
            }
            // Only a past-frontier child progressed; nothing user-visible
            // changed. Loop and poll again rather than returning Pending,
            // since we already consumed this round's Ready values and would
            // otherwise miss the next ones.
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{create_render_context, RenderContextOptions};
    use crate::element::{create_element, fragment, Props, Tag};

    async fn render_text(node: Node) -> String {
        let ctx = create_render_context(RenderContextOptions::new());
        render(node, &ctx, RenderOptions::new())
            .await
            .unwrap()
            .into_text()
            .unwrap()
    }

    #[tokio::test(flavor = "current_thread")]
    async fn s1_render_string_leaf() {
        assert_eq!(render_text(Node::text("hello")).await, "hello");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn s2_fragment_concatenates_children() {
        let node = Node::Element(fragment(vec![
            Node::text("a"),
            Node::text("b"),
            Node::text("c"),
        ]));
        assert_eq!(render_text(node).await, "abc");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn s3_component_composes_fragment_and_prop() {
        let greet = Tag::component(|props: Props, _cx| {
            let name = props.get::<String>("name").cloned().unwrap_or_default();
            Ok(Node::Element(fragment(vec![Node::text("hi "), Node::text(name)])))
        });
        let el = create_element(greet, Props::new().insert("name", "x".to_string()), vec![]);
        assert_eq!(render_text(Node::Element(el)).await, "hi x");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn empty_sequence_renders_as_one_empty_frame() {
        assert_eq!(render_text(Node::empty()).await, "");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn numbers_and_booleans_follow_leaf_rules() {
        let node = Node::Sequence(vec![3.into(), true.into(), Option::<i64>::None.into()]);
        assert_eq!(render_text(node).await, "3");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn component_panic_surfaces_with_element_tag() {
        let boom = Tag::component(|_props: Props, _cx| panic!("kaboom"));
        let el = create_element(boom, Props::new(), vec![]);
        let ctx = create_render_context(RenderContextOptions::new());
        let err = render(Node::Element(el), &ctx, RenderOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ComponentThrew);
        assert!(err.element.is_some());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn stop_predicate_surfaces_opaque_element() {
        let marker = Tag::component(|_props: Props, _cx| Ok(Node::text("inside")));
        let inner = create_element(marker, Props::new(), vec![]);
        let inner_id = inner.id();
        let tree = fragment(vec![Node::text("before "), Node::Element(inner), Node::text(" after")]);
        let ctx = create_render_context(RenderContextOptions::new());
        let out = render(
            Node::Element(tree),
            &ctx,
            RenderOptions::new().stop(move |el| el.id() == inner_id),
        )
        .await
        .unwrap();
        let segments = out.into_segments();
        assert!(segments.iter().any(|s| matches!(s, Segment::Element(e) if e.id() == inner_id)));
        assert!(segments.iter().any(|s| matches!(s, Segment::Text(t) if t == "before ")));
    }
}
