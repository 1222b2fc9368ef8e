//! The [`Node`] tree: the only data type callers construct directly.
//!
//! A `Node` is one of a scalar leaf, an ordered sequence, an [`Element`], an
//! eventual (single-value future), or a lazy incremental producer (async
//! stream). See the crate-level docs for the rendering rules each variant
//! follows.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::future::{FutureExt, Shared};
use futures_util::stream::Stream;
use tokio::sync::Mutex as AsyncMutex;

use crate::element::Element;
use crate::error::RenderError;

/// A scalar value a [`Node::Leaf`] can hold.
///
/// Nullish and boolean leaves render as the empty string; numbers are
/// stringified; strings render verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum Leaf {
    Text(String),
    Number(f64),
    Bool(bool),
    Null,
}

impl fmt::Display for Leaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leaf::Text(s) => f.write_str(s),
            Leaf::Number(n) => write!(f, "{n}"),
            Leaf::Bool(_) | Leaf::Null => Ok(()),
        }
    }
}

/// A boxed stream of rendered sub-nodes, as produced by a component that
/// returns a lazy incremental producer.
pub type BoxProducerStream = Pin<Box<dyn Stream<Item = Result<Node, RenderError>> + Send>>;

/// A boxed, cloneable future resolving to a [`Node`].
///
/// Cloneable via [`futures::future::Shared`] so the same eventual can be
/// awaited by more than one consumer, which is what memoization relies on
/// (§4.D of the spec): `Shared` polls the inner future exactly once and
/// hands every clone the same resolved value.
pub type SharedNodeFuture = Shared<Pin<Box<dyn Future<Output = Result<Node, RenderError>> + Send>>>;

/// A single-value future resolving to a [`Node`].
#[derive(Clone)]
pub struct Eventual {
    pub(crate) fut: SharedNodeFuture,
    /// Set once [`crate::memo::memo`] has wrapped this eventual, so a second
    /// `memo()` call is a no-op rather than adding another layer of caching.
    pub(crate) memoized: bool,
}

impl Eventual {
    /// Wraps any `Send` future resolving to a `Node` as an eventual.
    pub fn new<F>(fut: F) -> Self
    where
        F: Future<Output = Result<Node, RenderError>> + Send + 'static,
    {
        Eventual {
            fut: (Box::pin(fut) as Pin<Box<dyn Future<Output = Result<Node, RenderError>> + Send>>)
                .shared(),
            memoized: false,
        }
    }

    pub(crate) async fn resolve(&self) -> Result<Node, RenderError> {
        self.fut.clone().await
    }
}

impl fmt::Debug for Eventual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Eventual")
            .field("memoized", &self.memoized)
            .finish()
    }
}

/// Internal state backing a [`LazyNode`].
///
/// A freshly-constructed producer is single-consumer: whichever render call
/// first drives it takes the underlying stream out of the slot. Sharing a
/// lazy producer across more than one observer is `memo`'s job (§4.D), not
/// something a bare `Node::Lazy` promises.
pub(crate) enum LazyState {
    Fresh(AsyncMutex<Option<BoxProducerStream>>),
    Memoized(Arc<crate::memo::MemoizedProducer>),
}

/// A lazy incremental producer: an async stream yielding `Node`s, implicitly
/// terminating with its last yielded value as the final frame.
#[derive(Clone)]
pub struct LazyNode(pub(crate) Arc<LazyState>);

impl LazyNode {
    /// Wraps a stream of sub-nodes as a lazy producer.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Node, RenderError>> + Send + 'static,
    {
        LazyNode(Arc::new(LazyState::Fresh(AsyncMutex::new(Some(
            Box::pin(stream) as BoxProducerStream,
        )))))
    }

    pub(crate) fn is_memoized(&self) -> bool {
        matches!(&*self.0, LazyState::Memoized(_))
    }
}

impl fmt::Debug for LazyNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyNode")
            .field("memoized", &self.is_memoized())
            .finish()
    }
}

/// Any renderable value: scalar, sequence, element, eventual, or lazy
/// producer.
#[derive(Clone)]
pub enum Node {
    Leaf(Leaf),
    /// An ordered sequence, treated as concatenation in render order.
    Sequence(Vec<Node>),
    Element(Element),
    Eventual(Eventual),
    Lazy(LazyNode),
    /// Sentinel a producer yields as its first item to switch its sub-tree
    /// to append-only (delta) framing. See [`APPEND_ONLY`].
    AppendOnly,
}

/// Sentinel value a lazy producer yields as its *first* item to declare
/// itself append-only: every later yield is a delta to append rather than
/// the full running value.
pub const APPEND_ONLY: Node = Node::AppendOnly;

impl Node {
    /// An empty sequence; renders as the empty string.
    pub fn empty() -> Self {
        Node::Sequence(Vec::new())
    }

    pub fn text(s: impl Into<String>) -> Self {
        Node::Leaf(Leaf::Text(s.into()))
    }

    pub fn is_empty_sequence(&self) -> bool {
        matches!(self, Node::Sequence(children) if children.is_empty())
    }
}

impl Default for Node {
    fn default() -> Self {
        Node::empty()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Leaf(l) => f.debug_tuple("Leaf").field(l).finish(),
            Node::Sequence(children) => f.debug_tuple("Sequence").field(children).finish(),
            Node::Element(e) => f.debug_tuple("Element").field(e).finish(),
            Node::Eventual(e) => f.debug_tuple("Eventual").field(e).finish(),
            Node::Lazy(l) => f.debug_tuple("Lazy").field(l).finish(),
            Node::AppendOnly => f.write_str("AppendOnly"),
        }
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Node::Leaf(Leaf::Text(s))
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node::Leaf(Leaf::Text(s.to_string()))
    }
}

impl From<f64> for Node {
    fn from(n: f64) -> Self {
        Node::Leaf(Leaf::Number(n))
    }
}

impl From<i64> for Node {
    fn from(n: i64) -> Self {
        Node::Leaf(Leaf::Number(n as f64))
    }
}

impl From<i32> for Node {
    fn from(n: i32) -> Self {
        Node::Leaf(Leaf::Number(n as f64))
    }
}

impl From<bool> for Node {
    fn from(b: bool) -> Self {
        Node::Leaf(Leaf::Bool(b))
    }
}

impl From<()> for Node {
    fn from(_: ()) -> Self {
        Node::Leaf(Leaf::Null)
    }
}

impl<T: Into<Node>> From<Option<T>> for Node {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => Node::Leaf(Leaf::Null),
        }
    }
}

impl From<Vec<Node>> for Node {
    fn from(children: Vec<Node>) -> Self {
        Node::Sequence(children)
    }
}

impl From<Element> for Node {
    fn from(e: Element) -> Self {
        Node::Element(e)
    }
}

impl From<Eventual> for Node {
    fn from(e: Eventual) -> Self {
        Node::Eventual(e)
    }
}

impl From<LazyNode> for Node {
    fn from(l: LazyNode) -> Self {
        Node::Lazy(l)
    }
}

impl FromIterator<Node> for Node {
    fn from_iter<T: IntoIterator<Item = Node>>(iter: T) -> Self {
        Node::Sequence(iter.into_iter().collect())
    }
}

/// Structural discriminant for a Node that delegates its rendering to
/// another, hidden Node (§9: "IndirectNode (open design question)").
///
/// The distilled spec exposes this predicate in its external surface (§6)
/// but leaves its full semantics collaborator-defined and explicitly warns
/// implementers not to guess beyond what's illustrated. This core provides
/// the hook without inventing a dedicated `Node` variant for it: today no
/// built-in `Node` constructor produces an indirect node, so this always
/// returns `false`. A collaborator that introduces its own indirection
/// (e.g. a Node that resolves to a differently-shaped Node chosen at
/// render time) is expected to model it as a component returning the
/// hidden Node from a `Node::Element`, which already renders transparently;
/// this predicate exists so that such a collaborator has a stable, core-
/// owned name to hang a future `Node::Indirect` variant on without
/// breaking callers who already check `is_indirect_node`.
pub fn is_indirect_node(_node: &Node) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_display_matches_render_rules() {
        assert_eq!(Leaf::Text("hi".into()).to_string(), "hi");
        assert_eq!(Leaf::Number(3.5).to_string(), "3.5");
        assert_eq!(Leaf::Bool(true).to_string(), "");
        assert_eq!(Leaf::Null.to_string(), "");
    }

    #[test]
    fn option_none_becomes_null_leaf() {
        let node: Node = Option::<String>::None.into();
        assert!(matches!(node, Node::Leaf(Leaf::Null)));
    }

    #[test]
    fn no_built_in_node_is_indirect() {
        assert!(!is_indirect_node(&Node::text("x")));
        assert!(!is_indirect_node(&Node::empty()));
    }

    #[test]
    fn empty_sequence_detection() {
        assert!(Node::empty().is_empty_sequence());
        assert!(!Node::text("x").is_empty_sequence());
    }
}
