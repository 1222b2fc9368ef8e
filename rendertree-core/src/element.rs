//! Immutable element records and the intrinsic tags (`Fragment`, `Provider`).
//!
//! Elements are value-equal by identity only: two elements compare equal
//! iff they are the same allocation. Once constructed an element is frozen;
//! nothing in this crate ever mutates `props` or swaps out `tag` in place.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::context::{ComponentContext, ContextKeyId};
use crate::error::RenderError;
use crate::node::Node;

static NEXT_ELEMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier minted for every element. Used only to give
/// memoization and debug output a stable identity to key off of (§9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(u64);

impl ElementId {
    fn next() -> Self {
        ElementId(NEXT_ELEMENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A component is a stateless callable `(props, ComponentContext) -> Node`.
/// The returned `Node` may itself be a [`crate::node::Node::Lazy`] or
/// [`crate::node::Node::Eventual`] standing in for asynchronous work; the
/// call into `Component::call` itself is synchronous, mirroring how a JSX
/// component function call returns a value (or an async-iterator object)
/// without itself being awaited.
///
/// A component must be pure with respect to its arguments modulo whatever
/// services it reaches through context; if it has side effects that are not
/// idempotent, it must be wrapped with `memo` at the call site rather than
/// relying on the core to do so (§6).
pub trait Component: Send + Sync {
    fn call(&self, props: Props, cx: ComponentContext) -> Result<Node, RenderError>;
}

impl<F> Component for F
where
    F: Fn(Props, ComponentContext) -> Result<Node, RenderError> + Send + Sync,
{
    fn call(&self, props: Props, cx: ComponentContext) -> Result<Node, RenderError> {
        self(props, cx)
    }
}

/// The props entry carrying a rebound context value for a Provider element.
pub(crate) struct ProviderTag {
    pub(crate) key_id: ContextKeyId,
    pub(crate) value: Arc<dyn Any + Send + Sync>,
}

/// Either a component function or one of the intrinsic sentinels the
/// renderer special-cases: `Fragment`, a context `Provider`, or a `Memo`
/// wrapper installed by [`crate::memo::memo`].
#[derive(Clone)]
pub enum Tag {
    Component(Arc<dyn Component>),
    /// Renders `props.children` unchanged; used to group siblings.
    Fragment,
    Provider(Arc<ProviderTag>),
    /// Caches the wrapped element's one-level expansion per render context.
    Memo(Arc<crate::memo::MemoizedElement>),
}

impl Tag {
    pub fn component<F>(f: F) -> Self
    where
        F: Fn(Props, ComponentContext) -> Result<Node, RenderError> + Send + Sync + 'static,
    {
        Tag::Component(Arc::new(f))
    }
}

// `Tag::Provider` is constructed only from `context::ProviderFactory::provide`,
// which already has an `Arc<ProviderTag>`; this From impl keeps that call site
// terse.
impl From<ProviderTag> for Tag {
    fn from(tag: ProviderTag) -> Self {
        Tag::Provider(Arc::new(tag))
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Component(_) => f.write_str("Component(..)"),
            Tag::Fragment => f.write_str("Fragment"),
            Tag::Provider(_) => f.write_str("Provider(..)"),
            Tag::Memo(_) => f.write_str("Memo(..)"),
        }
    }
}

/// A single prop value, type-erased so `Props` can carry arbitrary
/// collaborator-defined data alongside the distinguished `children` entry.
pub type PropValue = Arc<dyn Any + Send + Sync>;

/// Keyed mapping of arbitrary values carried by an element, including a
/// distinguished `children` entry merged in by [`create_element`].
#[derive(Clone, Default)]
pub struct Props {
    values: HashMap<String, PropValue>,
    children: Option<Box<Node>>,
}

impl Props {
    pub fn new() -> Self {
        Props::default()
    }

    pub fn insert<T: Send + Sync + 'static>(mut self, key: impl Into<String>, value: T) -> Self {
        self.values.insert(key.into(), Arc::new(value));
        self
    }

    pub fn get<T: Send + Sync + 'static>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// The merged children node. Empty sequence if none were supplied.
    pub fn children(&self) -> Node {
        self.children.as_deref().cloned().unwrap_or_else(Node::empty)
    }
}

pub(crate) struct ElementInner {
    pub(crate) id: ElementId,
    pub(crate) tag: Tag,
    pub(crate) props: Props,
}

/// An immutable, frozen tree node carrying a tag, props, and (implicitly,
/// via `tag`) a bound render function. Elements are value-equal by identity:
/// two elements are "the same" only when they are the same allocation.
#[derive(Clone)]
pub struct Element(pub(crate) Arc<ElementInner>);

impl Element {
    pub fn id(&self) -> ElementId {
        self.0.id
    }

    pub fn tag(&self) -> &Tag {
        &self.0.tag
    }

    pub fn props(&self) -> &Props {
        &self.0.props
    }

    pub(crate) fn inner(&self) -> &Arc<ElementInner> {
        &self.0
    }

    /// A short, human-readable tag used in error messages and logs. Not
    /// part of the public API; components have no declared name to surface,
    /// so this identifies the element by kind and allocation id.
    pub(crate) fn label(&self) -> String {
        match self.tag() {
            Tag::Component(_) => format!("component#{}", self.id()),
            Tag::Fragment => format!("fragment#{}", self.id()),
            Tag::Provider(_) => format!("provider#{}", self.id()),
            Tag::Memo(_) => format!("memo#{}", self.id()),
        }
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Element {}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("id", &self.0.id)
            .field("tag", &self.0.tag)
            .finish()
    }
}

/// Constructs an Element, merging `children` into `props.children` as a
/// single Node (if exactly one and no children were already present) or an
/// ordered sequence otherwise.
///
/// Rust's type system rejects a null/undefined `tag` for free (there is no
/// such `Tag` variant); the dynamic check the distilled spec describes has
/// no equivalent here.
pub fn create_element(tag: impl Into<Tag>, mut props: Props, children: Vec<Node>) -> Element {
    let merged = if children.len() == 1 && props.children.is_none() {
        children.into_iter().next().unwrap()
    } else {
        let mut all = Vec::with_capacity(children.len() + 1);
        if let Some(existing) = props.children.take() {
            all.push(*existing);
        }
        all.extend(children);
        Node::Sequence(all)
    };
    props.children = Some(Box::new(merged));
    Element(Arc::new(ElementInner {
        id: ElementId::next(),
        tag: tag.into(),
        props,
    }))
}

/// Structural discriminant: true iff `node` is an [`Element`].
pub fn is_element(node: &Node) -> bool {
    matches!(node, Node::Element(_))
}

/// Builds a Fragment element grouping `children`.
pub fn fragment(children: Vec<Node>) -> Element {
    create_element(Tag::Fragment, Props::new(), children)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elements_are_identity_equal_only() {
        let a = fragment(vec![Node::text("x")]);
        let b = fragment(vec![Node::text("x")]);
        let a_clone = a.clone();

        assert_ne!(a, b);
        assert_eq!(a, a_clone);
    }

    #[test]
    fn single_child_is_not_wrapped_in_a_sequence() {
        let el = create_element(Tag::Fragment, Props::new(), vec![Node::text("only")]);
        assert!(matches!(el.props().children(), Node::Leaf(_)));
    }

    #[test]
    fn multiple_children_become_a_sequence() {
        let el = create_element(
            Tag::Fragment,
            Props::new(),
            vec![Node::text("a"), Node::text("b")],
        );
        match el.props().children() {
            Node::Sequence(children) => assert_eq!(children.len(), 2),
            other => panic!("expected a sequence, got {other:?}"),
        }
    }

    #[test]
    fn props_roundtrip_typed_values() {
        let props = Props::new().insert("count", 3_i64);
        assert_eq!(props.get::<i64>("count"), Some(&3));
        assert_eq!(props.get::<String>("count"), None);
    }

    #[test]
    fn is_element_discriminates_correctly() {
        assert!(is_element(&Node::Element(fragment(vec![]))));
        assert!(!is_element(&Node::text("hi")));
    }
}
