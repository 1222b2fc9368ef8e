//! Scoped dynamic bindings (contexts), the render-context toolbox handed to
//! components, and the logger facade.
//!
//! A [`RenderContext`] is a persistent mapping from context key to value
//! with provider-scoped overrides. It is never mutated: [`RenderContext::push_context`]
//! derives a new context for a subtree. Each distinct `RenderContext`
//! produced this way has its own identity, which is exactly what
//! [`crate::memo`] keys its weak cache on — re-rendering a memoized node
//! under a different provider is a deliberate cache miss (§4.D).

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::element::{create_element, Element, Props, ProviderTag};
use crate::node::Node;

static NEXT_CONTEXT_KEY_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique token identifying a context key, minted once at
/// [`create_context`] time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextKeyId(u64);

impl ContextKeyId {
    fn next() -> Self {
        ContextKeyId(NEXT_CONTEXT_KEY_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Process-unique identity of a single [`RenderContext`] instance, used only
/// as the key in memoization's weak cache (§4.D, §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ContextId(u64);

impl ContextId {
    fn next() -> Self {
        ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A typed handle to a context slot, carrying its default value.
///
/// Returned by [`create_context`] alongside a [`ProviderFactory`] that binds
/// the key for a subtree.
pub struct ContextKey<T> {
    id: ContextKeyId,
    default: Arc<T>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for ContextKey<T> {
    fn clone(&self) -> Self {
        ContextKey {
            id: self.id,
            default: self.default.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ContextKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextKey").field("id", &self.id).finish()
    }
}

/// Creates the intrinsic Provider element that rebinds `key` for its
/// subtree, bound at [`create_context`] time to this context's type.
pub struct ProviderFactory<T> {
    id: ContextKeyId,
    _marker: PhantomData<fn(T)>,
}

impl<T: Send + Sync + 'static> ProviderFactory<T> {
    /// Builds the Provider element. The renderer derives a child context
    /// with `key` rebound to `value` before expanding `children`.
    pub fn provide(&self, value: T, children: Vec<Node>) -> Element {
        let tag = ProviderTag {
            key_id: self.id,
            value: Arc::new(value) as Arc<dyn Any + Send + Sync>,
        };
        create_element(tag, Props::new(), children)
    }
}

/// Returns a fresh context key plus an intrinsic Provider element factory.
/// Keys hold a default value set here, returned by [`RenderContext::get_context`]
/// when no provider along the chain has rebound the key.
pub fn create_context<T: Send + Sync + 'static>(default: T) -> (ContextKey<T>, ProviderFactory<T>) {
    let id = ContextKeyId::next();
    (
        ContextKey {
            id,
            default: Arc::new(default),
            _marker: PhantomData,
        },
        ProviderFactory {
            id,
            _marker: PhantomData,
        },
    )
}

/// Minimal logging facade a [`RenderContext`] carries so components can log
/// without a thread-local or global logger. The default implementation
/// forwards to the `log` crate, matching how the rest of the ambient stack
/// logs.
pub trait Logger: Send + Sync {
    fn log(&self, level: log::Level, message: &str);
}

/// Forwards every call to the process-wide `log` facade.
pub struct StdLogLogger;

impl Logger for StdLogLogger {
    fn log(&self, level: log::Level, message: &str) {
        log::log!(level, "{message}");
    }
}

/// Discards every log record. Used when no logger is supplied.
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _level: log::Level, _message: &str) {}
}

pub(crate) struct ContextInner {
    pub(crate) id: ContextId,
    bindings: HashMap<ContextKeyId, Arc<dyn Any + Send + Sync>>,
    pub(crate) logger: Arc<dyn Logger>,
}

/// Options recognized by [`create_render_context`].
pub struct RenderContextOptions {
    logger: Arc<dyn Logger>,
    initial: HashMap<ContextKeyId, Arc<dyn Any + Send + Sync>>,
}

impl Default for RenderContextOptions {
    fn default() -> Self {
        RenderContextOptions {
            logger: Arc::new(NoopLogger),
            initial: HashMap::new(),
        }
    }
}

impl RenderContextOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Seeds the root context with a bound value for `key`, as if a
    /// Provider for `key` wrapped the whole tree.
    pub fn with_context<T: Send + Sync + 'static>(mut self, key: &ContextKey<T>, value: T) -> Self {
        self.initial.insert(key.id, Arc::new(value));
        self
    }
}

/// A scoped, immutable bag of bindings inherited through the render tree:
/// context values, a logger, and (derived, never mutated) provider overrides.
///
/// Cloning a `RenderContext` is cheap (an `Arc` bump) and preserves identity:
/// clones of the same context are the same context for memoization
/// purposes. [`RenderContext::push_context`] is the only way to get a
/// *different* context, and it always mints a new identity.
#[derive(Clone)]
pub struct RenderContext(pub(crate) Arc<ContextInner>);

/// Creates a fresh root render context.
pub fn create_render_context(options: RenderContextOptions) -> RenderContext {
    RenderContext(Arc::new(ContextInner {
        id: ContextId::next(),
        bindings: options.initial,
        logger: options.logger,
    }))
}

impl RenderContext {
    /// Returns the bound value of `key` along the current provider chain,
    /// or its default if no provider has rebound it.
    pub fn get_context<T: Send + Sync + 'static>(&self, key: &ContextKey<T>) -> Arc<T> {
        match self.0.bindings.get(&key.id) {
            Some(value) => value
                .clone()
                .downcast::<T>()
                .unwrap_or_else(|_| key.default.clone()),
            None => key.default.clone(),
        }
    }

    /// Returns a derived context with `key` rebound for the subtree. Does
    /// not mutate `self`; the derived context has its own identity.
    pub fn push_context<T: Send + Sync + 'static>(&self, key: &ContextKey<T>, value: T) -> RenderContext {
        self.push_context_raw(key.id, Arc::new(value))
    }

    pub(crate) fn push_context_raw(
        &self,
        id: ContextKeyId,
        value: Arc<dyn Any + Send + Sync>,
    ) -> RenderContext {
        let mut bindings = self.0.bindings.clone();
        bindings.insert(id, value);
        RenderContext(Arc::new(ContextInner {
            id: ContextId::next(),
            bindings,
            logger: self.0.logger.clone(),
        }))
    }

    pub fn logger(&self) -> &Arc<dyn Logger> {
        &self.0.logger
    }

    pub(crate) fn id(&self) -> ContextId {
        self.0.id
    }
}

/// The toolbox every component call receives alongside its props: a bound
/// `render`, a bound `memo`, context lookup, the logger, and the cooperative
/// cancellation signal of the render call it was invoked under. The signal
/// is per-call rather than part of the (persistent, memoizable)
/// `RenderContext` itself — a component re-entered by a second `render()`
/// call observes that call's own signal.
#[derive(Clone)]
pub struct ComponentContext {
    ctx: RenderContext,
    signal: tokio_util::sync::CancellationToken,
}

impl ComponentContext {
    pub(crate) fn new(ctx: RenderContext, signal: tokio_util::sync::CancellationToken) -> Self {
        ComponentContext { ctx, signal }
    }

    pub fn get_context<T: Send + Sync + 'static>(&self, key: &ContextKey<T>) -> Arc<T> {
        self.ctx.get_context(key)
    }

    pub fn logger(&self) -> &Arc<dyn Logger> {
        self.ctx.logger()
    }

    pub fn cancellation(&self) -> &tokio_util::sync::CancellationToken {
        &self.signal
    }

    /// Renders `node` to completion under this call's context, as a bound
    /// convenience so components don't need to import [`crate::engine::render`]
    /// and thread the context themselves. Starts a fresh, independent
    /// cancellation scope. Fails with an internal error if `node` rendered to
    /// a segment sequence containing opaque elements rather than plain text
    /// — that only happens when a stop predicate is in play, which this
    /// bound convenience never sets.
    pub async fn render(&self, node: Node) -> Result<String, crate::error::RenderError> {
        let output =
            crate::engine::render(node, &self.ctx, crate::options::RenderOptions::default()).await?;
        output.into_text().ok_or_else(|| {
            crate::error::RenderError::internal(
                crate::error::ErrorCode::InternalInvariantViolated,
                "render() without a stop predicate produced opaque elements",
            )
        })
    }

    /// Memoizes `node` so repeated observation under this context yields one
    /// underlying evaluation. Bound convenience over [`crate::memo::memo`].
    pub fn memo(&self, node: Node) -> Node {
        crate::memo::memo(node)
    }

    pub(crate) fn render_context(&self) -> &RenderContext {
        &self.ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_context_returns_default_without_provider() {
        let (key, _provider) = create_context(7_i64);
        let ctx = create_render_context(RenderContextOptions::new());
        assert_eq!(*ctx.get_context(&key), 7);
    }

    #[test]
    fn push_context_does_not_mutate_parent() {
        let (key, _provider) = create_context("default".to_string());
        let root = create_render_context(RenderContextOptions::new());
        let child = root.push_context(&key, "child-value".to_string());

        assert_eq!(*root.get_context(&key), "default");
        assert_eq!(*child.get_context(&key), "child-value");
    }

    #[test]
    fn derived_contexts_get_distinct_identity() {
        let (key, _provider) = create_context(0_i64);
        let root = create_render_context(RenderContextOptions::new());
        let child = root.push_context(&key, 1);
        assert_ne!(root.id(), child.id());
    }

    #[test]
    fn cloning_preserves_identity() {
        let root = create_render_context(RenderContextOptions::new());
        let clone = root.clone();
        assert_eq!(root.id(), clone.id());
    }

    #[test]
    fn with_context_seeds_root() {
        let (key, _provider) = create_context(0_i64);
        let ctx = create_render_context(RenderContextOptions::new().with_context(&key, 42));
        assert_eq!(*ctx.get_context(&key), 42);
    }
}
