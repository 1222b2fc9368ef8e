//! Construction-time options for a render call (§4.C, §6).
//!
//! The only "configuration" a storage-free, network-free core has: a stop
//! predicate, the append-only override, and a cooperative cancellation
//! signal. Builder-style, `self`-by-value setters, same idiom the teacher
//! uses for its call-option structs.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::element::Element;

/// A caller-supplied test that arrests expansion at specific elements
/// (§4.C). Synchronous only: the distilled spec allows an async predicate,
/// but nothing in this crate's surface needs one, and threading an awaited
/// predicate through every element boundary would complicate the engine for
/// no exercised benefit — see `DESIGN.md`.
pub type StopPredicate = Arc<dyn Fn(&Element) -> bool + Send + Sync>;

/// Options recognized by [`crate::engine::render`] and
/// [`crate::engine::render_stream`].
#[derive(Clone, Default)]
pub struct RenderOptions {
    stop: Option<StopPredicate>,
    append_only: bool,
    signal: Option<CancellationToken>,
}

impl RenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// When `stop(element)` is true for an element encountered during
    /// rendering, that element is not expanded; it appears in the result as
    /// an opaque element value.
    pub fn stop<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Element) -> bool + Send + Sync + 'static,
    {
        self.stop = Some(Arc::new(predicate));
        self
    }

    /// Forces delta mode on the stream, even if the root would not
    /// otherwise be recognized as append-only.
    pub fn append_only(mut self, append_only: bool) -> Self {
        self.append_only = append_only;
        self
    }

    /// A cooperative cancellation token checked at every suspension point.
    pub fn signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }

    pub(crate) fn is_append_only_forced(&self) -> bool {
        self.append_only
    }

    pub(crate) fn into_inner(self) -> OptionsInner {
        OptionsInner {
            stop: self.stop,
            signal: self.signal.unwrap_or_default(),
        }
    }
}

/// The resolved, `Arc`-shared form of [`RenderOptions`] threaded through the
/// recursive renderer.
pub(crate) struct OptionsInner {
    pub(crate) stop: Option<StopPredicate>,
    pub(crate) signal: CancellationToken,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_have_no_stop_and_are_not_append_only() {
        let opts = RenderOptions::new();
        assert!(!opts.is_append_only_forced());
        let inner = opts.into_inner();
        assert!(inner.stop.is_none());
        assert!(!inner.signal.is_cancelled());
    }

    #[test]
    fn append_only_forces_delta_mode() {
        let opts = RenderOptions::new().append_only(true);
        assert!(opts.is_append_only_forced());
    }
}
