//! rendertree-core — a declarative render tree for composing LLM calls.
//!
//! # Overview
//!
//! Callers build a [`Node`] tree out of scalars, sequences, [`Element`]s
//! (components, fragments, context providers), eventual values, and lazy
//! incremental producers, then hand it to [`render`] or [`render_stream`].
//! The engine expands the tree structurally, running components and driving
//! producers only as far as is needed to produce each successive frame, and
//! resolves concurrently-running children without ever emitting a frame that
//! contradicts an earlier one.
//!
//! - [`node`] — the `Node` tree itself: leaves, sequences, eventuals, lazy
//!   producers, and the `APPEND_ONLY` sentinel.
//! - [`element`] — elements, components, props, and the `Fragment`/`Provider`
//!   intrinsic tags.
//! - [`context`] — scoped context propagation (`RenderContext`) and the
//!   `ComponentContext` toolbox handed to every component call.
//! - [`engine`] — the streaming renderer: `render`, `render_stream`, and the
//!   frame/segment types they produce.
//! - [`memo`] — per-render-context memoization.
//! - [`error`] — the structured error type and its stable code table.
//! - [`options`] — construction-time options for a render call.
//!
//! # Example
//!
//! ```no_run
//! use rendertree_core::{create_element, fragment, render, create_render_context};
//! use rendertree_core::{Node, Props, RenderContextOptions, RenderOptions, Tag};
//!
//! # async fn run() -> Result<(), rendertree_core::RenderError> {
//! let greet = Tag::component(|props: Props, _cx| {
//!     let name = props.get::<String>("name").cloned().unwrap_or_default();
//!     Ok(Node::Element(fragment(vec![Node::text("hi "), Node::text(name)])))
//! });
//! let el = create_element(greet, Props::new().insert("name", "world".to_string()), vec![]);
//!
//! let ctx = create_render_context(RenderContextOptions::new());
//! let output = render(Node::Element(el), &ctx, RenderOptions::new()).await?;
//! assert_eq!(output.into_text().as_deref(), Some("hi world"));
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod element;
pub mod engine;
pub mod error;
pub mod memo;
pub mod node;
pub mod options;

pub use context::{
    create_context, create_render_context, ComponentContext, ContextKey, Logger, NoopLogger,
    ProviderFactory, RenderContext, RenderContextOptions, StdLogLogger,
};
pub use element::{create_element, fragment, is_element, Component, Element, ElementId, Props, PropValue, Tag};
pub use engine::{render, render_stream, RenderFrame, RenderOutput, Segment, Segments};
pub use error::{ErrorCode, ErrorKind, RenderError, FIRST_COLLABORATOR_CODE};
pub use memo::memo;
pub use node::{is_indirect_node, Leaf, LazyNode, Node, APPEND_ONLY};
pub use options::{RenderOptions, StopPredicate};
