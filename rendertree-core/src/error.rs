//! Structured errors with stable numeric codes (§4.E, §6, §7).
//!
//! `RenderError` is a plain record `{code, kind, message, data}` rather than
//! an enum of variants: the renderer doesn't branch on error shape, it only
//! ever surfaces whatever a component or the engine itself attaches, then
//! lets the failure propagate. The code table is owned by the core;
//! collaborators mint their own codes above [`FIRST_COLLABORATOR_CODE`].

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Which side of the contract a failure is attributable to (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller misused the API: missing required children, incompatible props.
    User,
    /// An underlying collaborator service failed, or model output could not
    /// be parsed.
    Runtime,
    /// A core invariant was violated; indicates a bug in this crate.
    Internal,
}

/// A stable, core-owned error code (§6, §9). Collaborators must not reuse
/// these numbers; [`FIRST_COLLABORATOR_CODE`] marks the start of the range
/// they are free to mint their own codes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Cancelled,
    ComponentThrew,
    InvalidChildren,
    InternalInvariantViolated,
    LazyProducerAlreadyConsumed,
    NonErrorRejection,
    // Reserved for collaborators building chat/tool-use strategies on top of
    // this core (§6); the core itself never constructs these, it only owns
    // their stable numbering.
    ModelOutputCouldNotBeParsed,
    ModelHallucinatedTool,
    ChatModelDoesNotSupportFunctions,
    ChatCompletionUnexpectedChild,
    ChatCompletionMissingChildren,
    ProviderApiError,
    UserInputError,
}

/// First code number available to collaborator-defined errors (§9).
pub const FIRST_COLLABORATOR_CODE: i32 = 1000;

impl ErrorCode {
    pub const fn number(self) -> i32 {
        match self {
            ErrorCode::Cancelled => 1,
            ErrorCode::ComponentThrew => 2,
            ErrorCode::InvalidChildren => 3,
            ErrorCode::InternalInvariantViolated => 4,
            ErrorCode::LazyProducerAlreadyConsumed => 5,
            ErrorCode::NonErrorRejection => 6,
            ErrorCode::ModelOutputCouldNotBeParsed => 100,
            ErrorCode::ModelHallucinatedTool => 101,
            ErrorCode::ChatModelDoesNotSupportFunctions => 102,
            ErrorCode::ChatCompletionUnexpectedChild => 103,
            ErrorCode::ChatCompletionMissingChildren => 104,
            ErrorCode::ProviderApiError => 105,
            ErrorCode::UserInputError => 106,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}({})", self.number())
    }
}

/// A structured rendering failure: `{code, kind, message, data}` (§4.E).
///
/// Cloneable because memoized producers cache the failure for the lifetime
/// of the render context (§7) and every late joiner needs its own copy.
#[derive(Clone, Error)]
#[error("{kind:?} error {code}: {message}")]
pub struct RenderError {
    pub kind: ErrorKind,
    pub code: ErrorCode,
    pub message: String,
    /// The label of the element that was being rendered when the failure
    /// surfaced, if any (§4.E: "the failing element tag attached").
    pub element: Option<String>,
    /// Arbitrary collaborator-attached payload, analogous to the `data`
    /// field of the distilled taxonomy. Never inspected by the core itself.
    pub data: Option<Arc<dyn Any + Send + Sync>>,
    #[source]
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Debug for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderError")
            .field("kind", &self.kind)
            .field("code", &self.code)
            .field("message", &self.message)
            .field("element", &self.element)
            .field("has_data", &self.data.is_some())
            .finish()
    }
}

impl RenderError {
    fn new(kind: ErrorKind, code: ErrorCode, message: impl Into<String>) -> Self {
        RenderError {
            kind,
            code,
            message: message.into(),
            element: None,
            data: None,
            source: None,
        }
    }

    pub fn user(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::User, code, message)
    }

    pub fn runtime(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Runtime, code, message)
    }

    pub fn internal(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, code, message)
    }

    /// A cooperative cancellation failure (§4.C, §5, §7).
    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Runtime, ErrorCode::Cancelled, "render cancelled")
    }

    /// Wraps a non-`RenderError` failure a collaborator future rejected
    /// with, as the distilled spec requires ("non-error rejections are
    /// wrapped", §4.E).
    pub fn non_error_rejection(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::new(
            ErrorKind::Runtime,
            ErrorCode::NonErrorRejection,
            source.to_string(),
        )
        .with_source(source)
    }

    pub fn with_element(mut self, label: impl Into<String>) -> Self {
        self.element = Some(label.into());
        self
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    pub fn with_data<T: Send + Sync + 'static>(mut self, data: T) -> Self {
        self.data = Some(Arc::new(data));
        self
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self.code, ErrorCode::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_is_recognized() {
        let err = RenderError::cancelled();
        assert!(err.is_cancellation());
        assert_eq!(err.kind, ErrorKind::Runtime);
    }

    #[test]
    fn element_label_is_attached() {
        let err = RenderError::internal(ErrorCode::ComponentThrew, "boom").with_element("component#3");
        assert_eq!(err.element.as_deref(), Some("component#3"));
    }

    #[test]
    fn collaborator_codes_are_disjoint_from_core_codes() {
        assert!(ErrorCode::ModelOutputCouldNotBeParsed.number() < FIRST_COLLABORATOR_CODE);
        assert!(ErrorCode::Cancelled.number() < FIRST_COLLABORATOR_CODE);
    }

    #[test]
    fn display_includes_kind_and_code() {
        let err = RenderError::user(ErrorCode::InvalidChildren, "missing children");
        let rendered = err.to_string();
        assert!(rendered.contains("User"));
        assert!(rendered.contains("missing children"));
    }
}
