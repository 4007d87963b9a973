//! Transport-agnostic error type shared by every relay service.
//!
//! Services return their own typed errors and convert them into [`Error`]
//! at the boundary; inbound adapters pick a status from [`ErrorCode`] and
//! return the message verbatim.

use std::fmt;

use super::TraceId;

/// Stable failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorCode {
    /// Missing or malformed input.
    InvalidRequest,
    /// Invalid OAuth state or code, or credentials rejected upstream.
    Forbidden,
    /// The addressed resource does not exist.
    NotFound,
    /// The telemetry provider could not be reached or answered garbage.
    UpstreamUnavailable,
    /// The document store or blob store could not be reached.
    ServiceUnavailable,
    /// Malformed persisted data or any other unexpected failure.
    InternalError,
}

/// Domain error payload.
///
/// ## Invariants
/// - `message` is non-empty once trimmed.
///
/// # Examples
/// ```
/// use telemetry_relay::domain::{Error, ErrorCode};
///
/// let err = Error::forbidden("invalid oauth state");
/// assert_eq!(err.code(), ErrorCode::Forbidden);
/// assert_eq!(err.to_string(), "invalid oauth state");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    code: ErrorCode,
    message: String,
    trace_id: Option<String>,
}

impl Error {
    /// Build an error, substituting a generic message when `message` is blank.
    ///
    /// The trace identifier in scope, if any, is captured automatically.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            String::from("unexpected error")
        } else {
            message
        };
        Self {
            code,
            message,
            trace_id: TraceId::current().map(|id| id.to_string()),
        }
    }

    /// Failure category.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Human-readable message returned to clients verbatim.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Correlation identifier captured at construction time.
    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    /// Convenience constructor for [`ErrorCode::InvalidRequest`].
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// Convenience constructor for [`ErrorCode::Forbidden`].
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    /// Convenience constructor for [`ErrorCode::NotFound`].
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Convenience constructor for [`ErrorCode::UpstreamUnavailable`].
    pub fn upstream_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamUnavailable, message)
    }

    /// Convenience constructor for [`ErrorCode::ServiceUnavailable`].
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    /// Convenience constructor for [`ErrorCode::InternalError`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for Error {}
