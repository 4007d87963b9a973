//! Domain primitives and services.
//!
//! Purpose: keep the OAuth linking protocol and the telemetry fan-out free of
//! transport and storage frameworks. Services talk to the outside world only
//! through the traits in [`ports`].
//!
//! Public surface:
//! - Error (alias to `error::Error`): transport-agnostic failure payload.
//! - StateTokenManager, OAuthLinker: anti-forgery tokens and account linking.
//! - TelemetryRelay: device snapshot and log fan-out plus freshness reads.
//! - ImageArchive: date-partitioned image uploads.
//! - PeriodicAuditor: background staleness check.

pub mod checkup;
pub mod document_path;
pub mod error;
pub mod image_archive;
pub mod oauth_linker;
pub mod ports;
pub mod state_tokens;
pub mod telemetry_relay;
pub mod trace_id;
pub mod value;

pub use self::checkup::{
    AuditorConfig, CheckupReport, CheckupSleeper, PeriodicAuditor, StaleDevice, TokioSleeper,
};
pub use self::document_path::{CollectionPath, DocumentPath, DocumentPathError};
pub use self::error::{Error, ErrorCode};
pub use self::image_archive::{ArchiveError, ImageArchive, JPEG_CONTENT_TYPE};
pub use self::oauth_linker::{LinkError, LinkedAccount, OAuthClient, OAuthLinker};
pub use self::state_tokens::{StateTokenError, StateTokenManager};
pub use self::telemetry_relay::{
    AccountCredentials, LOCAL_DEVICE, RelayError, RelayReport, TelemetryRelay, log_key_for,
};
pub use self::trace_id::{TRACE_ID_HEADER, TraceId};
pub use self::value::{Document, Value, document_from_json, document_to_json};

/// Convenient API result alias.
///
/// # Examples
/// ```
/// use telemetry_relay::domain::{ApiResult, Error};
///
/// fn handler() -> ApiResult<&'static str> {
///     Err(Error::forbidden("invalid oauth state"))
/// }
/// assert!(handler().is_err());
/// ```
pub type ApiResult<T> = Result<T, Error>;
