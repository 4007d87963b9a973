//! Binary object storage for uploaded camera images.

use async_trait::async_trait;

use super::define_port_error;

define_port_error! {
    /// Errors raised by blob store adapters.
    pub enum BlobStoreError {
        /// The object could not be written.
        Write { message: String } => "unable to write file: {message}",
        /// The object key is not acceptable to the backend.
        InvalidKey { message: String } => "invalid object key: {message}",
    }
}

/// Write-only object storage keyed by slash-separated paths.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` at `key`, replacing any existing object.
    async fn put(
        &self,
        key: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(), BlobStoreError>;
}
