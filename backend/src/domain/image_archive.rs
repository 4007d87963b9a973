//! Date-partitioned archive for uploaded camera stills.

use std::sync::Arc;

use chrono::Datelike;
use mockable::Clock;
use tracing::info;

use super::Error;
use super::ports::{BlobStore, BlobStoreError};

/// Only accepted upload type.
pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

/// Failures raised while archiving an image.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArchiveError {
    /// The upload was not a JPEG.
    #[error("invalid content type {content_type}")]
    InvalidContentType { content_type: String },
    /// The filename cannot be used as a single key segment.
    #[error("invalid filename {filename:?}")]
    InvalidFilename { filename: String },
    /// The blob store refused the write.
    #[error(transparent)]
    Storage(#[from] BlobStoreError),
}

impl From<ArchiveError> for Error {
    fn from(error: ArchiveError) -> Self {
        match error {
            ArchiveError::InvalidContentType { .. } | ArchiveError::InvalidFilename { .. } => {
                Self::invalid_request(error.to_string())
            }
            ArchiveError::Storage(BlobStoreError::InvalidKey { .. }) => {
                Self::invalid_request(error.to_string())
            }
            ArchiveError::Storage(BlobStoreError::Write { .. }) => {
                Self::internal(error.to_string())
            }
        }
    }
}

fn validate_filename(filename: &str) -> Result<(), ArchiveError> {
    let acceptable = !filename.trim().is_empty()
        && !filename.contains(['/', '\\'])
        && !filename.contains("..");
    if acceptable {
        Ok(())
    } else {
        Err(ArchiveError::InvalidFilename {
            filename: filename.to_owned(),
        })
    }
}

/// Stores JPEG uploads under `YYYY/M/D/<filename>`.
#[derive(Clone)]
pub struct ImageArchive {
    blobs: Arc<dyn BlobStore>,
    clock: Arc<dyn Clock>,
}

impl ImageArchive {
    /// Build an archive writing to `blobs` and dating keys with `clock`.
    pub fn new(blobs: Arc<dyn BlobStore>, clock: Arc<dyn Clock>) -> Self {
        Self { blobs, clock }
    }

    /// Store `bytes` and return the filename they were stored under.
    ///
    /// # Errors
    ///
    /// Rejects non-JPEG content and multi-segment filenames before writing.
    pub async fn archive(
        &self,
        filename: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, ArchiveError> {
        if content_type != JPEG_CONTENT_TYPE {
            return Err(ArchiveError::InvalidContentType {
                content_type: content_type.to_owned(),
            });
        }
        validate_filename(filename)?;

        let today = self.clock.utc().date_naive();
        let key = format!(
            "{}/{}/{}/{filename}",
            today.year(),
            today.month(),
            today.day()
        );
        let size = bytes.len();
        self.blobs.put(&key, content_type, bytes).await?;
        info!(key = %key, bytes = size, "archived image");
        Ok(filename.to_owned())
    }
}
