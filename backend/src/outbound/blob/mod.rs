//! Filesystem `BlobStore` confined to one directory with `cap-std`.
//!
//! Keys are relative slash-separated paths below the root directory; the
//! capability handle makes escaping the root impossible even for keys that
//! slip past validation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use cap_std::ambient_authority;
use cap_std::fs::Dir;
use tracing::debug;

use crate::domain::ports::{BlobStore, BlobStoreError};

/// Blob store writing files under a root directory.
#[derive(Clone)]
pub struct CapStdBlobStore {
    root: Arc<Dir>,
}

impl CapStdBlobStore {
    /// Open `root`, creating it when missing.
    ///
    /// # Errors
    ///
    /// Returns the I/O error when the directory cannot be created or opened.
    pub fn open(root: &Path) -> std::io::Result<Self> {
        Dir::create_ambient_dir_all(root, ambient_authority())?;
        let dir = Dir::open_ambient_dir(root, ambient_authority())?;
        Ok(Self {
            root: Arc::new(dir),
        })
    }
}

fn relative_key(key: &str) -> Result<PathBuf, BlobStoreError> {
    let segments: Vec<&str> = key.split('/').collect();
    let valid = segments
        .iter()
        .all(|segment| !segment.is_empty() && *segment != "." && *segment != "..");
    if !valid {
        return Err(BlobStoreError::invalid_key(key));
    }
    Ok(segments.iter().collect())
}

#[async_trait]
impl BlobStore for CapStdBlobStore {
    async fn put(
        &self,
        key: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(), BlobStoreError> {
        let path = relative_key(key)?;
        let root = self.root.clone();
        let size = bytes.len();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                root.create_dir_all(parent)?;
            }
            root.write(&path, bytes)
        })
        .await
        .map_err(|error| BlobStoreError::write(error.to_string()))?
        .map_err(|error| BlobStoreError::write(error.to_string()))?;
        debug!(key, content_type, bytes = size, "wrote blob");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[tokio::test]
    async fn writes_nested_keys_below_the_root() {
        let temp = TempDir::new().expect("temp dir");
        let store = CapStdBlobStore::open(&temp.path().join("images")).expect("open store");

        store
            .put("2024/3/7/porch.jpg", "image/jpeg", b"jpeg".to_vec())
            .await
            .expect("write");

        let dir = Dir::open_ambient_dir(temp.path().join("images"), ambient_authority())
            .expect("open root");
        assert_eq!(dir.read("2024/3/7/porch.jpg").expect("read back"), b"jpeg");
    }

    #[rstest]
    #[case::parent("../escape.jpg")]
    #[case::absolute("/etc/passwd")]
    #[case::empty_segment("2024//porch.jpg")]
    #[case::current("./porch.jpg")]
    #[tokio::test]
    async fn rejects_keys_leaving_the_root(#[case] key: &str) {
        let temp = TempDir::new().expect("temp dir");
        let store = CapStdBlobStore::open(temp.path()).expect("open store");

        let error = store
            .put(key, "image/jpeg", Vec::new())
            .await
            .expect_err("key rejected");

        assert!(matches!(error, BlobStoreError::InvalidKey { .. }));
    }
}
