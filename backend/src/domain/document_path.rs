//! Hierarchical addresses for documents and collections.
//!
//! A collection path alternates collection and document segments and always
//! ends on a collection (`device`, `device/Hall/log`). A document path is a
//! collection path plus one document id.

use std::fmt;

/// Reasons a path segment is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentPathError {
    /// The segment was empty or only whitespace.
    #[error("path segment must not be empty")]
    EmptySegment,
    /// The segment contained a `/`.
    #[error("path segment must not contain '/': {segment}")]
    Separator { segment: String },
}

fn validate_segment(segment: &str) -> Result<(), DocumentPathError> {
    if segment.trim().is_empty() {
        return Err(DocumentPathError::EmptySegment);
    }
    if segment.contains('/') {
        return Err(DocumentPathError::Separator {
            segment: segment.to_owned(),
        });
    }
    Ok(())
}

/// Address of a collection.
///
/// # Examples
/// ```
/// use telemetry_relay::domain::CollectionPath;
///
/// let log = CollectionPath::root("device")?.doc("Hall")?.collection("log")?;
/// assert_eq!(log.as_str(), "device/Hall/log");
/// # Ok::<(), telemetry_relay::domain::DocumentPathError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CollectionPath(String);

impl CollectionPath {
    /// Top-level collection.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentPathError`] for an invalid segment.
    pub fn root(name: &str) -> Result<Self, DocumentPathError> {
        validate_segment(name)?;
        Ok(Self(name.to_owned()))
    }

    /// Document `id` inside this collection.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentPathError`] for an invalid id.
    pub fn doc(&self, id: &str) -> Result<DocumentPath, DocumentPathError> {
        validate_segment(id)?;
        Ok(DocumentPath {
            collection: self.clone(),
            id: id.to_owned(),
        })
    }

    /// Slash-joined representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Address of a single document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentPath {
    collection: CollectionPath,
    id: String,
}

impl DocumentPath {
    /// Sub-collection nested under this document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentPathError`] for an invalid segment.
    pub fn collection(&self, name: &str) -> Result<CollectionPath, DocumentPathError> {
        validate_segment(name)?;
        Ok(CollectionPath(format!("{self}/{name}")))
    }

    /// Parent collection.
    pub fn parent(&self) -> &CollectionPath {
        &self.collection
    }

    /// Final segment.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}
