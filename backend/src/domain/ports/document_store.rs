//! Document database capability consumed by every relay service.
//!
//! Writes are whole-document overwrites except for [`DocumentStore::update_if`],
//! the single compare-and-set primitive used to consume state tokens.

use async_trait::async_trait;

use super::define_port_error;
use crate::domain::{CollectionPath, Document, DocumentPath, Value};

define_port_error! {
    /// Errors raised by document store adapters.
    pub enum DocumentStoreError {
        /// The backend could not be reached or a connection was lost.
        Unavailable { message: String } => "document store unavailable: {message}",
        /// The backend rejected the operation or returned a malformed payload.
        Query { message: String } => "document store query failed: {message}",
    }
}

/// Field-equality guard evaluated atomically by [`DocumentStore::update_if`].
#[derive(Debug, Clone, PartialEq)]
pub struct Precondition {
    /// Top-level field to inspect.
    pub field: String,
    /// Value the field must currently hold.
    pub expected: Value,
}

impl Precondition {
    /// Require `field` to equal `expected`.
    pub fn field_equals(field: impl Into<String>, expected: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            expected: expected.into(),
        }
    }

    /// Whether `document` satisfies the guard.
    pub fn holds_for(&self, document: &Document) -> bool {
        document.get(&self.field) == Some(&self.expected)
    }
}

/// Outcome of a conditional update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalWrite {
    /// The guard held and the changes were merged.
    Applied,
    /// No document exists at the path.
    Missing,
    /// The document exists but the guard did not hold; nothing was written.
    PreconditionFailed,
}

/// Key/value document database with nested collections.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read one document.
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>, DocumentStoreError>;

    /// Create or wholly replace one document.
    async fn set(&self, path: &DocumentPath, document: Document)
    -> Result<(), DocumentStoreError>;

    /// Insert a document under a store-assigned id and return that id.
    async fn add(
        &self,
        collection: &CollectionPath,
        document: Document,
    ) -> Result<String, DocumentStoreError>;

    /// List the direct children of `collection`, ordered by id.
    async fn list(
        &self,
        collection: &CollectionPath,
    ) -> Result<Vec<(String, Document)>, DocumentStoreError>;

    /// Atomically merge `changes` into the document when `precondition` holds.
    async fn update_if(
        &self,
        path: &DocumentPath,
        precondition: &Precondition,
        changes: Document,
    ) -> Result<ConditionalWrite, DocumentStoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_requires_exact_value() {
        let guard = Precondition::field_equals("used", false);
        let unused = Document::from([("used".to_owned(), Value::Bool(false))]);
        let used = Document::from([("used".to_owned(), Value::Bool(true))]);

        assert!(guard.holds_for(&unused));
        assert!(!guard.holds_for(&used));
        assert!(!guard.holds_for(&Document::new()));
    }
}
