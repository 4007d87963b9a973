//! Process-local `DocumentStore` used when no database is configured.
//!
//! Data lives for the lifetime of the process. Every operation takes one
//! mutex, so `update_if` is trivially atomic. Server timestamps come from
//! the injected clock.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use mockable::Clock;
use uuid::Uuid;

use crate::domain::ports::{ConditionalWrite, DocumentStore, DocumentStoreError, Precondition};
use crate::domain::value::resolve_document_timestamps;
use crate::domain::{CollectionPath, Document, DocumentPath};

type Collections = BTreeMap<String, BTreeMap<String, Document>>;

/// Mutex-guarded in-memory document store.
pub struct InMemoryDocumentStore {
    collections: Mutex<Collections>,
    clock: Arc<dyn Clock>,
}

impl InMemoryDocumentStore {
    /// Create an empty store stamping writes with `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            collections: Mutex::new(Collections::new()),
            clock,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Collections>, DocumentStoreError> {
        self.collections
            .lock()
            .map_err(|_| DocumentStoreError::unavailable("in-memory store lock poisoned"))
    }

    fn write(
        &self,
        collection: &str,
        id: &str,
        mut document: Document,
    ) -> Result<(), DocumentStoreError> {
        resolve_document_timestamps(&mut document, self.clock.utc());
        self.lock()?
            .entry(collection.to_owned())
            .or_default()
            .insert(id.to_owned(), document);
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>, DocumentStoreError> {
        Ok(self
            .lock()?
            .get(path.parent().as_str())
            .and_then(|documents| documents.get(path.id()))
            .cloned())
    }

    async fn set(
        &self,
        path: &DocumentPath,
        document: Document,
    ) -> Result<(), DocumentStoreError> {
        self.write(path.parent().as_str(), path.id(), document)
    }

    async fn add(
        &self,
        collection: &CollectionPath,
        document: Document,
    ) -> Result<String, DocumentStoreError> {
        let id = Uuid::new_v4().simple().to_string();
        self.write(collection.as_str(), &id, document)?;
        Ok(id)
    }

    async fn list(
        &self,
        collection: &CollectionPath,
    ) -> Result<Vec<(String, Document)>, DocumentStoreError> {
        Ok(self
            .lock()?
            .get(collection.as_str())
            .map(|documents| {
                documents
                    .iter()
                    .map(|(id, document)| (id.clone(), document.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn update_if(
        &self,
        path: &DocumentPath,
        precondition: &Precondition,
        mut changes: Document,
    ) -> Result<ConditionalWrite, DocumentStoreError> {
        resolve_document_timestamps(&mut changes, self.clock.utc());
        let mut collections = self.lock()?;
        let Some(current) = collections
            .get_mut(path.parent().as_str())
            .and_then(|documents| documents.get_mut(path.id()))
        else {
            return Ok(ConditionalWrite::Missing);
        };
        if !precondition.holds_for(current) {
            return Ok(ConditionalWrite::PreconditionFailed);
        }
        current.extend(changes);
        Ok(ConditionalWrite::Applied)
    }
}
