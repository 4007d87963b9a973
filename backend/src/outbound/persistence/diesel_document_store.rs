//! PostgreSQL-backed `DocumentStore` implementation using Diesel ORM.
//!
//! All documents share one table keyed by `(project, collection, id)`.
//! Writes read the database clock inside their transaction so server
//! timestamps never depend on the application host's clock. Conditional
//! updates lock the row with `SELECT ... FOR UPDATE` before comparing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::Timestamptz;
use diesel_async::AsyncConnection as _;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use tracing::debug;
use uuid::Uuid;

use crate::domain::ports::{ConditionalWrite, DocumentStore, DocumentStoreError, Precondition};
use crate::domain::{CollectionPath, Document, DocumentPath};

use super::json_serializers::{document_from_json, document_to_json};
use super::models::{DocumentRow, DocumentUpdate, NewDocumentRow};
use super::pool::{DbPool, PoolError};
use super::schema::documents;

/// Diesel-backed implementation of the `DocumentStore` port.
#[derive(Clone)]
pub struct DieselDocumentStore {
    pool: DbPool,
    project: String,
}

impl DieselDocumentStore {
    /// Create a store scoped to `project` over the given pool.
    pub fn new(pool: DbPool, project: impl Into<String>) -> Self {
        Self {
            pool,
            project: project.into(),
        }
    }
}

fn map_pool_error(error: PoolError) -> DocumentStoreError {
    match error {
        PoolError::Checkout { message }
        | PoolError::Build { message }
        | PoolError::Migration { message } => DocumentStoreError::unavailable(message),
    }
}

fn map_diesel_error(error: diesel::result::Error) -> DocumentStoreError {
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
        }
        _ => debug!(
            error_type = %std::any::type_name_of_val(&error),
            "diesel operation failed"
        ),
    }

    match error {
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            DocumentStoreError::unavailable("database connection error")
        }
        DieselError::QueryBuilderError(_) => DocumentStoreError::query("database query error"),
        _ => DocumentStoreError::query("database error"),
    }
}

fn decode(
    collection: &str,
    id: &str,
    body: serde_json::Value,
) -> Result<Document, DocumentStoreError> {
    document_from_json(body).ok_or_else(|| {
        DocumentStoreError::query(format!("stored body of {collection}/{id} is not an object"))
    })
}

async fn database_now(conn: &mut AsyncPgConnection) -> QueryResult<DateTime<Utc>> {
    diesel::select(diesel::dsl::sql::<Timestamptz>("now()"))
        .get_result(conn)
        .await
}

async fn upsert(
    conn: &mut AsyncPgConnection,
    project: &str,
    collection: &str,
    id: &str,
    document: &Document,
) -> QueryResult<()> {
    let now = database_now(conn).await?;
    let body = document_to_json(document, now);
    let row = NewDocumentRow {
        project,
        collection,
        id,
        body: &body,
        updated_at: now,
    };
    diesel::insert_into(documents::table)
        .values(&row)
        .on_conflict((documents::project, documents::collection, documents::id))
        .do_update()
        .set(&DocumentUpdate {
            body: &body,
            updated_at: now,
        })
        .execute(conn)
        .await?;
    Ok(())
}

#[async_trait]
impl DocumentStore for DieselDocumentStore {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>, DocumentStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let collection = path.parent().as_str();
        let row: Option<DocumentRow> = documents::table
            .filter(documents::project.eq(&self.project))
            .filter(documents::collection.eq(collection))
            .filter(documents::id.eq(path.id()))
            .select(DocumentRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(|row| decode(collection, &row.id, row.body)).transpose()
    }

    async fn set(
        &self,
        path: &DocumentPath,
        document: Document,
    ) -> Result<(), DocumentStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let project = self.project.as_str();
        let collection = path.parent().as_str();
        let id = path.id();
        conn.transaction(|conn| {
            async move { upsert(conn, project, collection, id, &document).await }.scope_boxed()
        })
        .await
        .map_err(map_diesel_error)
    }

    async fn add(
        &self,
        collection: &CollectionPath,
        document: Document,
    ) -> Result<String, DocumentStoreError> {
        let id = Uuid::new_v4().simple().to_string();
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let project = self.project.as_str();
        let collection = collection.as_str();
        let new_id = id.clone();
        conn.transaction(|conn| {
            async move { upsert(conn, project, collection, &new_id, &document).await }
                .scope_boxed()
        })
        .await
        .map_err(map_diesel_error)?;
        drop(conn);
        Ok(id)
    }

    async fn list(
        &self,
        collection: &CollectionPath,
    ) -> Result<Vec<(String, Document)>, DocumentStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<DocumentRow> = documents::table
            .filter(documents::project.eq(&self.project))
            .filter(documents::collection.eq(collection.as_str()))
            .select(DocumentRow::as_select())
            .order_by(documents::id)
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        rows.into_iter()
            .map(|row| {
                let document = decode(collection.as_str(), &row.id, row.body)?;
                Ok((row.id, document))
            })
            .collect()
    }

    async fn update_if(
        &self,
        path: &DocumentPath,
        precondition: &Precondition,
        changes: Document,
    ) -> Result<ConditionalWrite, DocumentStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let project = self.project.as_str();
        let collection = path.parent().as_str();
        let id = path.id();
        let outcome = conn
            .transaction::<_, diesel::result::Error, _>(|conn| {
                async move {
                    let body: Option<serde_json::Value> = documents::table
                        .filter(documents::project.eq(project))
                        .filter(documents::collection.eq(collection))
                        .filter(documents::id.eq(id))
                        .select(documents::body)
                        .for_update()
                        .first(conn)
                        .await
                        .optional()?;
                    let Some(body) = body else {
                        return Ok(Ok(ConditionalWrite::Missing));
                    };
                    let mut current = match decode(collection, id, body) {
                        Ok(current) => current,
                        Err(error) => return Ok(Err(error)),
                    };
                    if !precondition.holds_for(&current) {
                        return Ok(Ok(ConditionalWrite::PreconditionFailed));
                    }
                    current.extend(changes);
                    upsert(conn, project, collection, id, &current).await?;
                    Ok(Ok(ConditionalWrite::Applied))
                }
                .scope_boxed()
            })
            .await
            .map_err(map_diesel_error)?;
        debug!(path = %path, ?outcome, "conditional update finished");
        outcome
    }
}
