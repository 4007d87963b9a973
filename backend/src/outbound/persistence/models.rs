//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain.

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use super::schema::documents;

/// Row struct for reading from the documents table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = documents)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct DocumentRow {
    pub id: String,
    pub body: serde_json::Value,
}

/// Insertable struct for creating or replacing documents.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = documents)]
pub(crate) struct NewDocumentRow<'a> {
    pub project: &'a str,
    pub collection: &'a str,
    pub id: &'a str,
    pub body: &'a serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

/// Changeset applied when a document is overwritten.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = documents)]
pub(crate) struct DocumentUpdate<'a> {
    pub body: &'a serde_json::Value,
    pub updated_at: DateTime<Utc>,
}
