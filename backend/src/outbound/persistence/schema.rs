//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match `backend/migrations` exactly.

diesel::table! {
    /// Every stored document, one row per (project, collection path, id).
    documents (project, collection, id) {
        /// Configured store project identifier.
        project -> Text,
        /// Slash-joined collection path, e.g. `device/Hall/log`.
        collection -> Text,
        /// Document id within the collection.
        id -> Text,
        /// Encoded document body.
        body -> Jsonb,
        /// Database time of the last write.
        updated_at -> Timestamptz,
    }
}
