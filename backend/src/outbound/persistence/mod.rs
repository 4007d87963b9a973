//! PostgreSQL persistence adapter using Diesel ORM.
//!
//! Provides the durable `DocumentStore` backed by a single JSONB table,
//! with async access through `diesel-async` and `bb8` connection pooling.
//! Row structs and schema definitions stay internal to this module.
//!
//! # Example
//!
//! ```ignore
//! use telemetry_relay::outbound::persistence::{
//!     run_migrations, DbPool, DieselDocumentStore, PoolConfig,
//! };
//!
//! run_migrations("postgres://localhost/relay").await?;
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/relay")).await?;
//! let store = DieselDocumentStore::new(pool, "home");
//! ```

mod diesel_document_store;
mod json_serializers;
mod models;
mod pool;
mod schema;

pub use diesel_document_store::DieselDocumentStore;
pub use pool::{DbPool, PoolConfig, PoolError, run_migrations};
