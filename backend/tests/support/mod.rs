//! Helpers shared by the integration suites that talk to PostgreSQL.

mod cluster_skip;

pub use cluster_skip::handle_cluster_setup_failure;

use postgres::{Client, NoTls};

/// Render a `postgres` error with its SQLSTATE and detail.
///
/// `Display` collapses database errors to a bare `db error`.
pub fn format_postgres_error(error: &postgres::Error) -> String {
    let Some(db_error) = error.as_db_error() else {
        return error.to_string();
    };
    let mut summary = format!(
        "postgres error {:?}: {}",
        db_error.code(),
        db_error.message()
    );
    if let Some(detail) = db_error.detail() {
        summary.push_str("; detail: ");
        summary.push_str(detail);
    }
    summary
}

/// Drop and recreate `name` through the cluster's `postgres` database.
///
/// Uses the blocking client so `DROP DATABASE` runs outside a transaction.
pub fn reset_database(admin_url: &str, name: &str) -> Result<(), String> {
    let mut client =
        Client::connect(admin_url, NoTls).map_err(|err| format_postgres_error(&err))?;
    // Separate round trips: a multi-statement batch is an implicit transaction.
    client
        .batch_execute(&format!("DROP DATABASE IF EXISTS \"{name}\" WITH (FORCE)"))
        .map_err(|err| format_postgres_error(&err))?;
    client
        .batch_execute(&format!("CREATE DATABASE \"{name}\""))
        .map_err(|err| format_postgres_error(&err))
}
