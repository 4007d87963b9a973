//! bb8 pool of async Diesel connections plus embedded schema migrations.

use std::time::Duration;

use diesel::Connection;
use diesel::pg::PgConnection;
use diesel_async::AsyncPgConnection;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::info;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Errors that can occur during pool operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// Failed to check out a connection from the pool.
    #[error("failed to get connection from pool: {message}")]
    Checkout { message: String },

    /// Failed to build the connection pool.
    #[error("failed to build connection pool: {message}")]
    Build { message: String },

    /// Failed to bring the schema up to date.
    #[error("failed to run migrations: {message}")]
    Migration { message: String },
}

impl PoolError {
    /// Create a checkout error with the given message.
    pub fn checkout(message: impl Into<String>) -> Self {
        Self::Checkout {
            message: message.into(),
        }
    }

    /// Create a build error with the given message.
    pub fn build(message: impl Into<String>) -> Self {
        Self::Build {
            message: message.into(),
        }
    }

    /// Create a migration error with the given message.
    pub fn migration(message: impl Into<String>) -> Self {
        Self::Migration {
            message: message.into(),
        }
    }
}

/// Configuration for the database connection pool.
///
/// ```
/// use std::time::Duration;
/// use telemetry_relay::outbound::persistence::PoolConfig;
///
/// let config = PoolConfig::new("postgres://relay@localhost/relay")
///     .with_max_size(4)
///     .with_connection_timeout(Duration::from_secs(5));
/// assert_eq!(config.database_url(), "postgres://relay@localhost/relay");
/// ```
#[derive(Debug, Clone)]
pub struct PoolConfig {
    database_url: String,
    max_size: u32,
    min_idle: Option<u32>,
    connection_timeout: Duration,
}

impl PoolConfig {
    /// Defaults: 10 connections, 1 idle, 30 second checkout timeout.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_size: 10,
            min_idle: Some(1),
            connection_timeout: Duration::from_secs(30),
        }
    }

    /// Set the maximum number of connections in the pool.
    pub fn with_max_size(mut self, max_size: u32) -> Self {
        self.max_size = max_size;
        self
    }

    /// Set the minimum number of idle connections to maintain.
    pub fn with_min_idle(mut self, min_idle: Option<u32>) -> Self {
        self.min_idle = min_idle;
        self
    }

    /// Set the connection checkout timeout.
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Get the database URL.
    pub fn database_url(&self) -> &str {
        &self.database_url
    }
}

/// Async connection pool for PostgreSQL via Diesel.
#[derive(Clone)]
pub struct DbPool {
    inner: Pool<AsyncPgConnection>,
}

impl DbPool {
    /// Build the pool.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::Build` for an invalid URL or unreachable server.
    pub async fn new(config: PoolConfig) -> Result<Self, PoolError> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(&config.database_url);

        let pool = Pool::builder()
            .max_size(config.max_size)
            .min_idle(config.min_idle)
            .connection_timeout(config.connection_timeout)
            .build(manager)
            .await
            .map_err(|err| PoolError::build(err.to_string()))?;

        Ok(Self { inner: pool })
    }

    /// Check out a connection.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::Checkout` when none is available in time.
    pub async fn get(&self) -> Result<PooledConnection<'_, AsyncPgConnection>, PoolError> {
        self.inner
            .get()
            .await
            .map_err(|err| PoolError::checkout(err.to_string()))
    }
}

/// Apply pending embedded migrations over a blocking connection.
///
/// # Errors
///
/// Returns `PoolError::Migration` when connecting or migrating fails.
pub async fn run_migrations(database_url: &str) -> Result<(), PoolError> {
    let url = database_url.to_owned();
    let applied = tokio::task::spawn_blocking(move || -> Result<usize, PoolError> {
        let mut conn =
            PgConnection::establish(&url).map_err(|err| PoolError::migration(err.to_string()))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map(|versions| versions.len())
            .map_err(|err| PoolError::migration(err.to_string()))
    })
    .await
    .map_err(|err| PoolError::migration(err.to_string()))??;
    info!(applied, "database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn pool_config_defaults() {
        let config = PoolConfig::new("postgres://localhost/relay");

        assert_eq!(config.database_url(), "postgres://localhost/relay");
        assert_eq!(config.max_size, 10);
        assert_eq!(config.min_idle, Some(1));
        assert_eq!(config.connection_timeout, Duration::from_secs(30));
    }

    #[rstest]
    fn pool_config_builder() {
        let config = PoolConfig::new("postgres://localhost/relay")
            .with_max_size(2)
            .with_min_idle(None)
            .with_connection_timeout(Duration::from_secs(3));

        assert_eq!(config.max_size, 2);
        assert_eq!(config.min_idle, None);
        assert_eq!(config.connection_timeout, Duration::from_secs(3));
    }

    #[rstest]
    #[case::checkout(PoolError::checkout("connection refused"), "failed to get connection from pool: connection refused")]
    #[case::migration(PoolError::migration("relation exists"), "failed to run migrations: relation exists")]
    fn pool_error_display(#[case] error: PoolError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }
}
