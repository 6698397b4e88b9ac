use async_trait::async_trait;

use crate::error::RelayError;
use crate::results::ResultSet;

/// Opens a connection pool. Called by [`crate::ConnectionManager::init`] only while
/// no pool is published.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Pool: QueryPool;

    /// Establish a pool that is ready to serve queries.
    ///
    /// # Errors
    /// Returns `RelayError::ConnectionError` (or a driver error) if the database
    /// cannot be reached with the configured settings.
    async fn connect(&self) -> Result<Self::Pool, RelayError>;
}

/// A live pool that runs raw SQL text.
#[async_trait]
pub trait QueryPool: Send + Sync + 'static {
    /// Run `sql` verbatim and return the first result set.
    ///
    /// # Errors
    /// Whatever the engine reports, unmodified.
    async fn query(&self, sql: &str) -> Result<ResultSet, RelayError>;

    /// Release every connection held by the pool.
    ///
    /// # Errors
    /// Backend-specific; callers log and continue.
    async fn close(&self) -> Result<(), RelayError>;
}
