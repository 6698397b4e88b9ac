//! Lifecycle guard around the process's single connection pool.
//!
//! The manager is either disconnected (no handle) or connected (one published
//! handle). `init` is serialized so concurrent callers share the outcome of the
//! attempt in flight, and a handle is only published once the pool is ready.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::Mutex;

use crate::backend::{Connector, QueryPool};
use crate::error::RelayError;
use crate::results::ResultSet;

pub struct ConnectionManager<C: Connector> {
    connector: C,
    handle: RwLock<Option<Arc<C::Pool>>>,
    lifecycle: Mutex<()>,
}

impl<C: Connector> std::fmt::Debug for ConnectionManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl<C: Connector> ConnectionManager<C> {
    /// A disconnected manager. Nothing touches the network until [`Self::init`].
    #[must_use]
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            handle: RwLock::new(None),
            lifecycle: Mutex::new(()),
        }
    }

    /// Connect if needed and return the pool handle.
    ///
    /// Returns the existing handle without a new attempt when already connected.
    /// A failed attempt is logged and yields `None`; it never surfaces as an error.
    pub async fn init(&self) -> Option<Arc<C::Pool>> {
        let _lifecycle = self.lifecycle.lock().await;
        if let Some(pool) = self.handle() {
            return Some(pool);
        }

        match self.connector.connect().await {
            Ok(pool) => {
                let pool = Arc::new(pool);
                *self.write_slot() = Some(Arc::clone(&pool));
                tracing::info!("DB pool connected");
                Some(pool)
            }
            Err(e) => {
                tracing::error!("DB connection error: {}", e);
                None
            }
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.read_slot().is_some()
    }

    /// The published handle, if any.
    #[must_use]
    pub fn handle(&self) -> Option<Arc<C::Pool>> {
        self.read_slot().clone()
    }

    /// Run `sql` verbatim against the pool.
    ///
    /// # Errors
    /// Returns `RelayError::NotConnected` without any I/O when no pool is published;
    /// otherwise whatever the engine reports.
    pub async fn query(&self, sql: &str) -> Result<ResultSet, RelayError> {
        let pool = self.handle().ok_or(RelayError::NotConnected)?;
        pool.query(sql).await
    }

    /// Close the pool if one is published. Close errors are logged, and the
    /// manager is disconnected afterwards either way.
    pub async fn close(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        let Some(pool) = self.take_handle() else {
            return;
        };
        if let Err(e) = pool.close().await {
            tracing::warn!("Error closing DB pool: {}", e);
        }
    }

    fn take_handle(&self) -> Option<Arc<C::Pool>> {
        self.write_slot().take()
    }

    fn read_slot(&self) -> RwLockReadGuard<'_, Option<Arc<C::Pool>>> {
        match self.handle.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_slot(&self) -> RwLockWriteGuard<'_, Option<Arc<C::Pool>>> {
        match self.handle.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
