use std::cell::Cell;
use std::time::Duration;

use async_trait::async_trait;
use deadpool::Runtime;
use deadpool::managed::{Manager, Pool, PoolError};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::config::MssqlManager;
use super::query::build_result_set;
use crate::backend::{Connector, QueryPool};
use crate::config::DbSettings;
use crate::error::RelayError;
use crate::results::ResultSet;

pub type MssqlDeadpool = Pool<MssqlManager>;

/// Opens SQL Server pools from fixed settings.
#[derive(Debug, Clone)]
pub struct MssqlConnector {
    settings: DbSettings,
}

impl MssqlConnector {
    #[must_use]
    pub fn new(settings: DbSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Connector for MssqlConnector {
    type Pool = MssqlPool;

    async fn connect(&self) -> Result<MssqlPool, RelayError> {
        let settings = &self.settings;
        let manager = MssqlManager::new(settings)?;
        let addr = manager.addr().to_string();

        let pool = Pool::builder(manager)
            .max_size(settings.pool_max)
            .create_timeout(Some(settings.connection_timeout))
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| {
                RelayError::ConnectionError(format!("Failed to create SQL Server pool: {e}"))
            })?;

        // Check out the first connection (plus any minimum) before publishing the pool.
        let mut warm = Vec::with_capacity(settings.pool_min.max(1));
        for _ in 0..settings.pool_min.max(1) {
            match pool.get().await {
                Ok(conn) => warm.push(conn),
                Err(e) => {
                    pool.close();
                    return Err(RelayError::ConnectionError(format!(
                        "Failed to connect to SQL Server at {addr}: {e}"
                    )));
                }
            }
        }
        drop(warm);

        tracing::debug!(
            "SQL Server pool ready at {addr} (max {}, min {})",
            settings.pool_max,
            settings.pool_min
        );
        let reaper = spawn_idle_reaper(pool.clone(), settings.idle_timeout, settings.pool_min);
        Ok(MssqlPool { pool, reaper })
    }
}

/// A connected SQL Server pool plus the task evicting its idle connections.
pub struct MssqlPool {
    pool: MssqlDeadpool,
    reaper: JoinHandle<()>,
}

// Manual Debug implementation: report pool status instead of the reaper handle
impl std::fmt::Debug for MssqlPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MssqlPool")
            .field("status", &self.pool.status())
            .finish()
    }
}

#[async_trait]
impl QueryPool for MssqlPool {
    async fn query(&self, sql: &str) -> Result<ResultSet, RelayError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        build_result_set(&mut conn, sql).await
    }

    async fn close(&self) -> Result<(), RelayError> {
        self.reaper.abort();
        self.pool.close();
        Ok(())
    }
}

impl Drop for MssqlPool {
    fn drop(&mut self) {
        self.reaper.abort();
    }
}

// Backend failures surface as the driver's own error.
fn pool_error(e: PoolError<tiberius::error::Error>) -> RelayError {
    match e {
        PoolError::Backend(e) => RelayError::MssqlError(e),
        other => RelayError::PoolErrorMssql(other),
    }
}

fn reap_interval(idle_timeout: Duration) -> Duration {
    idle_timeout
        .min(Duration::from_secs(1))
        .max(Duration::from_millis(10))
}

// The first `min` idle connections visited survive regardless of age.
fn keep_idle(kept: usize, min: usize, last_used: Duration, idle_timeout: Duration) -> bool {
    kept < min || last_used < idle_timeout
}

/// Periodically drop idle connections unused for `idle_timeout`, keeping `min` of them.
///
/// Idleness comes from deadpool's `Metrics::last_used`, which counts from the last
/// checkout rather than the last return. A connection held by a query longer than
/// `idle_timeout` is therefore evicted on the first tick after it goes back to the pool.
fn spawn_idle_reaper<M>(pool: Pool<M>, idle_timeout: Duration, min: usize) -> JoinHandle<()>
where
    M: Manager + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(reap_interval(idle_timeout));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if pool.is_closed() {
                break;
            }
            let before = pool.status().size;
            let kept = Cell::new(0usize);
            pool.retain(|_, metrics| {
                let keep = keep_idle(kept.get(), min, metrics.last_used(), idle_timeout);
                if keep {
                    kept.set(kept.get() + 1);
                }
                keep
            });
            let evicted = before.saturating_sub(pool.status().size);
            if evicted > 0 {
                tracing::debug!("evicted {evicted} idle connections");
            }
        }
    })
}
