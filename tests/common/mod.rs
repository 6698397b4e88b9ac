#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sql_relay::{Connector, QueryPool, RelayError, ResultSet, RowValues};

/// In-memory stand-in for SQL Server.
///
/// `SELECT 1` yields one row `{x: 1}`; any other statement fails the way the
/// engine reports a syntax error.
#[derive(Clone, Default)]
pub struct FakeConnector {
    pub attempts: Arc<AtomicUsize>,
    pub queries: Arc<AtomicUsize>,
    pub refuse: Arc<AtomicBool>,
    pub close_fails: bool,
    pub connect_delay: Option<Duration>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refusing() -> Self {
        let connector = Self::default();
        connector.refuse.store(true, Ordering::SeqCst);
        connector
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    type Pool = FakePool;

    async fn connect(&self) -> Result<FakePool, RelayError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        if self.refuse.load(Ordering::SeqCst) {
            return Err(RelayError::ConnectionError(
                "Failed to connect to SQL Server at localhost:1433: connection refused".into(),
            ));
        }
        Ok(FakePool {
            queries: Arc::clone(&self.queries),
            close_fails: self.close_fails,
            closed: AtomicBool::new(false),
        })
    }
}

#[derive(Debug)]
pub struct FakePool {
    queries: Arc<AtomicUsize>,
    close_fails: bool,
    pub closed: AtomicBool,
}

#[async_trait]
impl QueryPool for FakePool {
    async fn query(&self, sql: &str) -> Result<ResultSet, RelayError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if sql.trim() == "SELECT 1" {
            let mut rs = ResultSet::with_capacity(1);
            rs.set_column_names(Arc::new(vec!["x".to_string()]));
            rs.add_row_values(vec![RowValues::Int(1)]);
            Ok(rs)
        } else {
            let near = sql.split_whitespace().next().unwrap_or_default();
            Err(RelayError::ExecutionError(format!(
                "Incorrect syntax near '{near}'."
            )))
        }
    }

    async fn close(&self) -> Result<(), RelayError> {
        self.closed.store(true, Ordering::SeqCst);
        if self.close_fails {
            Err(RelayError::ConnectionError("socket already closed".into()))
        } else {
            Ok(())
        }
    }
}
