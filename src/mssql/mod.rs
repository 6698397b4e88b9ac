// MSSQL module - SQL Server backend for the relay
//
// - config: tiberius configuration and the deadpool connection manager
// - query: raw SQL execution and result set extraction
// - pool: the `Connector`/`QueryPool` implementation with idle eviction

pub mod config;
pub mod pool;
pub mod query;

pub use config::{MssqlClient, MssqlManager};
pub use pool::{MssqlConnector, MssqlPool};
pub use query::build_result_set;
