//! A minimal HTTP-to-SQL relay for SQL Server.
//!
//! `POST /query` with either a JSON string or `{ "query": "..." }` runs the SQL
//! verbatim and answers `{ "rows": [...] }`. The pieces:
//!
//! - [`config`]: connection settings from the environment, with aliases
//! - [`ConnectionManager`]: the single pool's lifecycle (`init`, `is_connected`, `query`, `close`)
//! - [`mssql`]: tiberius + deadpool backend
//! - [`server`]: the axum router and listener

pub mod backend;
pub mod config;
pub mod error;
pub mod manager;
pub mod mssql;
pub mod policy;
pub mod request;
pub mod results;
pub mod server;
pub mod types;

pub use backend::{Connector, QueryPool};
pub use config::{DbPort, DbSettings};
pub use error::RelayError;
pub use manager::ConnectionManager;
pub use mssql::{MssqlConnector, MssqlPool};
pub use policy::StatementPolicy;
pub use request::QueryRequest;
pub use results::{CustomDbRow, ResultSet};
pub use types::RowValues;
