use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    MssqlError(#[from] tiberius::error::Error),

    #[error(transparent)]
    PoolErrorMssql(#[from] deadpool::managed::PoolError<tiberius::error::Error>),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("DB not connected")]
    NotConnected,

    #[error("Request body must be a SQL string or {{ query: string }}")]
    InvalidRequest,

    #[error("Statement not allowed: {0}")]
    PolicyError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),
}
