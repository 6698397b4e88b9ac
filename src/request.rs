use serde::Deserialize;

use crate::error::RelayError;

/// Accepted `POST /query` bodies: a bare JSON string, or an object with a `query` string.
///
/// Extra object fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum QueryRequest {
    Bare(String),
    Wrapped { query: String },
}

impl QueryRequest {
    /// Parse a raw request body.
    ///
    /// # Errors
    /// Returns `RelayError::InvalidRequest` for anything that is not one of the two shapes.
    pub fn from_slice(body: &[u8]) -> Result<Self, RelayError> {
        serde_json::from_slice(body).map_err(|_| RelayError::InvalidRequest)
    }

    /// The SQL text to forward. An empty statement counts as missing.
    ///
    /// # Errors
    /// Returns `RelayError::InvalidRequest` when the SQL text is empty.
    pub fn into_sql(self) -> Result<String, RelayError> {
        let sql = match self {
            QueryRequest::Bare(sql) | QueryRequest::Wrapped { query: sql } => sql,
        };
        if sql.is_empty() {
            Err(RelayError::InvalidRequest)
        } else {
            Ok(sql)
        }
    }
}

/// Normalize a request body into the SQL text to run.
///
/// # Errors
/// Returns `RelayError::InvalidRequest` when the body has neither accepted shape.
pub fn sql_from_body(body: &[u8]) -> Result<String, RelayError> {
    QueryRequest::from_slice(body)?.into_sql()
}
