use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};

/// A single cell read back from SQL Server.
///
/// Cells are normalized into this enum before being handed to JSON, so the HTTP layer
/// never needs to know about driver column types:
/// ```rust
/// use sql_relay::RowValues;
///
/// let cell = RowValues::Int(1);
/// assert_eq!(serde_json::to_string(&cell).unwrap(), "1");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit), covers `tinyint` through `bigint`
    Int(i64),
    /// Floating point value (64-bit), also used for `decimal`/`numeric`/`money`
    Float(f64),
    /// Text value, also used for GUIDs, XML and `time`
    Text(String),
    /// `bit`
    Bool(bool),
    /// Date and time value, rendered as UTC ISO-8601
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// Binary data
    Blob(Vec<u8>),
}

impl Serialize for RowValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RowValues::Int(i) => serializer.serialize_i64(*i),
            // serde_json turns non-finite floats into null
            RowValues::Float(f) => serializer.serialize_f64(*f),
            RowValues::Text(s) => serializer.serialize_str(s),
            RowValues::Bool(b) => serializer.serialize_bool(*b),
            RowValues::Timestamp(dt) => {
                serializer.collect_str(&dt.format("%Y-%m-%dT%H:%M:%S%.3fZ"))
            }
            RowValues::Null => serializer.serialize_none(),
            RowValues::Blob(bytes) => serializer.collect_seq(bytes),
        }
    }
}
