use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use tiberius::{ColumnData, FromSql};

use super::config::MssqlClient;
use crate::error::RelayError;
use crate::results::ResultSet;
use crate::types::RowValues;

/// Run raw SQL text and collect the first result set.
///
/// Statements that produce no result set (DML, DDL) yield an empty `ResultSet`.
///
/// # Errors
/// Driver errors are returned as `RelayError::MssqlError`, unmodified.
pub async fn build_result_set(
    client: &mut MssqlClient,
    sql: &str,
) -> Result<ResultSet, RelayError> {
    let mut stream = client.simple_query(sql).await?;

    let column_names: Vec<String> = stream
        .columns()
        .await?
        .map(|columns| columns.iter().map(|col| col.name().to_string()).collect())
        .unwrap_or_default();

    let rows = stream.into_first_result().await?;

    let mut result_set = ResultSet::with_capacity(rows.len());
    result_set.set_column_names(Arc::new(column_names));
    for row in &rows {
        let values = row
            .cells()
            .map(|(_, data)| extract_value(data))
            .collect::<Result<Vec<_>, _>>()?;
        result_set.add_row_values(values);
    }

    tracing::debug!("query returned {} rows", result_set.len());
    Ok(result_set)
}

/// Map one cell to a `RowValues`, keyed on the wire type the server sent.
fn extract_value(data: &ColumnData<'static>) -> Result<RowValues, RelayError> {
    let value = match data {
        ColumnData::U8(v) => v.map(|v| RowValues::Int(i64::from(v))),
        ColumnData::I16(v) => v.map(|v| RowValues::Int(i64::from(v))),
        ColumnData::I32(v) => v.map(|v| RowValues::Int(i64::from(v))),
        ColumnData::I64(v) => v.map(RowValues::Int),
        ColumnData::F32(v) => v.map(|v| RowValues::Float(f64::from(v))),
        ColumnData::F64(v) => v.map(RowValues::Float),
        ColumnData::Bit(v) => v.map(RowValues::Bool),
        ColumnData::String(v) => v.as_ref().map(|s| RowValues::Text(s.to_string())),
        ColumnData::Guid(v) => v.map(|g| RowValues::Text(g.to_string().to_uppercase())),
        ColumnData::Binary(v) => v.as_ref().map(|b| RowValues::Blob(b.to_vec())),
        ColumnData::Numeric(v) => v.map(|n| {
            let text = n.to_string();
            match text.parse::<f64>() {
                Ok(f) => RowValues::Float(f),
                Err(_) => RowValues::Text(text),
            }
        }),
        ColumnData::Xml(v) => v
            .as_ref()
            .map(|xml| RowValues::Text(xml.clone().into_owned().into_string())),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            NaiveDateTime::from_sql(data)?.map(RowValues::Timestamp)
        }
        ColumnData::Date(_) => NaiveDate::from_sql(data)?
            .map(|d| RowValues::Timestamp(d.and_time(NaiveTime::MIN))),
        ColumnData::Time(_) => NaiveTime::from_sql(data)?
            .map(|t| RowValues::Text(t.format("%H:%M:%S%.f").to_string())),
        ColumnData::DateTimeOffset(_) => DateTime::<Utc>::from_sql(data)?
            .map(|dt| RowValues::Timestamp(dt.naive_utc())),
        #[allow(unreachable_patterns)]
        _ => None,
    };
    Ok(value.unwrap_or(RowValues::Null))
}
