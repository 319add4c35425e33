use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use tokio_postgres::types::Type;
use tokio_postgres::{Row, Statement};

use crate::error::SqlCapError;
use crate::results::Rows;
use crate::types::RowValues;

/// Extracts a `RowValues` from a `tokio_postgres` Row at the given index.
///
/// # Errors
/// Returns the driver error if the column cannot be decoded.
pub fn postgres_extract_value(row: &Row, idx: usize) -> Result<RowValues, SqlCapError> {
    let type_info = row.columns()[idx].type_();

    let value = match *type_info {
        Type::INT2 => row
            .try_get::<_, Option<i16>>(idx)?
            .map(|v| RowValues::Int(i64::from(v))),
        Type::INT4 => row
            .try_get::<_, Option<i32>>(idx)?
            .map(|v| RowValues::Int(i64::from(v))),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx)?.map(RowValues::Int),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(idx)?
            .map(|v| RowValues::Float(f64::from(v))),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx)?.map(RowValues::Float),
        Type::BOOL => row.try_get::<_, Option<bool>>(idx)?.map(RowValues::Bool),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(RowValues::Timestamp),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(|v| RowValues::Timestamp(v.naive_utc())),
        Type::DATE => row
            .try_get::<_, Option<NaiveDate>>(idx)?
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(RowValues::Timestamp),
        Type::JSON | Type::JSONB => row.try_get::<_, Option<Value>>(idx)?.map(RowValues::JSON),
        Type::BYTEA => row.try_get::<_, Option<Vec<u8>>>(idx)?.map(RowValues::Blob),
        // text, varchar, bpchar, name and anything else readable as a string
        _ => row.try_get::<_, Option<String>>(idx)?.map(RowValues::Text),
    };

    Ok(value.unwrap_or(RowValues::Null))
}

/// Build a cursor using statement metadata for column names, so an empty result still
/// reports its columns.
///
/// # Errors
/// Returns errors from row value extraction.
pub fn build_rows(stmt: &Statement, rows: &[Row]) -> Result<Rows, SqlCapError> {
    let column_names: Vec<String> = stmt
        .columns()
        .iter()
        .map(|col| col.name().to_string())
        .collect();
    let column_count = column_names.len();

    let mut result = Rows::with_capacity(column_names, rows.len());
    for row in rows {
        let mut row_values = Vec::with_capacity(column_count);
        for idx in 0..column_count {
            row_values.push(postgres_extract_value(row, idx)?);
        }
        result.push_row(row_values);
    }

    Ok(result)
}
