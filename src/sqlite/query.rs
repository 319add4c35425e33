use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};

use crate::error::SqlCapError;
use crate::results::{ExecResult, InsertResult, Rows};
use crate::types::RowValues;

fn sqlite_value_to_row_value(value: Value) -> RowValues {
    match value {
        Value::Null => RowValues::Null,
        Value::Integer(i) => RowValues::Int(i),
        Value::Real(f) => RowValues::Float(f),
        Value::Text(s) => RowValues::Text(s),
        Value::Blob(b) => RowValues::Blob(b),
    }
}

/// Run a statement and read every row it returns.
///
/// Statements come from the connection's cache, so repeated text is parsed once per
/// connection.
///
/// # Errors
/// Returns the rusqlite error unchanged.
pub fn select(conn: &Connection, sql: &str, params: &[Value]) -> Result<Rows, SqlCapError> {
    let mut stmt = conn.prepare_cached(sql)?;
    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(std::string::ToString::to_string)
        .collect();
    let col_count = column_names.len();
    let mut rows = Rows::with_capacity(column_names, 10);

    let mut cursor = stmt.query(params_from_iter(params.iter()))?;
    while let Some(row) = cursor.next()? {
        let mut values = Vec::with_capacity(col_count);
        for idx in 0..col_count {
            values.push(sqlite_value_to_row_value(row.get::<_, Value>(idx)?));
        }
        rows.push_row(values);
    }

    Ok(rows)
}

/// # Errors
/// Returns the rusqlite error unchanged.
pub fn execute(conn: &Connection, sql: &str, params: &[Value]) -> Result<ExecResult, SqlCapError> {
    let mut stmt = conn.prepare_cached(sql)?;
    let affected = stmt.execute(params_from_iter(params.iter()))?;
    Ok(ExecResult::new(affected as u64))
}

/// Execute and read `last_insert_rowid` on the same connection before anything else can
/// run on it.
///
/// # Errors
/// Returns the rusqlite error unchanged.
pub fn insert(conn: &Connection, sql: &str, params: &[Value]) -> Result<InsertResult, SqlCapError> {
    let mut stmt = conn.prepare_cached(sql)?;
    let affected = stmt.execute(params_from_iter(params.iter()))?;
    Ok(InsertResult::new(
        affected as u64,
        Some(conn.last_insert_rowid()),
    ))
}

/// Compile `sql` once so syntax errors surface at prepare time; the plan stays cached.
///
/// # Errors
/// Returns the rusqlite error unchanged.
pub fn warm(conn: &Connection, sql: &str) -> Result<(), SqlCapError> {
    conn.prepare_cached(sql)?;
    Ok(())
}
