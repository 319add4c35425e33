use rusqlite::types::Value;

use crate::types::RowValues;

/// Convert a single `RowValue` to a rusqlite `Value`.
///
/// `SQLite` has no boolean, timestamp or JSON storage class: booleans become `0`/`1`,
/// timestamps `YYYY-MM-DD HH:MM:SS[.f]` text and JSON its serialized text.
#[must_use]
pub fn row_value_to_sqlite_value(value: &RowValues) -> Value {
    match value {
        RowValues::Int(i) => Value::Integer(*i),
        RowValues::Float(f) => Value::Real(*f),
        RowValues::Text(s) => Value::Text(s.clone()),
        RowValues::Bool(b) => Value::Integer(i64::from(*b)),
        RowValues::Timestamp(dt) => Value::Text(dt.format("%F %T%.f").to_string()),
        RowValues::Null => Value::Null,
        RowValues::JSON(jval) => Value::Text(jval.to_string()),
        RowValues::Blob(bytes) => Value::Blob(bytes.clone()),
    }
}

/// Owned `SQLite` parameters, movable onto a blocking worker.
#[derive(Debug, Clone, Default)]
pub struct Params(pub Vec<Value>);

impl Params {
    #[must_use]
    pub fn convert(params: &[RowValues]) -> Self {
        Params(params.iter().map(row_value_to_sqlite_value).collect())
    }

    #[must_use]
    pub fn as_values(&self) -> &[Value] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn maps_types_without_native_storage() {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 2)
            .and_then(|d| d.and_hms_opt(3, 4, 5))
            .unwrap();
        let params = Params::convert(&[
            RowValues::Bool(true),
            RowValues::Timestamp(ts),
            RowValues::JSON(serde_json::json!({"k": [1]})),
            RowValues::Null,
        ]);
        assert_eq!(
            params.as_values(),
            &[
                Value::Integer(1),
                Value::Text("2024-01-02 03:04:05".into()),
                Value::Text(r#"{"k":[1]}"#.into()),
                Value::Null,
            ]
        );
    }
}
