use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;

use crate::error::SqlCapError;
use crate::types::RowValues;

/// Read a Rust value out of a column value.
///
/// `Option<T>` maps NULL to `None`; every other impl treats NULL as an error.
pub trait FromRowValue: Sized {
    /// # Errors
    /// Returns `SqlCapError::ParameterError` when the value has an incompatible type.
    fn from_row_value(value: &RowValues) -> Result<Self, SqlCapError>;
}

fn mismatch(value: &RowValues, target: &str) -> SqlCapError {
    SqlCapError::ParameterError(format!("cannot read {} column as {target}", value.kind()))
}

impl FromRowValue for RowValues {
    fn from_row_value(value: &RowValues) -> Result<Self, SqlCapError> {
        Ok(value.clone())
    }
}

impl FromRowValue for i64 {
    fn from_row_value(value: &RowValues) -> Result<Self, SqlCapError> {
        value.as_int().copied().ok_or_else(|| mismatch(value, "i64"))
    }
}

impl FromRowValue for i32 {
    fn from_row_value(value: &RowValues) -> Result<Self, SqlCapError> {
        let wide = i64::from_row_value(value)?;
        i32::try_from(wide)
            .map_err(|e| SqlCapError::ParameterError(format!("{wide} does not fit in i32: {e}")))
    }
}

impl FromRowValue for f64 {
    fn from_row_value(value: &RowValues) -> Result<Self, SqlCapError> {
        value.as_float().ok_or_else(|| mismatch(value, "f64"))
    }
}

impl FromRowValue for bool {
    fn from_row_value(value: &RowValues) -> Result<Self, SqlCapError> {
        value.as_bool().ok_or_else(|| mismatch(value, "bool"))
    }
}

impl FromRowValue for String {
    fn from_row_value(value: &RowValues) -> Result<Self, SqlCapError> {
        value
            .as_text()
            .map(ToOwned::to_owned)
            .ok_or_else(|| mismatch(value, "String"))
    }
}

impl FromRowValue for Vec<u8> {
    fn from_row_value(value: &RowValues) -> Result<Self, SqlCapError> {
        value
            .as_blob()
            .map(<[u8]>::to_vec)
            .ok_or_else(|| mismatch(value, "Vec<u8>"))
    }
}

impl FromRowValue for NaiveDateTime {
    fn from_row_value(value: &RowValues) -> Result<Self, SqlCapError> {
        value
            .as_timestamp()
            .ok_or_else(|| mismatch(value, "NaiveDateTime"))
    }
}

// SQLite has no JSON type, so JSON comes back as text.
impl FromRowValue for JsonValue {
    fn from_row_value(value: &RowValues) -> Result<Self, SqlCapError> {
        match value {
            RowValues::JSON(json) => Ok(json.clone()),
            RowValues::Text(text) => serde_json::from_str(text)
                .map_err(|e| SqlCapError::ParameterError(format!("invalid JSON text: {e}"))),
            other => Err(mismatch(other, "JSON")),
        }
    }
}

impl<T: FromRowValue> FromRowValue for Option<T> {
    fn from_row_value(value: &RowValues) -> Result<Self, SqlCapError> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_row_value(value).map(Some)
        }
    }
}
