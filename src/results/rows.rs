use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::error::SqlCapError;
use crate::types::RowValues;

use super::FromRowValue;

/// Cursor over the rows a query returned.
///
/// Rows are fully read from the backend before the cursor is handed out, so holding one never
/// pins a pooled connection. An empty result is an empty cursor, not an error.
///
/// ```rust,no_run
/// # use sqlcap::prelude::*;
/// # fn demo(mut rows: Rows) -> Result<(), SqlCapError> {
/// while rows.next() {
///     let id: i64 = rows.scan(0)?;
///     let name: Option<String> = rows.scan(1)?;
///     println!("{id} {name:?}");
/// }
/// rows.close();
/// # Ok(()) }
/// ```
#[derive(Debug)]
pub struct Rows {
    column_names: Arc<Vec<String>>,
    column_index: HashMap<String, usize>,
    pending: VecDeque<Vec<RowValues>>,
    current: Option<Vec<RowValues>>,
    closed: bool,
    err: Option<SqlCapError>,
}

impl Rows {
    pub(crate) fn with_capacity(column_names: Vec<String>, capacity: usize) -> Self {
        let column_index = column_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self {
            column_names: Arc::new(column_names),
            column_index,
            pending: VecDeque::with_capacity(capacity),
            current: None,
            closed: false,
            err: None,
        }
    }

    pub(crate) fn push_row(&mut self, row: Vec<RowValues>) {
        self.pending.push_back(row);
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Advance to the next row. Returns `false` when the rows are exhausted or the cursor is
    /// closed; advancing a closed cursor also records `RowsClosed` in [`Rows::err`].
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> bool {
        if self.closed {
            if self.err.is_none() {
                self.err = Some(SqlCapError::RowsClosed);
            }
            return false;
        }
        self.current = self.pending.pop_front();
        self.current.is_some()
    }

    /// Values of the current row.
    #[must_use]
    pub fn values(&self) -> Option<&[RowValues]> {
        self.current.as_deref()
    }

    /// Value of a column of the current row, by name.
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        let idx = self.column_index.get(column_name)?;
        self.current.as_ref()?.get(*idx)
    }

    /// Convert a column of the current row.
    ///
    /// # Errors
    /// `RowsClosed` after [`Rows::close`], `ExecutionError` with no current row or an index
    /// past the last column, `ParameterError` for an incompatible value.
    pub fn scan<T: FromRowValue>(&self, idx: usize) -> Result<T, SqlCapError> {
        if self.closed {
            return Err(SqlCapError::RowsClosed);
        }
        let row = self.current.as_ref().ok_or_else(|| {
            SqlCapError::ExecutionError("scan called without a current row".into())
        })?;
        let value = row.get(idx).ok_or_else(|| {
            SqlCapError::ExecutionError(format!(
                "column index {idx} out of range ({} columns)",
                row.len()
            ))
        })?;
        T::from_row_value(value)
    }

    /// Like [`Rows::scan`], addressing the column by name.
    ///
    /// # Errors
    /// As [`Rows::scan`], plus `ExecutionError` for an unknown column.
    pub fn scan_named<T: FromRowValue>(&self, column_name: &str) -> Result<T, SqlCapError> {
        let idx = self.column_index.get(column_name).ok_or_else(|| {
            SqlCapError::ExecutionError(format!("no column named `{column_name}`"))
        })?;
        self.scan(*idx)
    }

    /// Rows not yet reached by [`Rows::next`].
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    /// Release the buffered rows. Safe to call more than once.
    pub fn close(&mut self) {
        self.closed = true;
        self.pending.clear();
        self.current = None;
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Error recorded while iterating, if any.
    #[must_use]
    pub fn err(&self) -> Option<&SqlCapError> {
        self.err.as_ref()
    }
}
