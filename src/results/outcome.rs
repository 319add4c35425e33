use crate::error::SqlCapError;

/// Outcome of an `exec` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecResult {
    rows_affected: u64,
}

impl ExecResult {
    #[must_use]
    pub(crate) fn new(rows_affected: u64) -> Self {
        Self { rows_affected }
    }

    #[must_use]
    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }
}

/// Outcome of an `insert` call.
///
/// Whether the generated key is available depends on the backend; asking for it where it is
/// not is an error from [`InsertResult::last_insert_id`], never from the insert itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertResult {
    rows_affected: u64,
    last_insert_id: Option<i64>,
}

impl InsertResult {
    #[must_use]
    pub(crate) fn new(rows_affected: u64, last_insert_id: Option<i64>) -> Self {
        Self {
            rows_affected,
            last_insert_id,
        }
    }

    #[must_use]
    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    /// The key generated by the insert.
    ///
    /// # Errors
    /// Returns `SqlCapError::Unimplemented` on backends that do not report it; use a
    /// `RETURNING` clause with `query` there instead.
    pub fn last_insert_id(&self) -> Result<i64, SqlCapError> {
        self.last_insert_id.ok_or_else(|| {
            SqlCapError::Unimplemented(
                "last insert id is not reported by this backend; use RETURNING".into(),
            )
        })
    }
}
