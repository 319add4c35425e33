use thiserror::Error;

/// Every error surfaced by the capability handles.
///
/// Backend variants are transparent: the driver's own error is passed through untouched so
/// callers keep backend-specific diagnostics (SQLSTATE codes, extended result codes, ...).
#[derive(Debug, Error)]
pub enum SqlCapError {
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PostgresError(#[from] tokio_postgres::Error),

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    PoolErrorSqlite(#[from] bb8::RunError<rusqlite::Error>),

    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PoolErrorPostgres(#[from] bb8::RunError<tokio_postgres::Error>),

    /// A named placeholder in the template has no bound value.
    #[error("Missing binding for placeholder `:{0}`")]
    MissingBinding(String),

    #[error("Binding error: {0}")]
    BindingError(String),

    /// The transaction was already committed or rolled back.
    #[error("Transaction closed")]
    TransactionClosed,

    #[error("Statement closed")]
    StatementClosed,

    #[error("Rows closed")]
    RowsClosed,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Deadline exceeded")]
    DeadlineExceeded,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Unimplemented feature: {0}")]
    Unimplemented(String),
}

impl SqlCapError {
    /// True for errors raised while rendering a query, before any backend call.
    #[must_use]
    pub fn is_binding_error(&self) -> bool {
        matches!(self, Self::MissingBinding(_) | Self::BindingError(_))
    }

    /// True when a finalized transaction, closed statement or closed cursor was used.
    #[must_use]
    pub fn is_state_error(&self) -> bool {
        matches!(
            self,
            Self::TransactionClosed | Self::StatementClosed | Self::RowsClosed
        )
    }

    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}
