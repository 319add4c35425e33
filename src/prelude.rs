//! Convenient imports for common functionality.
//!
//! Brings the capability traits, the query/parameter types and the backend handles into
//! scope with one `use sqlcap::prelude::*;`.

pub use crate::capability::{
    Execer, Inserter, Pinger, Preparer, QueryExecer, Queryer, Sqler, Statement,
    TransactionStarter, Transactioner,
};
pub use crate::context::QueryContext;
pub use crate::error::SqlCapError;
pub use crate::helpers::{count, query_each};
pub use crate::interpolation::{
    InterpolationStrategy, MSSQL_AT, POSTGRES_DOLLAR, PlaceholderStyle, QUESTION_MARK,
    SQLITE_NUMBERED,
};
pub use crate::param::{Bindings, QueryParams};
pub use crate::results::{ExecResult, FromRowValue, InsertResult, Rows};
pub use crate::txn::run_in_transaction;
pub use crate::types::{IsolationLevel, RowValues, TxOptions};

#[cfg(feature = "postgres")]
pub use crate::postgres::{PgDb, PgStatement, PgTx, PgTxStatement, PostgresOptions};

#[cfg(feature = "sqlite")]
pub use crate::sqlite::{
    SqliteDb, SqliteOptions, SqliteOptionsBuilder, SqliteStatement, SqliteTx, SqliteTxStatement,
};
