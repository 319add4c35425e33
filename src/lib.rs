//! Capability-based async query and transaction handles.
//!
//! Business code depends on the narrow capability traits in [`capability`]
//! ([`Queryer`], [`Inserter`], [`Execer`], [`Preparer`]) instead of a concrete connection type,
//! so the same function runs against a pooled connection handle or inside a transaction.
//! Queries are written once with `:name` or `?` markers and rendered per backend by an
//! [`InterpolationStrategy`].
//!
//! ```rust,no_run
//! use sqlcap::prelude::*;
//!
//! async fn active_users<Q>(ctx: &QueryContext, db: &Q) -> Result<i64, SqlCapError>
//! where
//!     Q: Queryer + ?Sized,
//! {
//!     let q = QueryParams::new("SELECT COUNT(*) FROM users WHERE active = :on").bind("on", true);
//!     count(ctx, db, &q).await
//! }
//!
//! # async fn demo() -> Result<(), SqlCapError> {
//! let db = SqliteOptions::builder("app.db").max_connections(4).build().await?;
//! let ctx = QueryContext::background();
//!
//! // against the pool
//! let n = active_users(&ctx, &db).await?;
//!
//! // and inside a transaction that only commits when asked to
//! let inner = ctx.clone();
//! run_in_transaction(&db, &ctx, TxOptions::default(), |tx| async move {
//!     let before = active_users(&inner, &tx).await?;
//!     tx.exec(&inner, &QueryParams::new("UPDATE users SET active = 0")).await?;
//!     Ok::<_, SqlCapError>(before > 0)
//! })
//! .await?;
//! # let _ = n;
//! # Ok(())
//! # }
//! ```
//!
//! Backends are behind cargo features: `sqlite` (rusqlite on blocking workers) and
//! `postgres` (tokio-postgres). Both pool connections with bb8.

pub mod capability;
pub mod context;
pub mod error;
pub mod helpers;
pub mod interpolation;
pub mod param;
pub mod prelude;
pub mod results;
pub mod txn;
pub mod types;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use capability::{
    Execer, Inserter, Pinger, Preparer, QueryExecer, Queryer, Sqler, Statement,
    TransactionStarter, Transactioner,
};
pub use context::QueryContext;
pub use error::SqlCapError;
pub use helpers::{count, query_each};
pub use interpolation::{
    InterpolationStrategy, MSSQL_AT, POSTGRES_DOLLAR, PlaceholderStyle, QUESTION_MARK,
    SQLITE_NUMBERED, quote_backtick, quote_double,
};
pub use param::{ArgumentPlan, Bindings, QueryParams, RenderedSql, render};
pub use results::{ExecResult, FromRowValue, InsertResult, Rows};
pub use txn::run_in_transaction;
pub use types::{IsolationLevel, RowValues, TxOptions};
