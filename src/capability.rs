//! One-method contracts for each class of operation.
//!
//! Business code depends on the narrowest trait it needs, so the same function runs against a
//! pooled connection handle or inside a transaction without change:
//!
//! ```rust,no_run
//! use sqlcap::prelude::*;
//!
//! async fn rename(ctx: &QueryContext, db: &dyn Execer, id: i64, name: &str)
//!     -> Result<u64, SqlCapError>
//! {
//!     let q = QueryParams::new("UPDATE users SET name = :name WHERE id = :id")
//!         .bind("name", name)
//!         .bind("id", id);
//!     Ok(db.exec(ctx, &q).await?.rows_affected())
//! }
//! ```

use async_trait::async_trait;

use crate::context::QueryContext;
use crate::error::SqlCapError;
use crate::param::{Bindings, QueryParams};
use crate::results::{ExecResult, InsertResult, Rows};
use crate::types::TxOptions;

#[async_trait]
pub trait Queryer: Send + Sync {
    /// Run a statement that returns rows.
    ///
    /// # Errors
    /// Binding errors before any backend call, backend errors unchanged, or the context error.
    async fn query(&self, ctx: &QueryContext, query: &QueryParams) -> Result<Rows, SqlCapError>;
}

#[async_trait]
pub trait Inserter: Send + Sync {
    /// Run an INSERT and report the generated key where the backend can.
    ///
    /// # Errors
    /// As [`Queryer::query`].
    async fn insert(
        &self,
        ctx: &QueryContext,
        query: &QueryParams,
    ) -> Result<InsertResult, SqlCapError>;
}

#[async_trait]
pub trait Execer: Send + Sync {
    /// Run a statement for its side effects.
    ///
    /// # Errors
    /// As [`Queryer::query`].
    async fn exec(&self, ctx: &QueryContext, query: &QueryParams)
    -> Result<ExecResult, SqlCapError>;
}

#[async_trait]
pub trait Preparer: Send + Sync {
    /// Prepare the rendered template. Values bound on `query` are ignored; they are supplied
    /// per call to the returned [`Statement`].
    ///
    /// # Errors
    /// Backend errors for invalid SQL, `BindingError` for mixed markers.
    async fn prepare(
        &self,
        ctx: &QueryContext,
        query: &QueryParams,
    ) -> Result<Box<dyn Statement>, SqlCapError>;
}

#[async_trait]
pub trait Pinger: Send + Sync {
    /// Check that a connection can be acquired and answers.
    ///
    /// # Errors
    /// Pool or backend errors, or the context error.
    async fn ping(&self, ctx: &QueryContext) -> Result<(), SqlCapError>;
}

/// A prepared plan. Values come from the [`Bindings`] passed to each call, laid out the way
/// the template's markers were.
#[async_trait]
pub trait Statement: Send + Sync {
    async fn query(&self, ctx: &QueryContext, bindings: &Bindings) -> Result<Rows, SqlCapError>;

    async fn insert(
        &self,
        ctx: &QueryContext,
        bindings: &Bindings,
    ) -> Result<InsertResult, SqlCapError>;

    async fn exec(&self, ctx: &QueryContext, bindings: &Bindings)
    -> Result<ExecResult, SqlCapError>;

    /// Release the statement. A second call returns `StatementClosed`, which callers may
    /// ignore.
    ///
    /// # Errors
    /// `StatementClosed` when already closed.
    async fn close(&self) -> Result<(), SqlCapError>;

    /// The rendered backend text.
    fn sql(&self) -> &str;
}

/// Everything needed to run statements, inside a transaction or not.
pub trait QueryExecer: Queryer + Inserter + Execer + Preparer {}

impl<T> QueryExecer for T where T: Queryer + Inserter + Execer + Preparer {}

/// A transaction handle.
///
/// Finalizing is one-shot: after `commit` or `rollback` returns (successfully or not) every
/// further call, including a second `commit`/`rollback`, fails with `TransactionClosed`.
/// A handle must not be driven from several tasks at once; that is up to the caller.
#[async_trait]
pub trait Transactioner: QueryExecer {
    /// # Errors
    /// `TransactionClosed` if already finalized, otherwise the backend's commit error.
    async fn commit(&self) -> Result<(), SqlCapError>;

    /// # Errors
    /// `TransactionClosed` if already finalized, otherwise the backend's rollback error.
    async fn rollback(&self) -> Result<(), SqlCapError>;

    fn is_active(&self) -> bool;
}

#[async_trait]
pub trait TransactionStarter: Send + Sync {
    type Tx: Transactioner + Clone + 'static;

    /// Reserve a connection and open a transaction on it.
    ///
    /// # Errors
    /// Pool or backend errors, `Unimplemented` for options the backend cannot honor, or the
    /// context error.
    async fn begin(&self, ctx: &QueryContext, options: TxOptions) -> Result<Self::Tx, SqlCapError>;
}

/// A connection-level handle.
pub trait Sqler: QueryExecer + Pinger + TransactionStarter {}

impl<T> Sqler for T where T: QueryExecer + Pinger + TransactionStarter {}
