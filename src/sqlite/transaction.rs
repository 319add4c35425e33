use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::capability::{Execer, Inserter, Preparer, Queryer, Statement, Transactioner};
use crate::context::QueryContext;
use crate::error::SqlCapError;
use crate::interpolation::InterpolationStrategy;
use crate::param::QueryParams;
use crate::results::{ExecResult, InsertResult, Rows};

use super::config::SqliteConn;
use super::connection::{SqlitePooledConnection, run_blocking};
use super::params::Params;
use super::prepared::SqliteTxStatement;
use super::query;

const ACTIVE: u8 = 0;
const COMMITTED: u8 = 1;
const ROLLED_BACK: u8 = 2;

struct TxInner {
    // handed back to the pool as soon as the transaction is finalized
    conn: Mutex<Option<SqlitePooledConnection>>,
    state: AtomicU8,
    read_only: bool,
}

/// Transaction handle that reserves one pooled `SQLite` connection until it is finalized.
///
/// Clones share the same transaction. `commit` and `rollback` return the connection to the
/// pool, after which every operation fails with `TransactionClosed`, even on clones and
/// statements that are still alive. If the last clone is dropped while the transaction is
/// still active it is rolled back before the connection returns to the pool.
#[derive(Clone)]
pub struct SqliteTx {
    inner: Arc<TxInner>,
    strategy: &'static dyn InterpolationStrategy,
}

impl SqliteTx {
    pub(crate) async fn start(
        ctx: &QueryContext,
        conn: SqlitePooledConnection,
        begin_sql: &'static str,
        read_only: bool,
        strategy: &'static dyn InterpolationStrategy,
    ) -> Result<Self, SqlCapError> {
        let started = run_blocking(ctx, &conn, move |c| {
            if read_only {
                c.execute_batch("PRAGMA query_only = ON")?;
            }
            c.execute_batch(begin_sql).map_err(SqlCapError::SqliteError)
        })
        .await;

        if let Err(err) = started {
            // the connection goes back to the pool; leave it the way it was found
            let _ = run_blocking(&QueryContext::background(), &conn, move |c| {
                reset_connection(c, read_only);
                Ok(())
            })
            .await;
            return Err(err);
        }

        debug!(begin_sql, read_only, "sqlite transaction started");
        Ok(Self {
            inner: Arc::new(TxInner {
                conn: Mutex::new(Some(conn)),
                state: AtomicU8::new(ACTIVE),
                read_only,
            }),
            strategy,
        })
    }

    /// The reserved connection, as long as the transaction is active.
    pub(crate) fn conn(&self) -> Result<SqliteConn, SqlCapError> {
        if self.inner.state.load(Ordering::Acquire) != ACTIVE {
            return Err(SqlCapError::TransactionClosed);
        }
        self.inner
            .conn
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_deref()
            .cloned()
            .ok_or(SqlCapError::TransactionClosed)
    }

    async fn finish(&self, target: u8) -> Result<(), SqlCapError> {
        self.inner
            .state
            .compare_exchange(ACTIVE, target, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SqlCapError::TransactionClosed)?;
        // dropping `conn` at the end of this call returns it to the pool
        let conn = self
            .inner
            .conn
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(SqlCapError::TransactionClosed)?;

        let read_only = self.inner.read_only;
        let committing = target == COMMITTED;
        run_blocking(&QueryContext::background(), &conn, move |c| {
            let outcome = if c.is_autocommit() {
                // an interrupted statement can already have rolled the transaction back
                if committing {
                    Err(SqlCapError::ExecutionError(
                        "sqlite transaction is no longer open".into(),
                    ))
                } else {
                    Ok(())
                }
            } else if committing {
                c.execute_batch("COMMIT").map_err(SqlCapError::SqliteError)
            } else {
                c.execute_batch("ROLLBACK").map_err(SqlCapError::SqliteError)
            };
            reset_connection(c, read_only);
            outcome
        })
        .await?;

        debug!(
            outcome = if committing { "commit" } else { "rollback" },
            "sqlite transaction finished"
        );
        Ok(())
    }
}

/// Undo anything a transaction left on a connection: an open transaction (after a failed
/// `COMMIT`) and the read-only pragma.
fn reset_connection(conn: &rusqlite::Connection, read_only: bool) {
    if !conn.is_autocommit()
        && let Err(err) = conn.execute_batch("ROLLBACK")
    {
        warn!(error = %err, "sqlite rollback during cleanup failed");
    }
    if read_only && let Err(err) = conn.execute_batch("PRAGMA query_only = OFF") {
        warn!(error = %err, "sqlite could not clear query_only");
    }
}

impl Drop for TxInner {
    fn drop(&mut self) {
        if self.state.load(Ordering::Acquire) != ACTIVE {
            return;
        }
        let slot = self.conn.get_mut().unwrap_or_else(PoisonError::into_inner);
        let Some(conn) = slot.take() else {
            return;
        };
        warn!("sqlite transaction dropped while active; rolling back");
        let read_only = self.read_only;
        let cleanup = move || {
            let handle = Arc::clone(&conn.inner);
            let guard = handle.blocking_lock();
            reset_connection(&guard, read_only);
            drop(guard);
            drop(conn);
        };
        if let Ok(handle) = Handle::try_current() {
            handle.spawn_blocking(cleanup);
        } else {
            cleanup();
        }
    }
}

impl fmt::Debug for SqliteTx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteTx")
            .field("active", &self.is_active())
            .field("read_only", &self.inner.read_only)
            .finish()
    }
}

#[async_trait]
impl Queryer for SqliteTx {
    async fn query(&self, ctx: &QueryContext, query: &QueryParams) -> Result<Rows, SqlCapError> {
        let (sql, args) = query.interpolate(self.strategy)?;
        let params = Params::convert(&args);
        run_blocking(ctx, &self.conn()?, move |c| {
            query::select(c, &sql, params.as_values())
        })
        .await
    }
}

#[async_trait]
impl Inserter for SqliteTx {
    async fn insert(
        &self,
        ctx: &QueryContext,
        query: &QueryParams,
    ) -> Result<InsertResult, SqlCapError> {
        let (sql, args) = query.interpolate(self.strategy)?;
        let params = Params::convert(&args);
        run_blocking(ctx, &self.conn()?, move |c| {
            query::insert(c, &sql, params.as_values())
        })
        .await
    }
}

#[async_trait]
impl Execer for SqliteTx {
    async fn exec(
        &self,
        ctx: &QueryContext,
        query: &QueryParams,
    ) -> Result<ExecResult, SqlCapError> {
        let (sql, args) = query.interpolate(self.strategy)?;
        let params = Params::convert(&args);
        run_blocking(ctx, &self.conn()?, move |c| {
            query::execute(c, &sql, params.as_values())
        })
        .await
    }
}

#[async_trait]
impl Preparer for SqliteTx {
    async fn prepare(
        &self,
        ctx: &QueryContext,
        query: &QueryParams,
    ) -> Result<Box<dyn Statement>, SqlCapError> {
        let rendered = query.render(self.strategy)?;
        let sql = rendered.sql.clone();
        run_blocking(ctx, &self.conn()?, move |c| query::warm(c, &sql)).await?;
        Ok(Box::new(SqliteTxStatement::new(self.clone(), rendered)))
    }
}

#[async_trait]
impl Transactioner for SqliteTx {
    async fn commit(&self) -> Result<(), SqlCapError> {
        self.finish(COMMITTED).await
    }

    async fn rollback(&self) -> Result<(), SqlCapError> {
        self.finish(ROLLED_BACK).await
    }

    fn is_active(&self) -> bool {
        self.inner.state.load(Ordering::Acquire) == ACTIVE
    }
}
