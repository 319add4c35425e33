use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;
use tokio::runtime::Handle;
use tokio::sync::{Mutex, MutexGuard};
use tokio_postgres::Client;
use tracing::{debug, warn};

use crate::capability::{Execer, Inserter, Preparer, Queryer, Statement, Transactioner};
use crate::context::QueryContext;
use crate::error::SqlCapError;
use crate::interpolation::InterpolationStrategy;
use crate::param::QueryParams;
use crate::results::{ExecResult, InsertResult, Rows};
use crate::types::TxOptions;

use super::connection::{PgPooledConnection, execute, run_cancellable, select};
use super::prepared::PgTxStatement;

const ACTIVE: u8 = 0;
const COMMITTED: u8 = 1;
const ROLLED_BACK: u8 = 2;

/// `BEGIN` with the requested isolation level and access mode.
pub(crate) fn begin_sql(options: TxOptions) -> String {
    let mut sql = String::from("BEGIN");
    if let Some(level) = options.isolation.as_sql() {
        sql.push_str(" ISOLATION LEVEL ");
        sql.push_str(level);
    }
    sql.push_str(if options.read_only {
        " READ ONLY"
    } else {
        " READ WRITE"
    });
    sql
}

struct TxInner {
    // handed back to the pool as soon as the transaction is finalized
    conn: Mutex<Option<PgPooledConnection>>,
    state: AtomicU8,
}

/// Transaction handle that reserves one pooled Postgres client until it is finalized.
///
/// Clones share the same transaction; see [`Transactioner`] for the finalization rules.
/// `commit` and `rollback` return the client to the pool right away, so clones and
/// statements that outlive the transaction hold no connection. Dropping the last clone of an
/// active transaction rolls it back on the current tokio runtime before the client returns
/// to the pool.
#[derive(Clone)]
pub struct PgTx {
    inner: Arc<TxInner>,
    strategy: &'static dyn InterpolationStrategy,
}

impl PgTx {
    pub(crate) async fn start(
        ctx: &QueryContext,
        conn: PgPooledConnection,
        options: TxOptions,
        strategy: &'static dyn InterpolationStrategy,
    ) -> Result<Self, SqlCapError> {
        let sql = begin_sql(options);
        let started = run_cancellable(ctx, &conn, async {
            conn.batch_execute(&sql).await?;
            Ok(())
        })
        .await;

        if let Err(err) = started {
            // a cancelled BEGIN may still have reached the server
            if let Err(rollback_err) = conn.batch_execute("ROLLBACK").await {
                warn!(error = %rollback_err, "postgres rollback after failed begin failed");
            }
            return Err(err);
        }

        debug!(sql = %sql, "postgres transaction started");
        Ok(Self {
            inner: Arc::new(TxInner {
                conn: Mutex::new(Some(conn)),
                state: AtomicU8::new(ACTIVE),
            }),
            strategy,
        })
    }

    /// Lock the reserved client for one call, as long as the transaction is active.
    pub(crate) async fn reserved(&self) -> Result<Reserved<'_>, SqlCapError> {
        if !self.is_active() {
            return Err(SqlCapError::TransactionClosed);
        }
        let guard = self.inner.conn.lock().await;
        if guard.is_none() {
            return Err(SqlCapError::TransactionClosed);
        }
        Ok(guard)
    }

    async fn finish(&self, target: u8) -> Result<(), SqlCapError> {
        self.inner
            .state
            .compare_exchange(ACTIVE, target, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SqlCapError::TransactionClosed)?;
        // dropping `client` at the end of this call returns it to the pool
        let client = self
            .inner
            .conn
            .lock()
            .await
            .take()
            .ok_or(SqlCapError::TransactionClosed)?;

        if target == COMMITTED {
            if let Err(err) = client.batch_execute("COMMIT").await {
                if let Err(rollback_err) = client.batch_execute("ROLLBACK").await {
                    warn!(error = %rollback_err, "postgres rollback after failed commit failed");
                }
                return Err(err.into());
            }
            debug!("postgres transaction committed");
        } else {
            client.batch_execute("ROLLBACK").await?;
            debug!("postgres transaction rolled back");
        }
        Ok(())
    }
}

pub(crate) type Reserved<'a> = MutexGuard<'a, Option<PgPooledConnection>>;

pub(crate) fn reserved_client<'a>(
    reserved: &'a Reserved<'_>,
) -> Result<&'a Client, SqlCapError> {
    reserved.as_deref().ok_or(SqlCapError::TransactionClosed)
}

impl Drop for TxInner {
    fn drop(&mut self) {
        if self.state.load(Ordering::Acquire) != ACTIVE {
            return;
        }
        let Some(conn) = self.conn.get_mut().take() else {
            return;
        };
        warn!("postgres transaction dropped while active; rolling back");
        if let Ok(handle) = Handle::try_current() {
            handle.spawn(rollback_on_drop(conn));
            return;
        }
        // the client only talks to its connection task over a channel, so a throwaway
        // runtime is enough to send the ROLLBACK
        match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt.block_on(rollback_on_drop(conn)),
            Err(err) => warn!(error = %err, "postgres rollback on drop skipped"),
        }
    }
}

async fn rollback_on_drop(conn: PgPooledConnection) {
    if let Err(err) = conn.batch_execute("ROLLBACK").await {
        warn!(error = %err, "postgres rollback on drop failed");
    }
}

impl fmt::Debug for PgTx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgTx")
            .field("active", &self.is_active())
            .finish()
    }
}

#[async_trait]
impl Queryer for PgTx {
    async fn query(&self, ctx: &QueryContext, query: &QueryParams) -> Result<Rows, SqlCapError> {
        let (sql, args) = query.interpolate(self.strategy)?;
        let reserved = self.reserved().await?;
        let client = reserved_client(&reserved)?;
        run_cancellable(ctx, client, select(client, &sql, &args)).await
    }
}

#[async_trait]
impl Inserter for PgTx {
    async fn insert(
        &self,
        ctx: &QueryContext,
        query: &QueryParams,
    ) -> Result<InsertResult, SqlCapError> {
        let (sql, args) = query.interpolate(self.strategy)?;
        let reserved = self.reserved().await?;
        let client = reserved_client(&reserved)?;
        let affected = run_cancellable(ctx, client, execute(client, &sql, &args)).await?;
        Ok(InsertResult::new(affected, None))
    }
}

#[async_trait]
impl Execer for PgTx {
    async fn exec(
        &self,
        ctx: &QueryContext,
        query: &QueryParams,
    ) -> Result<ExecResult, SqlCapError> {
        let (sql, args) = query.interpolate(self.strategy)?;
        let reserved = self.reserved().await?;
        let client = reserved_client(&reserved)?;
        let affected = run_cancellable(ctx, client, execute(client, &sql, &args)).await?;
        Ok(ExecResult::new(affected))
    }
}

#[async_trait]
impl Preparer for PgTx {
    async fn prepare(
        &self,
        ctx: &QueryContext,
        query: &QueryParams,
    ) -> Result<Box<dyn Statement>, SqlCapError> {
        let rendered = query.render(self.strategy)?;
        let reserved = self.reserved().await?;
        let client = reserved_client(&reserved)?;
        let stmt = run_cancellable(ctx, client, async {
            Ok(client.prepare(&rendered.sql).await?)
        })
        .await?;
        Ok(Box::new(PgTxStatement::new(self.clone(), rendered, stmt)))
    }
}

#[async_trait]
impl Transactioner for PgTx {
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
