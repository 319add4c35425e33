use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use tokio::task::spawn_blocking;
use tracing::debug;

use crate::capability::{Execer, Inserter, Pinger, Preparer, Queryer, Statement, TransactionStarter};
use crate::context::QueryContext;
use crate::error::SqlCapError;
use crate::interpolation::{InterpolationStrategy, SQLITE_NUMBERED};
use crate::param::QueryParams;
use crate::results::{ExecResult, InsertResult, Rows};
use crate::types::{IsolationLevel, TxOptions};

use super::config::{SqliteConn, SqliteManager, SqliteOptions};
use super::params::Params;
use super::prepared::SqliteStatement;
use super::query;
use super::transaction::SqliteTx;

pub(crate) type SqlitePooledConnection = PooledConnection<'static, SqliteManager>;

/// Connection-level handle over a bb8 pool of `SQLite` connections.
///
/// Cheap to clone and safe to share between tasks; every call checks a connection out of the
/// pool for its own duration. Queries are rendered with [`SQLITE_NUMBERED`] (`?1`, `?2`, ...)
/// unless another strategy is set with [`SqliteDb::with_strategy`].
#[derive(Clone)]
pub struct SqliteDb {
    pool: Pool<SqliteManager>,
    strategy: &'static dyn InterpolationStrategy,
}

impl SqliteDb {
    /// Build the pool and run a smoke test on one connection.
    ///
    /// # Errors
    /// Returns `SqlCapError::ConfigError` for invalid options, `ConnectionError` if the pool
    /// cannot be built, or the backend error from the smoke test.
    pub async fn connect(options: SqliteOptions) -> Result<Self, SqlCapError> {
        options.validate()?;
        let pool = Pool::builder()
            .max_size(options.max_connections)
            .build(SqliteManager::new(&options))
            .await
            .map_err(|e| SqlCapError::ConnectionError(format!("sqlite pool error: {e}")))?;

        let db = Self {
            pool,
            strategy: &SQLITE_NUMBERED,
        };
        db.ping(&QueryContext::background()).await?;
        debug!(
            db_path = %options.db_path,
            max_connections = options.max_connections,
            "sqlite pool ready"
        );
        Ok(db)
    }

    /// Use a different placeholder strategy for queries issued through this handle.
    #[must_use]
    pub fn with_strategy(mut self, strategy: &'static dyn InterpolationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    #[must_use]
    pub fn strategy(&self) -> &'static dyn InterpolationStrategy {
        self.strategy
    }

    #[must_use]
    pub fn pool(&self) -> &Pool<SqliteManager> {
        &self.pool
    }

    /// Run a batch of statements (DDL, fixtures) on one connection, outside the capability
    /// surface. The text is sent as written.
    ///
    /// # Errors
    /// Pool or backend errors, or the context error.
    pub async fn execute_batch(&self, ctx: &QueryContext, sql: &str) -> Result<(), SqlCapError> {
        let conn = self.acquire(ctx).await?;
        let sql = sql.to_owned();
        run_blocking(ctx, &conn, move |c| {
            c.execute_batch(&sql).map_err(SqlCapError::SqliteError)
        })
        .await
    }

    pub(crate) async fn acquire(
        &self,
        ctx: &QueryContext,
    ) -> Result<SqlitePooledConnection, SqlCapError> {
        acquire(&self.pool, ctx).await
    }
}

impl fmt::Debug for SqliteDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteDb")
            .field("state", &self.pool.state())
            .field("strategy", &self.strategy)
            .finish()
    }
}

pub(crate) async fn acquire(
    pool: &Pool<SqliteManager>,
    ctx: &QueryContext,
) -> Result<SqlitePooledConnection, SqlCapError> {
    ctx.run(async { pool.get_owned().await.map_err(SqlCapError::from) })
        .await
}

/// Run synchronous `rusqlite` work on a blocking thread, bounded by `ctx`.
///
/// When `ctx` finishes first the running statement is interrupted and the worker is awaited,
/// so the connection is idle again before it can return to the pool. The context error is
/// returned in place of whatever the interrupted statement reported.
pub(crate) async fn run_blocking<F, R>(
    ctx: &QueryContext,
    conn: &SqliteConn,
    func: F,
) -> Result<R, SqlCapError>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R, SqlCapError> + Send + 'static,
    R: Send + 'static,
{
    ctx.check()?;
    let handle = Arc::clone(&conn.inner);
    let abort = ctx.token().child_token();
    let worker_abort = abort.clone();
    let mut task = spawn_blocking(move || {
        let mut guard = handle.blocking_lock();
        if worker_abort.is_cancelled() {
            return Err(SqlCapError::Cancelled);
        }
        func(&mut guard)
    });

    tokio::select! {
        biased;
        joined = &mut task => joined.map_err(|e| {
            SqlCapError::ExecutionError(format!("sqlite spawn_blocking join error: {e}"))
        })?,
        err = ctx.done() => {
            abort.cancel();
            conn.interrupt.interrupt();
            let _ = task.await;
            Err(err)
        }
    }
}

#[async_trait]
impl Queryer for SqliteDb {
    async fn query(&self, ctx: &QueryContext, query: &QueryParams) -> Result<Rows, SqlCapError> {
        let (sql, args) = query.interpolate(self.strategy)?;
        let params = Params::convert(&args);
        let conn = self.acquire(ctx).await?;
        run_blocking(ctx, &conn, move |c| query::select(c, &sql, params.as_values())).await
    }
}

#[async_trait]
impl Inserter for SqliteDb {
    async fn insert(
        &self,
        ctx: &QueryContext,
        query: &QueryParams,
    ) -> Result<InsertResult, SqlCapError> {
        let (sql, args) = query.interpolate(self.strategy)?;
        let params = Params::convert(&args);
        let conn = self.acquire(ctx).await?;
        run_blocking(ctx, &conn, move |c| query::insert(c, &sql, params.as_values())).await
    }
}

#[async_trait]
impl Execer for SqliteDb {
    async fn exec(
        &self,
        ctx: &QueryContext,
        query: &QueryParams,
    ) -> Result<ExecResult, SqlCapError> {
        let (sql, args) = query.interpolate(self.strategy)?;
        let params = Params::convert(&args);
        let conn = self.acquire(ctx).await?;
        run_blocking(ctx, &conn, move |c| query::execute(c, &sql, params.as_values())).await
    }
}

#[async_trait]
impl Preparer for SqliteDb {
    async fn prepare(
        &self,
        ctx: &QueryContext,
        query: &QueryParams,
    ) -> Result<Box<dyn Statement>, SqlCapError> {
        let rendered = query.render(self.strategy)?;
        let conn = self.acquire(ctx).await?;
        let sql = rendered.sql.clone();
        run_blocking(ctx, &conn, move |c| query::warm(c, &sql)).await?;
        debug!(sql = %rendered.sql, "sqlite statement prepared");
        Ok(Box::new(SqliteStatement::new(self.pool.clone(), rendered)))
    }
}

#[async_trait]
impl Pinger for SqliteDb {
    async fn ping(&self, ctx: &QueryContext) -> Result<(), SqlCapError> {
        let conn = self.acquire(ctx).await?;
        run_blocking(ctx, &conn, |c| {
            c.query_row("SELECT 1", [], |_| Ok(()))
                .map_err(SqlCapError::SqliteError)
        })
        .await
    }
}

#[async_trait]
impl TransactionStarter for SqliteDb {
    type Tx = SqliteTx;

    async fn begin(&self, ctx: &QueryContext, options: TxOptions) -> Result<SqliteTx, SqlCapError> {
        let begin_sql = match options.isolation {
            IsolationLevel::Default => "BEGIN DEFERRED",
            IsolationLevel::Serializable => "BEGIN IMMEDIATE",
            other => {
                return Err(SqlCapError::Unimplemented(format!(
                    "SQLite does not support isolation level {other:?}"
                )));
            }
        };
        let conn = self.acquire(ctx).await?;
        SqliteTx::start(ctx, conn, begin_sql, options.read_only, self.strategy).await
    }
}
