use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use tokio_postgres::{Client, NoTls};
use tracing::{debug, warn};

use crate::capability::{Execer, Inserter, Pinger, Preparer, Queryer, Statement, TransactionStarter};
use crate::context::QueryContext;
use crate::error::SqlCapError;
use crate::interpolation::{InterpolationStrategy, POSTGRES_DOLLAR};
use crate::param::QueryParams;
use crate::results::{ExecResult, InsertResult, Rows};
use crate::types::{RowValues, TxOptions};

use super::config::{PgManager, PostgresOptions};
use super::params::Params;
use super::prepared::PgStatement;
use super::query::build_rows;
use super::transaction::PgTx;

pub(crate) type PgPooledConnection = PooledConnection<'static, PgManager>;

/// Connection-level handle over a bb8 pool of Postgres clients.
///
/// Cheap to clone and safe to share between tasks. Queries are rendered with
/// [`POSTGRES_DOLLAR`] (`$1`, `$2`, ...) unless another strategy is set.
#[derive(Clone)]
pub struct PgDb {
    pool: Pool<PgManager>,
    strategy: &'static dyn InterpolationStrategy,
}

impl PgDb {
    /// Build the pool and check that one client can connect.
    ///
    /// # Errors
    /// Returns `SqlCapError::ConfigError` for invalid options, `ConnectionError` if the pool
    /// cannot be built, or the driver error from the first connection.
    pub async fn connect(options: PostgresOptions) -> Result<Self, SqlCapError> {
        options.validate()?;
        let pool = Pool::builder()
            .max_size(options.max_connections)
            .build(PgManager::new(options.config))
            .await
            .map_err(|e| SqlCapError::ConnectionError(format!("postgres pool error: {e}")))?;

        let db = Self {
            pool,
            strategy: &POSTGRES_DOLLAR,
        };
        db.ping(&QueryContext::background()).await?;
        debug!(max_connections = options.max_connections, "postgres pool ready");
        Ok(db)
    }

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
    pub fn pool(&self) -> &Pool<PgManager> {
        &self.pool
    }

    /// Run a batch of statements (DDL, fixtures) outside the capability surface. The text is
    /// sent as written.
    ///
    /// # Errors
    /// Pool or backend errors, or the context error.
    pub async fn execute_batch(&self, ctx: &QueryContext, sql: &str) -> Result<(), SqlCapError> {
        let conn = acquire(&self.pool, ctx).await?;
        run_cancellable(ctx, &conn, async {
            conn.batch_execute(sql).await?;
            Ok(())
        })
        .await
    }
}

impl fmt::Debug for PgDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgDb")
            .field("state", &self.pool.state())
            .field("strategy", &self.strategy)
            .finish()
    }
}

pub(crate) async fn acquire(
    pool: &Pool<PgManager>,
    ctx: &QueryContext,
) -> Result<PgPooledConnection, SqlCapError> {
    ctx.run(async { pool.get_owned().await.map_err(SqlCapError::from) })
        .await
}

/// Drive `fut` against `client`, bounded by `ctx`.
///
/// If `ctx` finishes first a cancel request is sent for whatever the client is running and
/// the context error is returned.
pub(crate) async fn run_cancellable<T, F>(
    ctx: &QueryContext,
    client: &Client,
    fut: F,
) -> Result<T, SqlCapError>
where
    F: Future<Output = Result<T, SqlCapError>>,
{
    ctx.check()?;
    let cancel = client.cancel_token();
    tokio::select! {
        biased;
        res = fut => res,
        err = ctx.done() => {
            if let Err(cancel_err) = cancel.cancel_query(NoTls).await {
                warn!(error = %cancel_err, "postgres cancel request failed");
            }
            Err(err)
        }
    }
}

pub(crate) async fn select(
    client: &Client,
    sql: &str,
    args: &[RowValues],
) -> Result<Rows, SqlCapError> {
    let stmt = client.prepare(sql).await?;
    let params = Params::convert(args);
    let rows = client.query(&stmt, params.as_refs()).await?;
    build_rows(&stmt, &rows)
}

pub(crate) async fn execute(
    client: &Client,
    sql: &str,
    args: &[RowValues],
) -> Result<u64, SqlCapError> {
    let params = Params::convert(args);
    Ok(client.execute(sql, params.as_refs()).await?)
}

#[async_trait]
impl Queryer for PgDb {
    async fn query(&self, ctx: &QueryContext, query: &QueryParams) -> Result<Rows, SqlCapError> {
        let (sql, args) = query.interpolate(self.strategy)?;
        let conn = acquire(&self.pool, ctx).await?;
        run_cancellable(ctx, &conn, select(&conn, &sql, &args)).await
    }
}

#[async_trait]
impl Inserter for PgDb {
    async fn insert(
        &self,
        ctx: &QueryContext,
        query: &QueryParams,
    ) -> Result<InsertResult, SqlCapError> {
        let (sql, args) = query.interpolate(self.strategy)?;
        let conn = acquire(&self.pool, ctx).await?;
        let affected = run_cancellable(ctx, &conn, execute(&conn, &sql, &args)).await?;
        Ok(InsertResult::new(affected, None))
    }
}

#[async_trait]
impl Execer for PgDb {
    async fn exec(
        &self,
        ctx: &QueryContext,
        query: &QueryParams,
    ) -> Result<ExecResult, SqlCapError> {
        let (sql, args) = query.interpolate(self.strategy)?;
        let conn = acquire(&self.pool, ctx).await?;
        let affected = run_cancellable(ctx, &conn, execute(&conn, &sql, &args)).await?;
        Ok(ExecResult::new(affected))
    }
}

#[async_trait]
impl Preparer for PgDb {
    async fn prepare(
        &self,
        ctx: &QueryContext,
        query: &QueryParams,
    ) -> Result<Box<dyn Statement>, SqlCapError> {
        let rendered = query.render(self.strategy)?;
        let conn = acquire(&self.pool, ctx).await?;
        run_cancellable(ctx, &conn, async {
            conn.prepare(&rendered.sql).await?;
            Ok(())
        })
        .await?;
        debug!(sql = %rendered.sql, "postgres statement prepared");
        Ok(Box::new(PgStatement::new(self.pool.clone(), rendered)))
    }
}

#[async_trait]
impl Pinger for PgDb {
    async fn ping(&self, ctx: &QueryContext) -> Result<(), SqlCapError> {
        let conn = acquire(&self.pool, ctx).await?;
        run_cancellable(ctx, &conn, async {
            conn.simple_query("SELECT 1").await?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl TransactionStarter for PgDb {
    type Tx = PgTx;

    async fn begin(&self, ctx: &QueryContext, options: TxOptions) -> Result<PgTx, SqlCapError> {
        let conn = acquire(&self.pool, ctx).await?;
        PgTx::start(ctx, conn, options, self.strategy).await
    }
}
