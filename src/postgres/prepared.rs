use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use bb8::Pool;
use tokio_postgres::Client;

use crate::capability::Statement;
use crate::context::QueryContext;
use crate::error::SqlCapError;
use crate::param::{ArgumentPlan, Bindings, RenderedSql};
use crate::results::{ExecResult, InsertResult, Rows};
use crate::types::RowValues;

use super::config::PgManager;
use super::connection::{acquire, run_cancellable};
use super::params::Params;
use super::query::build_rows;
use super::transaction::{PgTx, reserved_client};

struct Plan {
    sql: String,
    slots: ArgumentPlan,
    closed: AtomicBool,
}

impl Plan {
    fn new(rendered: RenderedSql) -> Self {
        Self {
            sql: rendered.sql,
            slots: rendered.slots,
            closed: AtomicBool::new(false),
        }
    }

    fn args(&self, bindings: &Bindings) -> Result<Vec<RowValues>, SqlCapError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SqlCapError::StatementClosed);
        }
        bindings.resolve(&self.slots)
    }

    fn close(&self) -> Result<(), SqlCapError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            Err(SqlCapError::StatementClosed)
        } else {
            Ok(())
        }
    }
}

async fn query_prepared(
    client: &Client,
    stmt: &tokio_postgres::Statement,
    args: &[RowValues],
) -> Result<Rows, SqlCapError> {
    let params = Params::convert(args);
    let rows = client.query(stmt, params.as_refs()).await?;
    build_rows(stmt, &rows)
}

async fn execute_prepared(
    client: &Client,
    stmt: &tokio_postgres::Statement,
    args: &[RowValues],
) -> Result<u64, SqlCapError> {
    let params = Params::convert(args);
    Ok(client.execute(stmt, params.as_refs()).await?)
}

/// Statement prepared through [`super::PgDb`].
///
/// Server-side statements belong to a single client, so every call checks out a pooled
/// client and prepares the text there before running it.
pub struct PgStatement {
    pool: Pool<PgManager>,
    plan: Plan,
}

impl PgStatement {
    pub(crate) fn new(pool: Pool<PgManager>, rendered: RenderedSql) -> Self {
        Self {
            pool,
            plan: Plan::new(rendered),
        }
    }
}

#[async_trait]
impl Statement for PgStatement {
    async fn query(&self, ctx: &QueryContext, bindings: &Bindings) -> Result<Rows, SqlCapError> {
        let args = self.plan.args(bindings)?;
        let conn = acquire(&self.pool, ctx).await?;
        run_cancellable(ctx, &conn, async {
            let stmt = conn.prepare(&self.plan.sql).await?;
            query_prepared(&conn, &stmt, &args).await
        })
        .await
    }

    async fn insert(
        &self,
        ctx: &QueryContext,
        bindings: &Bindings,
    ) -> Result<InsertResult, SqlCapError> {
        let args = self.plan.args(bindings)?;
        let conn = acquire(&self.pool, ctx).await?;
        let affected = run_cancellable(ctx, &conn, async {
            let stmt = conn.prepare(&self.plan.sql).await?;
            execute_prepared(&conn, &stmt, &args).await
        })
        .await?;
        Ok(InsertResult::new(affected, None))
    }

    async fn exec(
        &self,
        ctx: &QueryContext,
        bindings: &Bindings,
    ) -> Result<ExecResult, SqlCapError> {
        let args = self.plan.args(bindings)?;
        let conn = acquire(&self.pool, ctx).await?;
        let affected = run_cancellable(ctx, &conn, async {
            let stmt = conn.prepare(&self.plan.sql).await?;
            execute_prepared(&conn, &stmt, &args).await
        })
        .await?;
        Ok(ExecResult::new(affected))
    }

    async fn close(&self) -> Result<(), SqlCapError> {
        self.plan.close()
    }

    fn sql(&self) -> &str {
        &self.plan.sql
    }
}

/// Statement prepared inside a [`PgTx`]. The server-side statement lives on the
/// transaction's reserved client and is reused for every call until `close`.
pub struct PgTxStatement {
    tx: PgTx,
    // taken on close; the server-side statement is deallocated once the last copy drops
    stmt: Mutex<Option<tokio_postgres::Statement>>,
    plan: Plan,
}

impl PgTxStatement {
    pub(crate) fn new(tx: PgTx, rendered: RenderedSql, stmt: tokio_postgres::Statement) -> Self {
        Self {
            tx,
            stmt: Mutex::new(Some(stmt)),
            plan: Plan::new(rendered),
        }
    }

    fn prepared(&self) -> Result<tokio_postgres::Statement, SqlCapError> {
        self.stmt
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(SqlCapError::StatementClosed)
    }

    async fn run(&self, ctx: &QueryContext, bindings: &Bindings) -> Result<u64, SqlCapError> {
        let args = self.plan.args(bindings)?;
        let stmt = self.prepared()?;
        let reserved = self.tx.reserved().await?;
        let client = reserved_client(&reserved)?;
        run_cancellable(ctx, client, execute_prepared(client, &stmt, &args)).await
    }
}

#[async_trait]
impl Statement for PgTxStatement {
    async fn query(&self, ctx: &QueryContext, bindings: &Bindings) -> Result<Rows, SqlCapError> {
        let args = self.plan.args(bindings)?;
        let stmt = self.prepared()?;
        let reserved = self.tx.reserved().await?;
        let client = reserved_client(&reserved)?;
        run_cancellable(ctx, client, query_prepared(client, &stmt, &args)).await
    }

    async fn insert(
        &self,
        ctx: &QueryContext,
        bindings: &Bindings,
    ) -> Result<InsertResult, SqlCapError> {
        let affected = self.run(ctx, bindings).await?;
        Ok(InsertResult::new(affected, None))
    }

    async fn exec(
        &self,
        ctx: &QueryContext,
        bindings: &Bindings,
    ) -> Result<ExecResult, SqlCapError> {
        let affected = self.run(ctx, bindings).await?;
        Ok(ExecResult::new(affected))
    }

    async fn close(&self) -> Result<(), SqlCapError> {
        self.plan.close()?;
        self.stmt
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }

    fn sql(&self) -> &str {
        &self.plan.sql
    }
}
