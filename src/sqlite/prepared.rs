use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bb8::Pool;

use crate::capability::Statement;
use crate::context::QueryContext;
use crate::error::SqlCapError;
use crate::param::{ArgumentPlan, Bindings, RenderedSql};
use crate::results::{ExecResult, InsertResult, Rows};

use super::config::SqliteManager;
use super::connection::{acquire, run_blocking};
use super::params::Params;
use super::query;
use super::transaction::SqliteTx;

struct Plan {
    sql: Arc<str>,
    slots: ArgumentPlan,
    closed: AtomicBool,
}

impl Plan {
    fn new(rendered: RenderedSql) -> Self {
        Self {
            sql: Arc::from(rendered.sql),
            slots: rendered.slots,
            closed: AtomicBool::new(false),
        }
    }

    fn params(&self, bindings: &Bindings) -> Result<(Arc<str>, Params), SqlCapError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SqlCapError::StatementClosed);
        }
        let args = bindings.resolve(&self.slots)?;
        Ok((Arc::clone(&self.sql), Params::convert(&args)))
    }

    fn close(&self) -> Result<(), SqlCapError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            Err(SqlCapError::StatementClosed)
        } else {
            Ok(())
        }
    }
}

/// Statement prepared through [`super::SqliteDb`].
///
/// Each call checks out whichever pooled connection is free; the text is compiled once per
/// connection and then served from that connection's statement cache.
pub struct SqliteStatement {
    pool: Pool<SqliteManager>,
    plan: Plan,
}

impl SqliteStatement {
    pub(crate) fn new(pool: Pool<SqliteManager>, rendered: RenderedSql) -> Self {
        Self {
            pool,
            plan: Plan::new(rendered),
        }
    }
}

#[async_trait]
impl Statement for SqliteStatement {
    async fn query(&self, ctx: &QueryContext, bindings: &Bindings) -> Result<Rows, SqlCapError> {
        let (sql, params) = self.plan.params(bindings)?;
        let conn = acquire(&self.pool, ctx).await?;
        run_blocking(ctx, &conn, move |c| query::select(c, &sql, params.as_values())).await
    }

    async fn insert(
        &self,
        ctx: &QueryContext,
        bindings: &Bindings,
    ) -> Result<InsertResult, SqlCapError> {
        let (sql, params) = self.plan.params(bindings)?;
        let conn = acquire(&self.pool, ctx).await?;
        run_blocking(ctx, &conn, move |c| query::insert(c, &sql, params.as_values())).await
    }

    async fn exec(
        &self,
        ctx: &QueryContext,
        bindings: &Bindings,
    ) -> Result<ExecResult, SqlCapError> {
        let (sql, params) = self.plan.params(bindings)?;
        let conn = acquire(&self.pool, ctx).await?;
        run_blocking(ctx, &conn, move |c| query::execute(c, &sql, params.as_values())).await
    }

    async fn close(&self) -> Result<(), SqlCapError> {
        self.plan.close()
    }

    fn sql(&self) -> &str {
        &self.plan.sql
    }
}

/// Statement prepared inside a [`SqliteTx`]; every call runs on the transaction's reserved
/// connection.
pub struct SqliteTxStatement {
    tx: SqliteTx,
    plan: Plan,
}

impl SqliteTxStatement {
    pub(crate) fn new(tx: SqliteTx, rendered: RenderedSql) -> Self {
        Self {
            tx,
            plan: Plan::new(rendered),
        }
    }
}

#[async_trait]
impl Statement for SqliteTxStatement {
    async fn query(&self, ctx: &QueryContext, bindings: &Bindings) -> Result<Rows, SqlCapError> {
        let (sql, params) = self.plan.params(bindings)?;
        run_blocking(ctx, &self.tx.conn()?, move |c| {
            query::select(c, &sql, params.as_values())
        })
        .await
    }

    async fn insert(
        &self,
        ctx: &QueryContext,
        bindings: &Bindings,
    ) -> Result<InsertResult, SqlCapError> {
        let (sql, params) = self.plan.params(bindings)?;
        run_blocking(ctx, &self.tx.conn()?, move |c| {
            query::insert(c, &sql, params.as_values())
        })
        .await
    }

    async fn exec(
        &self,
        ctx: &QueryContext,
        bindings: &Bindings,
    ) -> Result<ExecResult, SqlCapError> {
        let (sql, params) = self.plan.params(bindings)?;
        run_blocking(ctx, &self.tx.conn()?, move |c| {
            query::execute(c, &sql, params.as_values())
        })
        .await
    }

    async fn close(&self) -> Result<(), SqlCapError> {
        self.plan.close()
    }

    fn sql(&self) -> &str {
        &self.plan.sql
    }
}
