use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};

use futures_util::FutureExt;
use tracing::{debug, warn};

use crate::capability::{TransactionStarter, Transactioner};
use crate::context::QueryContext;
use crate::error::SqlCapError;
use crate::types::TxOptions;

/// Run `body` inside a transaction and finalize it according to the outcome.
///
/// | `body` outcome | effect                          | returns            |
/// |----------------|---------------------------------|--------------------|
/// | `Ok(true)`     | commit                          | the commit result  |
/// | `Ok(false)`    | rollback                        | the rollback result|
/// | `Err(e)`       | rollback (failure only logged)  | `Err(e)`           |
/// | panic          | rollback (failure only logged)  | panic re-raised    |
///
/// Nothing is committed unless `body` asks for it. If `body` finalizes the transaction
/// itself, the rollback paths do nothing and the commit path fails with
/// `TransactionClosed`. Cancelling `ctx` aborts the backend call in flight; the rollback
/// still runs.
///
/// ```rust,no_run
/// use sqlcap::prelude::*;
///
/// # async fn demo(db: SqliteDb) -> Result<(), SqlCapError> {
/// let ctx = QueryContext::background();
/// let inner = ctx.clone();
/// run_in_transaction(&db, &ctx, TxOptions::default(), |tx| async move {
///     tx.exec(&inner, &QueryParams::new("DELETE FROM jobs WHERE done = 1")).await?;
///     Ok::<_, SqlCapError>(true)
/// })
/// .await
/// # }
/// ```
///
/// # Errors
/// The error from `begin`, from `body`, or from the final commit or rollback.
pub async fn run_in_transaction<S, F, Fut, E>(
    db: &S,
    ctx: &QueryContext,
    options: TxOptions,
    body: F,
) -> Result<(), E>
where
    S: TransactionStarter + ?Sized,
    F: FnOnce(S::Tx) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: From<SqlCapError>,
{
    let tx = db.begin(ctx, options).await?;
    debug!(?options, "transaction started");

    let fut = match catch_unwind(AssertUnwindSafe(|| body(tx.clone()))) {
        Ok(fut) => fut,
        Err(panic) => {
            rollback_logged(&tx, "panic").await;
            resume_unwind(panic);
        }
    };

    match AssertUnwindSafe(fut).catch_unwind().await {
        Err(panic) => {
            rollback_logged(&tx, "panic").await;
            resume_unwind(panic)
        }
        Ok(Err(err)) => {
            rollback_logged(&tx, "error").await;
            Err(err)
        }
        Ok(Ok(false)) => {
            if tx.is_active() {
                tx.rollback().await?;
                debug!("transaction rolled back");
            }
            Ok(())
        }
        Ok(Ok(true)) => {
            tx.commit().await?;
            debug!("transaction committed");
            Ok(())
        }
    }
}

async fn rollback_logged<T: Transactioner>(tx: &T, cause: &str) {
    if !tx.is_active() {
        return;
    }
    match tx.rollback().await {
        Ok(()) => debug!(cause, "transaction rolled back"),
        Err(err) => warn!(cause, error = %err, "rollback failed"),
    }
}
