//! Small conveniences built only on [`Queryer`].

use crate::capability::Queryer;
use crate::context::QueryContext;
use crate::error::SqlCapError;
use crate::param::QueryParams;
use crate::results::Rows;

/// First column of the first row as an integer; `0` when the query returns no rows.
///
/// Meant for `SELECT COUNT(*) ...`, but any query yielding an integer works.
///
/// # Errors
/// Errors from the query, or `ParameterError` when the value is not an integer.
pub async fn count<Q>(
    ctx: &QueryContext,
    queryer: &Q,
    query: &QueryParams,
) -> Result<i64, SqlCapError>
where
    Q: Queryer + ?Sized,
{
    let mut rows = queryer.query(ctx, query).await?;
    let total = if rows.next() {
        rows.scan::<Option<i64>>(0)?.unwrap_or(0)
    } else {
        0
    };
    rows.close();
    Ok(total)
}

/// Call `each` for every row until it returns `true` (stop) or an error.
///
/// The cursor is closed on every exit path.
///
/// # Errors
/// Errors from the query or the first error returned by `each`.
pub async fn query_each<Q, F>(
    ctx: &QueryContext,
    queryer: &Q,
    query: &QueryParams,
    mut each: F,
) -> Result<(), SqlCapError>
where
    Q: Queryer + ?Sized,
    F: FnMut(&Rows) -> Result<bool, SqlCapError>,
{
    let mut rows = queryer.query(ctx, query).await?;
    let mut outcome = Ok(());
    while rows.next() {
        match each(&rows) {
            Ok(false) => {}
            Ok(true) => break,
            Err(err) => {
                outcome = Err(err);
                break;
            }
        }
    }
    rows.close();
    outcome
}
