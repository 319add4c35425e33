#![cfg(feature = "sqlite")]

use std::time::{Duration, Instant};

use sqlcap::prelude::*;
use tempfile::TempDir;

// Counts to a very large number; takes far longer than any timeout used below.
const SLOW_QUERY: &str = "WITH RECURSIVE c(x) AS \
                          (SELECT 1 UNION ALL SELECT x + 1 FROM c WHERE x < 500000000) \
                          SELECT COUNT(*) FROM c";

async fn open(dir: &TempDir) -> Result<SqliteDb, SqlCapError> {
    let path = dir.path().join("cancel.db");
    let db = SqliteOptions::builder(path.to_string_lossy().into_owned())
        .max_connections(1)
        .build()
        .await?;
    db.execute_batch(
        &QueryContext::background(),
        "CREATE TABLE events (id INTEGER PRIMARY KEY, kind TEXT NOT NULL);",
    )
    .await?;
    Ok(db)
}

#[tokio::test]
async fn cancelled_context_fails_before_touching_the_backend() -> Result<(), SqlCapError> {
    let dir = TempDir::new().map_err(|e| SqlCapError::ConfigError(e.to_string()))?;
    let db = open(&dir).await?;

    let ctx = QueryContext::background().with_cancel();
    ctx.cancel();

    // would be a sqlite error if it ran
    let err = db
        .query(&ctx, &QueryParams::new("SELECT * FROM missing"))
        .await
        .unwrap_err();
    assert!(matches!(err, SqlCapError::Cancelled));

    let err = db.begin(&ctx, TxOptions::default()).await.unwrap_err();
    assert!(matches!(err, SqlCapError::Cancelled));
    Ok(())
}

#[tokio::test]
async fn deadline_interrupts_a_long_query() -> Result<(), SqlCapError> {
    let dir = TempDir::new().map_err(|e| SqlCapError::ConfigError(e.to_string()))?;
    let db = open(&dir).await?;

    let ctx = QueryContext::background().with_timeout(Duration::from_millis(150));
    let started = Instant::now();
    let err = db
        .query(&ctx, &QueryParams::new(SLOW_QUERY))
        .await
        .unwrap_err();
    assert!(matches!(err, SqlCapError::DeadlineExceeded), "{err:?}");
    assert!(started.elapsed() < Duration::from_secs(10));

    // the single pooled connection is usable again
    let ok = QueryContext::background();
    db.exec(
        &ok,
        &QueryParams::new("INSERT INTO events (kind) VALUES (:kind)").bind("kind", "after"),
    )
    .await?;
    assert_eq!(
        count(&ok, &db, &QueryParams::new("SELECT COUNT(*) FROM events")).await?,
        1
    );
    Ok(())
}

#[tokio::test]
async fn cancel_from_another_task() -> Result<(), SqlCapError> {
    let dir = TempDir::new().map_err(|e| SqlCapError::ConfigError(e.to_string()))?;
    let db = open(&dir).await?;

    let ctx = QueryContext::background().with_cancel();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let err = db
        .query(&ctx, &QueryParams::new(SLOW_QUERY))
        .await
        .unwrap_err();
    assert!(matches!(err, SqlCapError::Cancelled), "{err:?}");
    Ok(())
}

#[tokio::test]
async fn cancellation_inside_a_transaction_still_rolls_back() -> Result<(), SqlCapError> {
    let dir = TempDir::new().map_err(|e| SqlCapError::ConfigError(e.to_string()))?;
    let db = open(&dir).await?;
    let background = QueryContext::background();

    let ctx = background.with_timeout(Duration::from_millis(150));
    let inner = ctx.clone();
    let err = run_in_transaction(&db, &background, TxOptions::default(), |tx| async move {
        tx.exec(
            &inner,
            &QueryParams::new("INSERT INTO events (kind) VALUES (:kind)").bind("kind", "partial"),
        )
        .await?;
        tx.query(&inner, &QueryParams::new(SLOW_QUERY)).await?;
        Ok::<_, SqlCapError>(true)
    })
    .await
    .unwrap_err();
    assert!(err.is_cancellation(), "{err:?}");

    assert_eq!(
        count(&background, &db, &QueryParams::new("SELECT COUNT(*) FROM events")).await?,
        0
    );
    Ok(())
}

#[tokio::test]
async fn child_deadline_never_outlives_its_parent() {
    let parent = QueryContext::background().with_timeout(Duration::from_millis(50));
    let child = parent.with_timeout(Duration::from_secs(60));
    assert_eq!(child.deadline(), parent.deadline());

    let root = QueryContext::background().with_cancel();
    let branch = root.with_cancel();
    branch.cancel();
    assert!(branch.is_done());
    assert!(!root.is_done());

    let err = child.done().await;
    assert!(matches!(err, SqlCapError::DeadlineExceeded));
}
