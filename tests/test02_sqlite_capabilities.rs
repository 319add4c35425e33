#![cfg(feature = "sqlite")]

use chrono::NaiveDateTime;
use serde_json::json;
use sqlcap::prelude::*;
use tempfile::TempDir;

async fn open(dir: &TempDir) -> Result<SqliteDb, SqlCapError> {
    let path = dir.path().join("caps.db");
    let db = SqliteOptions::builder(path.to_string_lossy().into_owned())
        .max_connections(4)
        .build()
        .await?;
    db.execute_batch(
        &QueryContext::background(),
        "CREATE TABLE users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            active INTEGER NOT NULL,
            score REAL,
            joined TEXT,
            meta TEXT,
            avatar BLOB
        );",
    )
    .await?;
    Ok(db)
}

// Only needs to read, so it only asks for the read capability.
async fn names<Q>(ctx: &QueryContext, db: &Q) -> Result<Vec<String>, SqlCapError>
where
    Q: Queryer + ?Sized,
{
    let mut rows = db
        .query(ctx, &QueryParams::new("SELECT name FROM users ORDER BY id"))
        .await?;
    let mut out = Vec::new();
    while rows.next() {
        out.push(rows.scan::<String>(0)?);
    }
    Ok(out)
}

#[tokio::test]
async fn insert_query_and_exec_round_trip_values() -> Result<(), SqlCapError> {
    let dir = TempDir::new().map_err(|e| SqlCapError::ConfigError(e.to_string()))?;
    let db = open(&dir).await?;
    let ctx = QueryContext::background();

    let joined = NaiveDateTime::parse_from_str("2024-03-01 08:30:00", "%Y-%m-%d %H:%M:%S")
        .expect("valid timestamp");
    let first = db
        .insert(
            &ctx,
            &QueryParams::new(
                "INSERT INTO users (name, active, score, joined, meta, avatar) \
                 VALUES (:name, :active, :score, :joined, :meta, :avatar)",
            )
            .bind("name", "alice")
            .bind("active", true)
            .bind("score", 9.5)
            .bind("joined", joined)
            .bind("meta", json!({"tier": "gold"}))
            .bind("avatar", vec![1u8, 2, 3]),
        )
        .await?;
    assert_eq!(first.rows_affected(), 1);
    assert_eq!(first.last_insert_id()?, 1);

    let second = db
        .insert(
            &ctx,
            &QueryParams::new("INSERT INTO users (name, active) VALUES (?, ?)")
                .arg("bob")
                .arg(false),
        )
        .await?;
    assert_eq!(second.last_insert_id()?, 2);

    let mut rows = db
        .query(
            &ctx,
            &QueryParams::new("SELECT * FROM users WHERE name = :name").bind("name", "alice"),
        )
        .await?;
    assert_eq!(
        rows.column_names(),
        ["id", "name", "active", "score", "joined", "meta", "avatar"]
    );
    assert!(rows.next());
    assert!(rows.scan_named::<bool>("active")?);
    assert_eq!(rows.scan_named::<f64>("score")?, 9.5);
    assert_eq!(rows.scan_named::<NaiveDateTime>("joined")?, joined);
    assert_eq!(
        rows.scan_named::<serde_json::Value>("meta")?,
        json!({"tier": "gold"})
    );
    assert_eq!(rows.scan_named::<Vec<u8>>("avatar")?, vec![1, 2, 3]);
    assert!(!rows.next());

    let updated = db
        .exec(
            &ctx,
            &QueryParams::new("UPDATE users SET active = :on WHERE active <> :on").bind("on", true),
        )
        .await?;
    assert_eq!(updated.rows_affected(), 1);

    assert_eq!(names(&ctx, &db).await?, vec!["alice", "bob"]);
    assert_eq!(
        count(&ctx, &db, &QueryParams::new("SELECT COUNT(*) FROM users WHERE active = 1")).await?,
        2
    );
    Ok(())
}

#[tokio::test]
async fn no_rows_is_an_empty_cursor() -> Result<(), SqlCapError> {
    let dir = TempDir::new().map_err(|e| SqlCapError::ConfigError(e.to_string()))?;
    let db = open(&dir).await?;
    let ctx = QueryContext::background();

    let mut rows = db
        .query(
            &ctx,
            &QueryParams::new("SELECT id, name FROM users WHERE id = :id").bind("id", 42),
        )
        .await?;
    assert_eq!(rows.column_names(), ["id", "name"]);
    assert_eq!(rows.remaining(), 0);
    assert!(!rows.next());
    assert!(rows.err().is_none());

    rows.close();
    rows.close();
    assert!(!rows.next());
    assert!(matches!(rows.err(), Some(SqlCapError::RowsClosed)));

    let none = db
        .exec(&ctx, &QueryParams::new("DELETE FROM users WHERE id = 42"))
        .await?;
    assert_eq!(none.rows_affected(), 0);

    let nulls = db
        .query(&ctx, &QueryParams::new("SELECT MAX(id) FROM users"))
        .await?;
    let mut nulls = nulls;
    assert!(nulls.next());
    assert_eq!(nulls.scan::<Option<i64>>(0)?, None);
    Ok(())
}

#[tokio::test]
async fn binding_errors_never_reach_the_backend() -> Result<(), SqlCapError> {
    let dir = TempDir::new().map_err(|e| SqlCapError::ConfigError(e.to_string()))?;
    let db = open(&dir).await?;
    let ctx = QueryContext::background();

    // the table does not exist, so any backend call would fail with a sqlite error
    let missing = db
        .query(
            &ctx,
            &QueryParams::new("SELECT * FROM nowhere WHERE id = :id AND k = :k").bind("id", 1),
        )
        .await
        .unwrap_err();
    assert!(matches!(missing, SqlCapError::MissingBinding(ref name) if name == "k"));

    let mixed = db
        .exec(
            &ctx,
            &QueryParams::new("DELETE FROM nowhere WHERE a = :a OR b = ?")
                .bind("a", 1)
                .arg(2),
        )
        .await
        .unwrap_err();
    assert!(mixed.is_binding_error());

    let backend = db
        .query(&ctx, &QueryParams::new("SELECT * FROM nowhere"))
        .await
        .unwrap_err();
    assert!(matches!(backend, SqlCapError::SqliteError(_)));
    Ok(())
}

#[tokio::test]
async fn handles_work_through_trait_objects() -> Result<(), SqlCapError> {
    let dir = TempDir::new().map_err(|e| SqlCapError::ConfigError(e.to_string()))?;
    let db = open(&dir).await?;
    let ctx = QueryContext::background();

    db.ping(&ctx).await?;

    let execer: &dyn Execer = &db;
    execer
        .exec(
            &ctx,
            &QueryParams::with_args(
                "INSERT INTO users (name, active) VALUES (?1, ?2)",
                vec![RowValues::from("carol"), RowValues::Bool(true)],
            ),
        )
        .await?;

    let queryer: &dyn Queryer = &db;
    assert_eq!(names(&ctx, queryer).await?, vec!["carol"]);

    let mut seen = Vec::new();
    query_each(
        &ctx,
        &db,
        &QueryParams::new("SELECT id, name FROM users"),
        |rows| {
            seen.push(rows.scan::<i64>(0)?);
            Ok(false)
        },
    )
    .await?;
    assert_eq!(seen, vec![1]);
    Ok(())
}

#[tokio::test]
async fn concurrent_callers_share_the_pool() -> Result<(), SqlCapError> {
    let dir = TempDir::new().map_err(|e| SqlCapError::ConfigError(e.to_string()))?;
    let db = open(&dir).await?;

    let mut handles = Vec::new();
    for i in 0..8 {
        let db = db.clone();
        handles.push(tokio::spawn(async move {
            let ctx = QueryContext::background();
            db.exec(
                &ctx,
                &QueryParams::new("INSERT INTO users (name, active) VALUES (:n, 1)")
                    .bind("n", format!("user{i}")),
            )
            .await
        }));
    }
    for handle in handles {
        handle
            .await
            .map_err(|e| SqlCapError::ExecutionError(e.to_string()))??;
    }

    let ctx = QueryContext::background();
    assert_eq!(
        count(&ctx, &db, &QueryParams::new("SELECT COUNT(*) FROM users")).await?,
        8
    );
    Ok(())
}
