use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bb8::ManageConnection;
use rusqlite::{Connection, InterruptHandle};
use tokio::sync::Mutex;

use crate::error::SqlCapError;

use super::connection::SqliteDb;

/// A pooled `SQLite` connection.
///
/// The `rusqlite::Connection` sits behind an async mutex so blocking work can run on
/// `spawn_blocking`; the interrupt handle lives outside the lock so an in-flight statement
/// can be stopped while the worker holds it.
#[derive(Clone)]
pub struct SqliteConn {
    pub(crate) inner: Arc<Mutex<Connection>>,
    pub(crate) interrupt: Arc<InterruptHandle>,
}

impl SqliteConn {
    fn new(conn: Connection) -> Self {
        let interrupt = Arc::new(conn.get_interrupt_handle());
        Self {
            inner: Arc::new(Mutex::new(conn)),
            interrupt,
        }
    }
}

/// bb8 manager for `SQLite` connections.
#[derive(Debug, Clone)]
pub struct SqliteManager {
    db_path: String,
    busy_timeout: Duration,
    wal: bool,
}

impl SqliteManager {
    #[must_use]
    pub fn new(options: &SqliteOptions) -> Self {
        Self {
            db_path: options.db_path.clone(),
            busy_timeout: options.busy_timeout,
            wal: options.wal,
        }
    }
}

impl ManageConnection for SqliteManager {
    type Connection = SqliteConn;
    type Error = rusqlite::Error;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let manager = self.clone();
        async move {
            let conn = Connection::open(&manager.db_path)?;
            conn.busy_timeout(manager.busy_timeout)?;
            if manager.wal {
                conn.execute_batch("PRAGMA journal_mode = WAL;")?;
            }
            Ok(SqliteConn::new(conn))
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move {
            let guard = conn.inner.lock().await;
            guard.query_row("SELECT 1", [], |_| Ok(()))
        }
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// Options for configuring a `SQLite` pool.
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    pub db_path: String,
    pub max_connections: u32,
    pub busy_timeout: Duration,
    /// Switch new connections to WAL journaling.
    pub wal: bool,
}

impl SqliteOptions {
    #[must_use]
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            max_connections: 8,
            busy_timeout: Duration::from_secs(5),
            wal: true,
        }
    }

    #[must_use]
    pub fn builder(db_path: impl Into<String>) -> SqliteOptionsBuilder {
        SqliteOptionsBuilder::new(db_path)
    }

    /// # Errors
    /// Returns `SqlCapError::ConfigError` for an empty path or a zero-sized pool.
    pub fn validate(&self) -> Result<(), SqlCapError> {
        if self.db_path.trim().is_empty() {
            return Err(SqlCapError::ConfigError("db_path is required".to_string()));
        }
        if self.max_connections == 0 {
            return Err(SqlCapError::ConfigError(
                "max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Fluent builder for `SQLite` options.
#[derive(Debug, Clone)]
pub struct SqliteOptionsBuilder {
    opts: SqliteOptions,
}

impl SqliteOptionsBuilder {
    #[must_use]
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            opts: SqliteOptions::new(db_path),
        }
    }

    #[must_use]
    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.opts.max_connections = max_connections;
        self
    }

    #[must_use]
    pub fn busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.opts.busy_timeout = busy_timeout;
        self
    }

    #[must_use]
    pub fn wal(mut self, wal: bool) -> Self {
        self.opts.wal = wal;
        self
    }

    #[must_use]
    pub fn finish(self) -> SqliteOptions {
        self.opts
    }

    /// Build the pool and return a connection handle.
    ///
    /// # Errors
    ///
    /// Returns `SqlCapError` if the options are invalid, or pool creation or the initial
    /// smoke test fails.
    pub async fn build(self) -> Result<SqliteDb, SqlCapError> {
        SqliteDb::connect(self.finish()).await
    }
}
