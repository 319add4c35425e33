// SQLite backend
//
// - config: pool manager and connection options
// - params: RowValues -> rusqlite values
// - query: synchronous select/execute/insert helpers run on blocking workers
// - connection: pool-level handle and the cancellable blocking runner
// - transaction: reserved-connection transaction handle
// - prepared: pool and transaction statements

pub mod config;
pub mod connection;
pub mod params;
pub mod prepared;
pub mod query;
pub mod transaction;

pub use config::{SqliteConn, SqliteManager, SqliteOptions, SqliteOptionsBuilder};
pub use connection::SqliteDb;
pub use params::Params as SqliteParams;
pub use prepared::{SqliteStatement, SqliteTxStatement};
pub use transaction::SqliteTx;
