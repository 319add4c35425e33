// PostgreSQL backend
//
// - config: bb8 manager for tokio-postgres clients and connection options
// - params: RowValues -> ToSql
// - query: row extraction into the shared cursor
// - connection: pool-level handle and the cancel-aware runner
// - transaction: reserved-client transaction handle
// - prepared: pool and transaction statements

pub mod config;
pub mod connection;
pub mod params;
pub mod prepared;
pub mod query;
pub mod transaction;

pub use config::{PgManager, PostgresOptions};
pub use connection::PgDb;
pub use params::Params as PostgresParams;
pub use prepared::{PgStatement, PgTxStatement};
pub use query::{build_rows as postgres_build_rows, postgres_extract_value};
pub use transaction::PgTx;
