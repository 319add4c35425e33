//! What the capability calls hand back: a row cursor and the write outcomes.

mod convert;
mod outcome;
mod rows;

pub use convert::FromRowValue;
pub use outcome::{ExecResult, InsertResult};
pub use rows::Rows;
