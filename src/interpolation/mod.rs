//! Backend-specific placeholder tokens.
//!
//! Query text is written once with backend-agnostic markers (`:name` or bare `?`); an
//! [`InterpolationStrategy`] is the only backend-specific piece needed to turn those markers
//! into the token a driver accepts.

use std::borrow::Cow;
use std::fmt;

mod parsers;
mod scanner;

pub(crate) use scanner::{Marker, MarkerKind, scan_markers};

/// Maps "a parameter goes here" to the token a backend expects.
///
/// Called once per rendered argument. `position` is 1-based and equals the index of the
/// argument in the rendered argument list, so numbered styles (`$1`, `?1`) line up with the
/// values they stand for. Implementations hold no mutable state; one shared instance serves
/// every call.
pub trait InterpolationStrategy: Send + Sync + fmt::Debug {
    fn placeholder_token(&self, position: usize) -> Cow<'static, str>;
}

/// Built-in placeholder styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// A fixed `?` for every parameter (MySQL, ODBC).
    QuestionMark,
    /// SQLite-style numbered placeholders like `?1`.
    NumberedQuestion,
    /// PostgreSQL-style placeholders like `$1`.
    Dollar,
    /// SQL Server-style placeholders like `@P1`.
    AtP,
}

impl InterpolationStrategy for PlaceholderStyle {
    fn placeholder_token(&self, position: usize) -> Cow<'static, str> {
        match self {
            PlaceholderStyle::QuestionMark => Cow::Borrowed("?"),
            PlaceholderStyle::NumberedQuestion => Cow::Owned(format!("?{position}")),
            PlaceholderStyle::Dollar => Cow::Owned(format!("${position}")),
            PlaceholderStyle::AtP => Cow::Owned(format!("@P{position}")),
        }
    }
}

/// Shared fixed-`?` strategy.
pub static QUESTION_MARK: PlaceholderStyle = PlaceholderStyle::QuestionMark;
/// Shared `?N` strategy, the `SQLite` default.
pub static SQLITE_NUMBERED: PlaceholderStyle = PlaceholderStyle::NumberedQuestion;
/// Shared `$N` strategy, the `PostgreSQL` default.
pub static POSTGRES_DOLLAR: PlaceholderStyle = PlaceholderStyle::Dollar;
/// Shared `@PN` strategy.
pub static MSSQL_AT: PlaceholderStyle = PlaceholderStyle::AtP;

/// Quote an identifier with backticks, doubling embedded backticks.
#[must_use]
pub fn quote_backtick(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Quote an identifier with double quotes, doubling embedded double quotes.
#[must_use]
pub fn quote_double(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
