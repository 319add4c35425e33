use std::collections::HashMap;

use crate::error::SqlCapError;
use crate::interpolation::{InterpolationStrategy, MarkerKind, scan_markers};
use crate::types::RowValues;

/// Values bound to a query: an ordered positional list plus a name → value map.
///
/// Names are stored without their leading colon, so `set("id", ..)` and `set(":id", ..)`
/// bind the same placeholder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    positional: Vec<RowValues>,
    named: HashMap<String, RowValues>,
}

impl Bindings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn positional(values: Vec<RowValues>) -> Self {
        Self {
            positional: values,
            named: HashMap::new(),
        }
    }

    pub fn set(&mut self, name: &str, value: impl Into<RowValues>) -> &mut Self {
        let name = name.strip_prefix(':').unwrap_or(name);
        self.named.insert(name.to_owned(), value.into());
        self
    }

    pub fn append(&mut self, value: impl Into<RowValues>) -> &mut Self {
        self.positional.push(value.into());
        self
    }

    pub fn extend<I>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator<Item = RowValues>,
    {
        self.positional.extend(values);
        self
    }

    /// Chained form of [`Bindings::set`].
    #[must_use]
    pub fn bind(mut self, name: &str, value: impl Into<RowValues>) -> Self {
        self.set(name, value);
        self
    }

    /// Chained form of [`Bindings::append`].
    #[must_use]
    pub fn arg(mut self, value: impl Into<RowValues>) -> Self {
        self.append(value);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RowValues> {
        self.named.get(name.strip_prefix(':').unwrap_or(name))
    }

    #[must_use]
    pub fn args(&self) -> &[RowValues] {
        &self.positional
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    /// Order the bound values the way `plan` says the rendered text consumes them.
    ///
    /// # Errors
    /// `MissingBinding` for an unbound name, `BindingError` when the positional count is off.
    pub fn resolve(&self, plan: &ArgumentPlan) -> Result<Vec<RowValues>, SqlCapError> {
        match plan {
            ArgumentPlan::Passthrough => Ok(self.positional.clone()),
            ArgumentPlan::Positional(expected) => {
                if self.positional.len() == *expected {
                    Ok(self.positional.clone())
                } else {
                    Err(SqlCapError::BindingError(format!(
                        "query has {expected} positional placeholder(s) but {} value(s) were bound",
                        self.positional.len()
                    )))
                }
            }
            ArgumentPlan::Named(names) => names
                .iter()
                .map(|name| {
                    self.named
                        .get(name)
                        .cloned()
                        .ok_or_else(|| SqlCapError::MissingBinding(name.clone()))
                })
                .collect(),
        }
    }
}

/// How the arguments for a rendered query are produced from its bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentPlan {
    /// No markers were found; positional values go through untouched.
    Passthrough,
    /// `n` bare `?` markers, filled from the positional values in order.
    Positional(usize),
    /// One entry per named marker occurrence, in left-to-right order.
    Named(Vec<String>),
}

/// Query text in a backend's placeholder syntax plus the plan for its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSql {
    pub sql: String,
    pub slots: ArgumentPlan,
}

/// Rewrite the markers in `template` with tokens from `strategy`.
///
/// # Errors
/// `BindingError` when the template mixes named and positional markers.
pub fn render(
    template: &str,
    strategy: &dyn InterpolationStrategy,
) -> Result<RenderedSql, SqlCapError> {
    let markers = scan_markers(template);
    if markers.is_empty() {
        return Ok(RenderedSql {
            sql: template.to_owned(),
            slots: ArgumentPlan::Passthrough,
        });
    }

    let named = markers
        .iter()
        .filter(|m| matches!(m.kind, MarkerKind::Named(_)))
        .count();
    if named != 0 && named != markers.len() {
        return Err(SqlCapError::BindingError(
            "query mixes named and positional placeholders".into(),
        ));
    }

    let sql = substitute(template, &markers, strategy);
    let slots = if named == 0 {
        ArgumentPlan::Positional(markers.len())
    } else {
        ArgumentPlan::Named(
            markers
                .iter()
                .filter_map(|m| match m.kind {
                    MarkerKind::Named(name) => Some(name.to_owned()),
                    MarkerKind::Positional => None,
                })
                .collect(),
        )
    };

    Ok(RenderedSql { sql, slots })
}

fn substitute(
    template: &str,
    markers: &[crate::interpolation::Marker<'_>],
    strategy: &dyn InterpolationStrategy,
) -> String {
    let mut out = String::with_capacity(template.len() + markers.len() * 2);
    let mut last = 0;
    for (idx, marker) in markers.iter().enumerate() {
        out.push_str(&template[last..marker.start]);
        out.push_str(&strategy.placeholder_token(idx + 1));
        last = marker.end;
    }
    out.push_str(&template[last..]);
    out
}

/// A query template together with the values bound to it.
///
/// Templates use `:name` markers for named values or bare `?` markers for positional
/// ones; the connection's [`InterpolationStrategy`] turns them into the backend's syntax.
/// A template with neither is sent as written, so native `$1`/`?1` placeholders also work.
///
/// ```rust
/// use sqlcap::prelude::*;
///
/// let q = QueryParams::new("SELECT x WHERE y = :a AND z = :a").bind("a", 5);
/// let (sql, args) = q.interpolate(&QUESTION_MARK).unwrap();
/// assert_eq!(sql, "SELECT x WHERE y = ? AND z = ?");
/// assert_eq!(args, vec![RowValues::Int(5), RowValues::Int(5)]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParams {
    template: String,
    bindings: Bindings,
}

impl QueryParams {
    /// A query with no bound values.
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            bindings: Bindings::new(),
        }
    }

    #[must_use]
    pub fn with_args(template: impl Into<String>, args: Vec<RowValues>) -> Self {
        Self {
            template: template.into(),
            bindings: Bindings::positional(args),
        }
    }

    #[must_use]
    pub fn with_named<I, K, V>(template: impl Into<String>, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<RowValues>,
    {
        let mut bindings = Bindings::new();
        for (name, value) in pairs {
            bindings.set(name.as_ref(), value);
        }
        Self {
            template: template.into(),
            bindings,
        }
    }

    pub fn set(&mut self, name: &str, value: impl Into<RowValues>) -> &mut Self {
        self.bindings.set(name, value);
        self
    }

    pub fn append(&mut self, value: impl Into<RowValues>) -> &mut Self {
        self.bindings.append(value);
        self
    }

    #[must_use]
    pub fn bind(mut self, name: &str, value: impl Into<RowValues>) -> Self {
        self.bindings.set(name, value);
        self
    }

    #[must_use]
    pub fn arg(mut self, value: impl Into<RowValues>) -> Self {
        self.bindings.append(value);
        self
    }

    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    #[must_use]
    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// Render the text and its argument plan without resolving values.
    ///
    /// # Errors
    /// `BindingError` when named and positional markers are mixed.
    pub fn render(
        &self,
        strategy: &dyn InterpolationStrategy,
    ) -> Result<RenderedSql, SqlCapError> {
        render(&self.template, strategy)
    }

    /// Render only the text; every marker gets the token for its position.
    #[must_use]
    pub fn render_text(&self, strategy: &dyn InterpolationStrategy) -> String {
        let markers = scan_markers(&self.template);
        substitute(&self.template, &markers, strategy)
    }

    /// Produce backend text plus the arguments in the order the text consumes them.
    ///
    /// # Errors
    /// `MissingBinding` if a named marker has no value, `BindingError` for mixed markers or
    /// a positional count mismatch. Nothing is rendered on error.
    pub fn interpolate(
        &self,
        strategy: &dyn InterpolationStrategy,
    ) -> Result<(String, Vec<RowValues>), SqlCapError> {
        let rendered = self.render(strategy)?;
        let args = self.bindings.resolve(&rendered.slots)?;
        Ok((rendered.sql, args))
    }
}

impl From<&str> for QueryParams {
    fn from(template: &str) -> Self {
        Self::new(template)
    }
}

impl From<String> for QueryParams {
    fn from(template: String) -> Self {
        Self::new(template)
    }
}
