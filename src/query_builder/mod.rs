//! Pure statement builders. Each builder assembles SQL text with `:name` placeholders and the
//! rows to bind; nothing here touches a connection.
//!
//! ```rust
//! use sql_toolkit::prelude::*;
//!
//! let built = Select::from("public.users")
//!     .fields(["id", ":count(*) AS n"])
//!     .filter("\"age\" > :age")
//!     .group("\"id\"")
//!     .limit((10_u64, 5_u64))
//!     .bind("age", 30_i64)
//!     .build()?;
//! assert_eq!(
//!     built.sql,
//!     "SELECT \"id\", count(*) AS n\nFROM \"public\".\"users\"\nWHERE \"age\" > :age\nGROUP BY \"id\"\nLIMIT 5 OFFSET 10"
//! );
//! # Ok::<(), SqlToolkitError>(())
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::SqlToolkitError;
use crate::params::{BindRow, BindValue, ExtraBinds};

mod dml;
mod select;

pub use dml::{Delete, Insert, Update};
pub use select::{CopyRows, Select};

/// Quote one identifier, doubling embedded quotes.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a possibly schema-qualified table name.
///
/// Names that already contain a double quote are taken as quoted by the caller and left as is.
#[must_use]
pub fn quote_table(name: &str) -> String {
    if name.contains('"') {
        name.to_string()
    } else {
        name.split('.')
            .map(quote_identifier)
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// One entry of a select list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    /// A column name, quoted on output.
    Column(String),
    /// An expression emitted verbatim.
    Raw(String),
}

impl Field {
    #[must_use]
    pub fn raw(expression: impl Into<String>) -> Self {
        Field::Raw(expression.into())
    }

    fn render(&self) -> String {
        match self {
            Field::Column(name) if name == "*" => name.clone(),
            Field::Column(name) => quote_identifier(name),
            Field::Raw(expression) => expression.clone(),
        }
    }
}

/// A leading `:` (other than a lone `:`) marks an expression: `":count(*)"` is `count(*)`.
impl From<&str> for Field {
    fn from(value: &str) -> Self {
        match value.strip_prefix(':') {
            Some(expression) if !expression.is_empty() => Field::Raw(expression.to_string()),
            _ => Field::Column(value.to_string()),
        }
    }
}

impl From<String> for Field {
    fn from(value: String) -> Self {
        Field::from(value.as_str())
    }
}

pub(crate) fn render_fields(fields: &[Field]) -> String {
    if fields.is_empty() {
        return "*".to_string();
    }
    fields.iter().map(Field::render).collect::<Vec<_>>().join(", ")
}

/// A `LIMIT` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Limit {
    Count(u64),
    /// Skip `offset` rows, then return at most `count`.
    Page { offset: u64, count: u64 },
    /// Emitted verbatim after `LIMIT`.
    Expr(String),
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Limit::Count(count) => write!(f, "LIMIT {count}"),
            Limit::Page { offset, count } => write!(f, "LIMIT {count} OFFSET {offset}"),
            Limit::Expr(expression) => write!(f, "LIMIT {expression}"),
        }
    }
}

impl From<u64> for Limit {
    fn from(count: u64) -> Self {
        Limit::Count(count)
    }
}

impl From<(u64, u64)> for Limit {
    fn from((offset, count): (u64, u64)) -> Self {
        Limit::Page { offset, count }
    }
}

impl TryFrom<&[u64]> for Limit {
    type Error = SqlToolkitError;

    fn try_from(bounds: &[u64]) -> Result<Self, Self::Error> {
        match *bounds {
            [count] => Ok(Limit::Count(count)),
            [offset, count] => Ok(Limit::Page { offset, count }),
            _ => Err(SqlToolkitError::BuildError(format!(
                "limit takes one bound or an (offset, count) pair, got {} values",
                bounds.len()
            ))),
        }
    }
}

/// What `INSERT .. ON CONFLICT` does with a colliding row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConflictAction {
    /// Keep the existing row.
    #[default]
    DoNothing,
    /// Overwrite every inserted column.
    UpdateAll,
    /// Overwrite only these columns.
    Columns(Vec<String>),
}

impl ConflictAction {
    #[must_use]
    pub fn columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ConflictAction::Columns(columns.into_iter().map(Into::into).collect())
    }
}

impl FromStr for ConflictAction {
    type Err = SqlToolkitError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "nothing" | "do nothing" => Ok(ConflictAction::DoNothing),
            "update" | "update all" => Ok(ConflictAction::UpdateAll),
            other => Err(SqlToolkitError::BuildError(format!(
                "unsupported conflict action `{other}`; expected `nothing` or `update`"
            ))),
        }
    }
}

/// Per-call options shared by every builder.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub(crate) binds: ExtraBinds,
    pub(crate) echo: Option<bool>,
}

/// The output of a builder, ready for the executor.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltStatement {
    /// SQL with `:name` placeholders.
    pub sql: String,
    /// One entry per execution; empty means a single execution with no row values.
    pub rows: Vec<BindRow>,
    /// Placeholders to replace with SQL fragments before binding.
    pub raw: Vec<(String, String)>,
    pub echo: Option<bool>,
}

impl BuiltStatement {
    /// Merge literal extras into every row (or make them the only row) and collect raw ones.
    fn with_extras(sql: String, mut rows: Vec<BindRow>, options: CallOptions) -> Self {
        let (raw, literal) = options.binds.split();
        if !literal.is_empty() {
            if rows.is_empty() {
                rows.push(literal);
            } else {
                for row in &mut rows {
                    for (key, value) in literal.iter() {
                        row.insert(key, value.clone());
                    }
                }
            }
        }
        Self {
            sql,
            rows,
            raw,
            echo: options.echo,
        }
    }
}

/// Common surface of all statement builders.
pub trait StatementBuilder: Sized {
    fn options_mut(&mut self) -> &mut CallOptions;

    /// Assemble the SQL text and rows.
    ///
    /// # Errors
    /// Returns `SqlToolkitError::BuildError` when the call shape cannot produce valid SQL.
    fn build(self) -> Result<BuiltStatement, SqlToolkitError>;

    /// Attach a per-call value under `name`.
    #[must_use]
    fn bind(mut self, name: impl Into<String>, value: impl Into<BindValue>) -> Self {
        self.options_mut().binds.push(name, value);
        self
    }

    /// Override the engine's echo setting for this call.
    #[must_use]
    fn echo(mut self, echo: bool) -> Self {
        self.options_mut().echo = Some(echo);
        self
    }
}

/// Arbitrary SQL with named placeholders.
#[derive(Debug, Clone, Default)]
pub struct Execute {
    sql: String,
    rows: Vec<BindRow>,
    options: CallOptions,
}

impl Execute {
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            ..Self::default()
        }
    }

    /// Execute once per row.
    #[must_use]
    pub fn rows(mut self, rows: impl IntoIterator<Item = BindRow>) -> Self {
        self.rows.extend(rows);
        self
    }

    #[must_use]
    pub fn row(mut self, row: BindRow) -> Self {
        self.rows.push(row);
        self
    }
}

impl From<&str> for Execute {
    fn from(sql: &str) -> Self {
        Execute::new(sql)
    }
}

impl From<String> for Execute {
    fn from(sql: String) -> Self {
        Execute::new(sql)
    }
}

impl StatementBuilder for Execute {
    fn options_mut(&mut self) -> &mut CallOptions {
        &mut self.options
    }

    fn build(self) -> Result<BuiltStatement, SqlToolkitError> {
        Ok(BuiltStatement::with_extras(self.sql, self.rows, self.options))
    }
}
