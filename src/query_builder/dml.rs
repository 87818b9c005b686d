use std::collections::HashSet;

use super::{
    BuiltStatement, CallOptions, ConflictAction, Field, Limit, StatementBuilder, quote_identifier,
    quote_table, render_fields,
};
use crate::error::SqlToolkitError;
use crate::params::BindRow;
use crate::types::RowValues;

fn is_plain_identifier(column: &str) -> bool {
    !column.is_empty() && column.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Placeholder names for `columns`, one each. Plain identifiers bind under their own name;
/// anything else gets a positional `col_N` name, suffixed until it clashes with no other
/// placeholder in the statement.
fn bind_names(columns: &[String], first_position: usize) -> Vec<String> {
    let mut taken: HashSet<String> = columns
        .iter()
        .filter(|column| is_plain_identifier(column))
        .cloned()
        .collect();
    columns
        .iter()
        .enumerate()
        .map(|(offset, column)| {
            if is_plain_identifier(column) {
                return column.clone();
            }
            let base = format!("col_{}", first_position + offset);
            let mut name = base.clone();
            let mut suffix = 1;
            while taken.contains(&name) {
                name = format!("{base}_{suffix}");
                suffix += 1;
            }
            taken.insert(name.clone());
            name
        })
        .collect()
}

fn has_data(rows: &[BindRow]) -> bool {
    rows.iter().any(|row| !row.is_empty())
}

/// `INSERT` builder with optional upsert and `RETURNING`.
///
/// Column order is: raw extras, literal extras, then row columns in first-seen order. A row
/// missing a column binds NULL for it.
#[derive(Debug, Clone, Default)]
pub struct Insert {
    table: String,
    rows: Vec<BindRow>,
    conflict_keys: Vec<String>,
    conflict_action: Option<ConflictAction>,
    returning: Vec<Field>,
    options: CallOptions,
}

impl Insert {
    #[must_use]
    pub fn into(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

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

    /// Columns of the unique constraint that `ON CONFLICT` targets.
    #[must_use]
    pub fn on_conflict<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.conflict_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Defaults to [`ConflictAction::DoNothing`] once a conflict clause is present.
    #[must_use]
    pub fn conflict_action(mut self, action: ConflictAction) -> Self {
        self.conflict_action = Some(action);
        self
    }

    #[must_use]
    pub fn returning<I, F>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>,
    {
        self.returning = fields.into_iter().map(Into::into).collect();
        self
    }

    fn conflict_clause(&self, columns: &[String]) -> Result<Option<String>, SqlToolkitError> {
        let action = match (&self.conflict_action, self.conflict_keys.is_empty()) {
            (None, true) => return Ok(None),
            (None, false) => ConflictAction::DoNothing,
            (Some(action), _) => action.clone(),
        };
        let target = if self.conflict_keys.is_empty() {
            if action != ConflictAction::DoNothing {
                return Err(SqlToolkitError::BuildError(
                    "an updating conflict action needs conflict key columns".to_string(),
                ));
            }
            "ON CONFLICT".to_string()
        } else {
            let keys = self
                .conflict_keys
                .iter()
                .map(|key| quote_identifier(key))
                .collect::<Vec<_>>()
                .join(", ");
            format!("ON CONFLICT ({keys})")
        };

        let updated: Vec<&String> = match &action {
            ConflictAction::DoNothing => return Ok(Some(format!("{target}\nDO NOTHING"))),
            ConflictAction::UpdateAll => columns.iter().collect(),
            ConflictAction::Columns(chosen) => {
                if chosen.is_empty() {
                    return Err(SqlToolkitError::BuildError(
                        "conflict update column list is empty".to_string(),
                    ));
                }
                if let Some(unknown) = chosen.iter().find(|c| !columns.contains(c)) {
                    return Err(SqlToolkitError::BuildError(format!(
                        "conflict update column `{unknown}` is not an inserted column"
                    )));
                }
                columns.iter().filter(|c| chosen.contains(c)).collect()
            }
        };
        let set = updated
            .iter()
            .map(|column| {
                let quoted = quote_identifier(column);
                format!("{quoted} = EXCLUDED.{quoted}")
            })
            .collect::<Vec<_>>()
            .join(",\n    ");
        Ok(Some(format!("{target}\nDO UPDATE SET\n    {set}")))
    }
}

impl StatementBuilder for Insert {
    fn options_mut(&mut self) -> &mut CallOptions {
        &mut self.options
    }

    fn build(self) -> Result<BuiltStatement, SqlToolkitError> {
        if !has_data(&self.rows) {
            return Err(SqlToolkitError::BuildError(format!(
                "insert into `{}` has no row data",
                self.table
            )));
        }
        let (raw, literal) = self.options.binds.clone().split();

        let mut row_columns: Vec<String> = Vec::new();
        for row in &self.rows {
            for key in row.keys() {
                let extra = literal.contains_key(key) || raw.iter().any(|(k, _)| k == key);
                if !extra && !row_columns.iter().any(|c| c == key) {
                    row_columns.push(key.to_string());
                }
            }
        }

        let mut columns: Vec<String> = Vec::new();
        let mut values: Vec<String> = Vec::new();
        let mut bound: Vec<(String, String)> = Vec::new();
        for (column, expression) in &raw {
            columns.push(column.clone());
            values.push(expression.clone());
        }
        let bound_columns: Vec<String> = literal
            .keys()
            .map(str::to_string)
            .chain(row_columns)
            .collect();
        for (column, name) in bound_columns
            .iter()
            .zip(bind_names(&bound_columns, columns.len()))
        {
            values.push(format!(":{name}"));
            bound.push((column.clone(), name));
            columns.push(column.clone());
        }

        let rows = self
            .rows
            .iter()
            .map(|row| {
                bound
                    .iter()
                    .map(|(column, name)| {
                        let value = literal
                            .get(column)
                            .or_else(|| row.get(column))
                            .cloned()
                            .unwrap_or(RowValues::Null);
                        (name.clone(), value)
                    })
                    .collect::<BindRow>()
            })
            .collect();

        let column_list = columns
            .iter()
            .map(|column| quote_identifier(column))
            .collect::<Vec<_>>()
            .join(", ");
        let mut clauses = vec![
            format!("INSERT INTO {} ({column_list})", quote_table(&self.table)),
            format!("VALUES ({})", values.join(", ")),
        ];
        if let Some(conflict) = self.conflict_clause(&columns)? {
            clauses.push(conflict);
        }
        if !self.returning.is_empty() {
            clauses.push(format!("RETURNING {}", render_fields(&self.returning)));
        }

        Ok(BuiltStatement {
            sql: clauses.join("\n"),
            rows,
            raw: Vec::new(),
            echo: self.options.echo,
        })
    }
}

/// `UPDATE` builder. The first key of each row is the `WHERE` predicate and the rest form
/// the `SET` list, so every row must carry the same keys in the same order.
#[derive(Debug, Clone, Default)]
pub struct Update {
    table: String,
    rows: Vec<BindRow>,
    options: CallOptions,
}

impl Update {
    #[must_use]
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

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

impl StatementBuilder for Update {
    fn options_mut(&mut self) -> &mut CallOptions {
        &mut self.options
    }

    fn build(self) -> Result<BuiltStatement, SqlToolkitError> {
        if !has_data(&self.rows) {
            return Err(SqlToolkitError::BuildError(format!(
                "update of `{}` has no row data",
                self.table
            )));
        }
        let (raw, literal) = self.options.binds.split();
        let mut rows = self.rows;
        for row in &mut rows {
            for (key, value) in literal.iter() {
                row.insert(key, value.clone());
            }
        }

        let columns: Vec<String> = rows[0].keys().map(str::to_string).collect();
        if let Some(position) = rows
            .iter()
            .position(|row| !row.keys().eq(columns.iter().map(String::as_str)))
        {
            return Err(SqlToolkitError::BuildError(format!(
                "update row {position} does not share the first row's columns {columns:?}"
            )));
        }
        let Some((key_column, set_columns)) = columns.split_first() else {
            return Err(SqlToolkitError::BuildError(
                "update rows have no columns".to_string(),
            ));
        };
        if set_columns.is_empty() && raw.is_empty() {
            return Err(SqlToolkitError::BuildError(format!(
                "update of `{}` has nothing to set besides the key `{key_column}`",
                self.table
            )));
        }

        let names = bind_names(&columns, 0);
        let mut assignments: Vec<String> = set_columns
            .iter()
            .zip(&names[1..])
            .map(|(column, name)| format!("{} = :{name}", quote_identifier(column)))
            .collect();
        assignments.extend(
            raw.iter()
                .map(|(column, expression)| format!("{} = {expression}", quote_identifier(column))),
        );

        let sql = [
            format!("UPDATE {}", quote_table(&self.table)),
            format!("SET {}", assignments.join(",\n    ")),
            format!("WHERE {} = :{}", quote_identifier(key_column), names[0]),
        ]
        .join("\n");

        let rows = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .zip(&names)
                    .map(|((_, value), name)| (name.clone(), value))
                    .collect::<BindRow>()
            })
            .collect();

        Ok(BuiltStatement {
            sql,
            rows,
            raw: Vec::new(),
            echo: self.options.echo,
        })
    }
}

/// `DELETE` builder. Without a filter every row of the table is removed.
#[derive(Debug, Clone, Default)]
pub struct Delete {
    table: String,
    filter: Option<String>,
    order: Option<String>,
    limit: Option<Limit>,
    options: CallOptions,
}

impl Delete {
    #[must_use]
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn filter(mut self, clause: impl Into<String>) -> Self {
        self.filter = Some(clause.into());
        self
    }

    #[must_use]
    pub fn order(mut self, clause: impl Into<String>) -> Self {
        self.order = Some(clause.into());
        self
    }

    /// Needs backend support for `DELETE .. LIMIT`.
    #[must_use]
    pub fn limit(mut self, limit: impl Into<Limit>) -> Self {
        self.limit = Some(limit.into());
        self
    }
}

impl From<&str> for Delete {
    fn from(table: &str) -> Self {
        Delete::from(table)
    }
}

impl StatementBuilder for Delete {
    fn options_mut(&mut self) -> &mut CallOptions {
        &mut self.options
    }

    fn build(self) -> Result<BuiltStatement, SqlToolkitError> {
        let mut clauses = vec![format!("DELETE FROM {}", quote_table(&self.table))];
        if let Some(filter) = &self.filter {
            clauses.push(format!("WHERE {filter}"));
        }
        if let Some(order) = &self.order {
            clauses.push(format!("ORDER BY {order}"));
        }
        if let Some(limit) = &self.limit {
            clauses.push(limit.to_string());
        }
        Ok(BuiltStatement::with_extras(
            clauses.join("\n"),
            Vec::new(),
            self.options,
        ))
    }
}
