use super::{
    BuiltStatement, CallOptions, Field, Limit, StatementBuilder, quote_table, render_fields,
};
use crate::error::SqlToolkitError;

/// `SELECT` builder. Clauses are emitted in a fixed order whatever order they were set in.
#[derive(Debug, Clone, Default)]
pub struct Select {
    table: String,
    fields: Vec<Field>,
    filter: Option<String>,
    group: Option<String>,
    having: Option<String>,
    order: Option<String>,
    limit: Option<Limit>,
    options: CallOptions,
}

impl Select {
    #[must_use]
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    /// Select list entries; see [`Field`] for the raw-expression marker.
    #[must_use]
    pub fn fields<I, F>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Use `expression` as the whole select list, unquoted.
    #[must_use]
    pub fn fields_raw(mut self, expression: impl Into<String>) -> Self {
        self.fields = vec![Field::Raw(expression.into())];
        self
    }

    /// `WHERE` clause body.
    #[must_use]
    pub fn filter(mut self, clause: impl Into<String>) -> Self {
        self.filter = Some(clause.into());
        self
    }

    #[must_use]
    pub fn group(mut self, clause: impl Into<String>) -> Self {
        self.group = Some(clause.into());
        self
    }

    #[must_use]
    pub fn having(mut self, clause: impl Into<String>) -> Self {
        self.having = Some(clause.into());
        self
    }

    #[must_use]
    pub fn order(mut self, clause: impl Into<String>) -> Self {
        self.order = Some(clause.into());
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: impl Into<Limit>) -> Self {
        self.limit = Some(limit.into());
        self
    }

    /// Same statement selecting the constant `1`, used for row counting.
    pub(crate) fn counting(mut self) -> Self {
        self.fields = vec![Field::Raw("1".to_string())];
        self
    }

    fn render(&self) -> String {
        let mut clauses = vec![
            format!("SELECT {}", render_fields(&self.fields)),
            format!("FROM {}", quote_table(&self.table)),
        ];
        if let Some(filter) = &self.filter {
            clauses.push(format!("WHERE {filter}"));
        }
        if let Some(group) = &self.group {
            clauses.push(format!("GROUP BY {group}"));
        }
        if let Some(having) = &self.having {
            clauses.push(format!("HAVING {having}"));
        }
        if let Some(order) = &self.order {
            clauses.push(format!("ORDER BY {order}"));
        }
        if let Some(limit) = &self.limit {
            clauses.push(limit.to_string());
        }
        clauses.join("\n")
    }
}

impl From<&str> for Select {
    fn from(table: &str) -> Self {
        Select::from(table)
    }
}

impl From<String> for Select {
    fn from(table: String) -> Self {
        Select::from(table)
    }
}

impl StatementBuilder for Select {
    fn options_mut(&mut self) -> &mut CallOptions {
        &mut self.options
    }

    fn build(self) -> Result<BuiltStatement, SqlToolkitError> {
        let sql = self.render();
        Ok(BuiltStatement::with_extras(sql, Vec::new(), self.options))
    }
}

/// Duplicate matching rows of a table into itself: `INSERT INTO t .. SELECT .. FROM t`.
#[derive(Debug, Clone, Default)]
pub struct CopyRows {
    table: String,
    columns: Vec<Field>,
    filter: Option<String>,
    limit: Option<Limit>,
    options: CallOptions,
}

impl CopyRows {
    #[must_use]
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    /// Columns to copy. Leave unset to copy whole rows, which only works when no column
    /// carries a unique constraint. Fields follow the same rules as [`Select::fields`]; the
    /// rendered list is used both as the target column list and as the `SELECT` list.
    #[must_use]
    pub fn columns<I, F>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn filter(mut self, clause: impl Into<String>) -> Self {
        self.filter = Some(clause.into());
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: impl Into<Limit>) -> Self {
        self.limit = Some(limit.into());
        self
    }
}

impl From<&str> for CopyRows {
    fn from(table: &str) -> Self {
        CopyRows::from(table)
    }
}

impl StatementBuilder for CopyRows {
    fn options_mut(&mut self) -> &mut CallOptions {
        &mut self.options
    }

    fn build(self) -> Result<BuiltStatement, SqlToolkitError> {
        let table = quote_table(&self.table);
        let mut clauses = Vec::new();
        if self.columns.is_empty() {
            clauses.push(format!("INSERT INTO {table}"));
            clauses.push("SELECT *".to_string());
        } else {
            let columns = render_fields(&self.columns);
            clauses.push(format!("INSERT INTO {table} ({columns})"));
            clauses.push(format!("SELECT {columns}"));
        }
        clauses.push(format!("FROM {table}"));
        if let Some(filter) = &self.filter {
            clauses.push(format!("WHERE {filter}"));
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::BindValue;
    use crate::types::RowValues;

    #[test]
    fn select_defaults_to_star() {
        let built = Select::from("t").build().unwrap();
        assert_eq!(built.sql, "SELECT *\nFROM \"t\"");
        assert!(built.rows.is_empty());
    }

    #[test]
    fn clause_order_is_fixed() {
        let built = Select::from("t")
            .limit(20_u64)
            .order("\"id\" DESC")
            .having("count(*) > 1")
            .group("\"k\"")
            .filter("\"k\" = :k")
            .fields_raw("k, count(*)")
            .bind("k", "x")
            .build()
            .unwrap();
        assert_eq!(
            built.sql,
            "SELECT k, count(*)\nFROM \"t\"\nWHERE \"k\" = :k\nGROUP BY \"k\"\nHAVING count(*) > 1\nORDER BY \"id\" DESC\nLIMIT 20"
        );
        assert_eq!(built.rows[0].get("k"), Some(&RowValues::Text("x".into())));
    }

    #[test]
    fn pagination_skips_then_caps() {
        let built = Select::from("t").limit((10_u64, 5_u64)).build().unwrap();
        assert!(built.sql.ends_with("LIMIT 5 OFFSET 10"));
    }

    #[test]
    fn raw_binds_are_collected_for_inlining() {
        let built = Select::from("t")
            .filter("\"at\" < :now")
            .bind("now", BindValue::raw("CURRENT_TIMESTAMP"))
            .build()
            .unwrap();
        assert!(built.rows.is_empty());
        assert_eq!(built.raw[0].1, "CURRENT_TIMESTAMP");
    }

    #[test]
    fn copy_with_columns() {
        let built = CopyRows::from("t")
            .columns(["a", "b"])
            .filter("\"a\" = 1")
            .limit(1_u64)
            .build()
            .unwrap();
        assert_eq!(
            built.sql,
            "INSERT INTO \"t\" (\"a\", \"b\")\nSELECT \"a\", \"b\"\nFROM \"t\"\nWHERE \"a\" = 1\nLIMIT 1"
        );
    }

    #[test]
    fn copy_columns_accept_raw_fields() {
        let built = CopyRows::from("t")
            .columns([Field::from("a"), Field::from(":\"b\""), Field::raw("\"c\"")])
            .build()
            .unwrap();
        assert_eq!(
            built.sql,
            "INSERT INTO \"t\" (\"a\", \"b\", \"c\")\nSELECT \"a\", \"b\", \"c\"\nFROM \"t\""
        );
    }
}
