use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::row::{ResultRow, index_columns};
use crate::types::RowValues;

/// The outcome of executing a statement.
///
/// For statements that return rows `rows_affected` equals the number of rows; for other
/// statements it is the driver's affected-row count.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// The rows returned by the query
    pub results: Vec<ResultRow>,
    /// The number of rows affected (for DML statements)
    pub rows_affected: usize,
    column_names: Option<Arc<Vec<String>>>,
    column_index: Option<Arc<HashMap<String, usize>>>,
}

impl ResultSet {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> ResultSet {
        ResultSet {
            results: Vec::with_capacity(capacity),
            ..ResultSet::default()
        }
    }

    /// A row-less result carrying only an affected-row count.
    #[must_use]
    pub fn affected(rows_affected: usize) -> ResultSet {
        ResultSet {
            rows_affected,
            ..ResultSet::default()
        }
    }

    /// Set the column names for this result set (to be shared by all rows)
    pub fn set_column_names(&mut self, column_names: Arc<Vec<String>>) {
        self.column_index = Some(Arc::new(index_columns(&column_names)));
        self.column_names = Some(column_names);
    }

    #[must_use]
    pub fn get_column_names(&self) -> Option<&Arc<Vec<String>>> {
        self.column_names.as_ref()
    }

    /// Add a row; ignored until column names are set.
    pub fn add_row_values(&mut self, row_values: Vec<RowValues>) {
        if let (Some(names), Some(index)) = (&self.column_names, &self.column_index) {
            self.results.push(ResultRow::with_index(
                Arc::clone(names),
                Arc::clone(index),
                row_values,
            ));
            self.rows_affected += 1;
        }
    }

    /// Fold another execution's result into this one: rows are appended and counts summed.
    pub fn merge(&mut self, other: ResultSet) {
        if self.column_names.is_none() {
            self.column_names = other.column_names;
            self.column_index = other.column_index;
        }
        self.results.extend(other.results);
        self.rows_affected += other.rows_affected;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResultRow> {
        self.results.iter()
    }

    /// First column of the first row.
    #[must_use]
    pub fn scalar(&self) -> Option<&RowValues> {
        self.results.first().and_then(|row| row.get_by_index(0))
    }

    /// Every value of one column, or `None` if the column is absent.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<Vec<&RowValues>> {
        let idx = self.column_index.as_ref()?.get(name).copied()?;
        Some(
            self.results
                .iter()
                .filter_map(|row| row.get_by_index(idx))
                .collect(),
        )
    }

    /// Rows as JSON objects keyed by column name.
    #[must_use]
    pub fn to_records(&self) -> Vec<JsonValue> {
        self.results.iter().map(ResultRow::to_json).collect()
    }
}

impl IntoIterator for ResultSet {
    type Item = ResultRow;
    type IntoIter = std::vec::IntoIter<ResultRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a ResultRow;
    type IntoIter = std::slice::Iter<'a, ResultRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ResultSet {
        let mut rs = ResultSet::with_capacity(2);
        rs.set_column_names(Arc::new(vec!["id".into(), "name".into()]));
        rs.add_row_values(vec![RowValues::Int(1), RowValues::Text("a".into())]);
        rs.add_row_values(vec![RowValues::Int(2), RowValues::Text("b".into())]);
        rs
    }

    #[test]
    fn projections() {
        let rs = sample();
        assert_eq!(rs.scalar(), Some(&RowValues::Int(1)));
        assert_eq!(
            rs.column("name"),
            Some(vec![&RowValues::Text("a".into()), &RowValues::Text("b".into())])
        );
        assert!(rs.column("missing").is_none());
        assert_eq!(rs.to_records()[1], serde_json::json!({"id": 2, "name": "b"}));
    }

    #[test]
    fn merge_sums_counts() {
        let mut rs = ResultSet::affected(3);
        rs.merge(sample());
        assert_eq!(rs.rows_affected, 5);
        assert_eq!(rs.len(), 2);
        assert_eq!(rs.results[0].get("name"), Some(&RowValues::Text("a".into())));
    }
}
