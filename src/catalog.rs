//! Schema catalog cached on an engine and refreshed only on request.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::engine::Engine;
use crate::error::SqlToolkitError;
use crate::results::ResultSet;

/// Tables and their columns in ordinal order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaCatalog {
    tables: BTreeMap<String, Vec<String>>,
}

impl SchemaCatalog {
    /// Build from `(table_name, column_name)` rows.
    ///
    /// # Errors
    /// Returns `SqlToolkitError::ExecutionError` when a row lacks either text column.
    pub(crate) fn from_result(result: &ResultSet) -> Result<Self, SqlToolkitError> {
        let mut tables: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for row in result {
            let table = row.get("table_name").and_then(|v| v.as_text());
            let column = row.get("column_name").and_then(|v| v.as_text());
            match (table, column) {
                (Some(table), Some(column)) => tables
                    .entry(table.to_string())
                    .or_default()
                    .push(column.to_string()),
                _ => {
                    return Err(SqlToolkitError::ExecutionError(
                        "catalog row without table_name/column_name text".to_string(),
                    ));
                }
            }
        }
        Ok(Self { tables })
    }

    #[must_use]
    pub fn contains_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    #[must_use]
    pub fn contains_column(&self, table: &str, column: &str) -> bool {
        self.tables
            .get(table)
            .is_some_and(|columns| columns.iter().any(|c| c == column))
    }

    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    #[must_use]
    pub fn columns(&self, table: &str) -> Option<&[String]> {
        self.tables.get(table).map(Vec::as_slice)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    fn answers(&self, table: &str, column: Option<&str>) -> bool {
        match column {
            Some(column) => self.contains_column(table, column),
            None => self.contains_table(table),
        }
    }
}

/// Access to an engine's catalog cache.
#[derive(Debug, Clone, Copy)]
pub struct Catalog<'e> {
    engine: &'e Engine,
}

impl<'e> Catalog<'e> {
    pub(crate) fn new(engine: &'e Engine) -> Self {
        Self { engine }
    }

    /// The catalog from the last refresh, if any.
    #[must_use]
    pub fn cached(&self) -> Option<Arc<SchemaCatalog>> {
        match self.engine.catalog_slot().read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Drop the cached catalog, e.g. after DDL.
    pub fn invalidate(&self) {
        self.store(None);
    }

    fn store(&self, catalog: Option<Arc<SchemaCatalog>>) {
        match self.engine.catalog_slot().write() {
            Ok(mut guard) => *guard = catalog,
            Err(poisoned) => *poisoned.into_inner() = catalog,
        }
    }

    /// Read the catalog from the database and cache it.
    ///
    /// # Errors
    /// Returns driver errors; the previous cache is kept.
    pub async fn refresh(&self) -> Result<Arc<SchemaCatalog>, SqlToolkitError> {
        let sql = self.engine.backend().catalog_sql();
        let result = self.engine.execute(sql).await?;
        let catalog = Arc::new(SchemaCatalog::from_result(&result)?);
        tracing::debug!(tables = catalog.len(), "refreshed schema catalog");
        self.store(Some(Arc::clone(&catalog)));
        Ok(catalog)
    }

    /// Whether `table` (and `column`, when given) exists according to the cache. On a miss,
    /// `refresh_on_miss` refreshes once and answers from the new catalog.
    ///
    /// # Errors
    /// Returns errors from the refresh.
    pub async fn lookup(
        &self,
        table: &str,
        column: Option<&str>,
        refresh_on_miss: bool,
    ) -> Result<bool, SqlToolkitError> {
        if self
            .cached()
            .is_some_and(|catalog| catalog.answers(table, column))
        {
            return Ok(true);
        }
        if !refresh_on_miss {
            return Ok(false);
        }
        Ok(self.refresh().await?.answers(table, column))
    }
}
