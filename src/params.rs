use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;

use crate::types::RowValues;

/// A value supplied alongside a statement: either bound as a parameter or spliced in as SQL.
///
/// `From` conversions always produce [`BindValue::Literal`], so text that happens to start
/// with `:` is still bound as data. Server-side expressions must be requested explicitly:
/// ```rust
/// use sql_toolkit::prelude::*;
///
/// let created = BindValue::raw("CURRENT_TIMESTAMP");
/// let label = BindValue::from(":not-an-expression");
/// assert!(created.is_raw());
/// assert!(!label.is_raw());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Literal(RowValues),
    Raw(String),
}

impl BindValue {
    /// A SQL fragment inserted verbatim in place of the placeholder.
    #[must_use]
    pub fn raw(expression: impl Into<String>) -> Self {
        BindValue::Raw(expression.into())
    }

    #[must_use]
    pub fn literal(value: impl Into<RowValues>) -> Self {
        BindValue::Literal(value.into())
    }

    #[must_use]
    pub fn is_raw(&self) -> bool {
        matches!(self, BindValue::Raw(_))
    }
}

impl From<RowValues> for BindValue {
    fn from(value: RowValues) -> Self {
        BindValue::Literal(value)
    }
}

macro_rules! bind_value_from {
    ($($source:ty),+ $(,)?) => {
        $(
            impl From<$source> for BindValue {
                fn from(value: $source) -> Self {
                    BindValue::Literal(RowValues::from(value))
                }
            }
        )+
    };
}

bind_value_from!(i64, i32, i16, u32, f64, f32, bool, String, &str, &String, NaiveDateTime, JsonValue);

impl<T: Into<RowValues>> From<Option<T>> for BindValue {
    fn from(value: Option<T>) -> Self {
        BindValue::Literal(RowValues::from(value))
    }
}

impl<T: Into<RowValues>> From<Vec<T>> for BindValue {
    fn from(values: Vec<T>) -> Self {
        BindValue::Literal(RowValues::from(values))
    }
}

impl<T: Into<RowValues>, const N: usize> From<[T; N]> for BindValue {
    fn from(values: [T; N]) -> Self {
        BindValue::Literal(RowValues::from(values))
    }
}

/// One row of named bind values. Key order is preserved; `UPDATE` relies on it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindRow {
    entries: Vec<(String, RowValues)>,
}

impl BindRow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<RowValues>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a value. A replaced key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<RowValues>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&RowValues> {
        self.entries
            .iter()
            .find_map(|(k, v)| (k == key).then_some(v))
    }

    pub(crate) fn get_mut(&mut self, key: &str) -> Option<&mut RowValues> {
        self.entries
            .iter_mut()
            .find_map(|(k, v)| (k == key).then_some(v))
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RowValues)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<RowValues>> FromIterator<(K, V)> for BindRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = BindRow::new();
        for (key, value) in iter {
            row.insert(key, value);
        }
        row
    }
}

impl IntoIterator for BindRow {
    type Item = (String, RowValues);
    type IntoIter = std::vec::IntoIter<(String, RowValues)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Per-call named values that apply to every row of a statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtraBinds {
    entries: Vec<(String, BindValue)>,
}

impl ExtraBinds {
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<BindValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Split into raw fragments and literal values, each keeping call order.
    #[must_use]
    pub fn split(self) -> (Vec<(String, String)>, BindRow) {
        let mut raw = Vec::new();
        let mut literal = BindRow::new();
        for (key, value) in self.entries {
            match value {
                BindValue::Raw(expression) => raw.push((key, expression)),
                BindValue::Literal(value) => literal.insert(key, value),
            }
        }
        (raw, literal)
    }
}

/// Build a [`BindRow`] from `key => value` pairs.
///
/// ```rust
/// use sql_toolkit::bind_row;
///
/// let row = bind_row! { "id" => 1_i64, "name" => "alice" };
/// assert_eq!(row.keys().collect::<Vec<_>>(), vec!["id", "name"]);
/// ```
#[macro_export]
macro_rules! bind_row {
    () => {
        $crate::params::BindRow::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {
        $crate::params::BindRow::new()$(.with($key, $value))+
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replacing_a_key_keeps_its_position() {
        let mut row = BindRow::new().with("id", 1_i64).with("name", "a");
        row.insert("id", 2_i64);
        assert_eq!(row.keys().collect::<Vec<_>>(), vec!["id", "name"]);
        assert_eq!(row.get("id"), Some(&RowValues::Int(2)));
    }

    #[test]
    fn extra_binds_split_by_kind() {
        let mut extras = ExtraBinds::default();
        extras.push("created", BindValue::raw("NOW()"));
        extras.push("status", ":active");
        let (raw, literal) = extras.split();
        assert_eq!(raw, vec![("created".to_string(), "NOW()".to_string())]);
        assert_eq!(literal.get("status"), Some(&RowValues::Text(":active".into())));
    }
}
