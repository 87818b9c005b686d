use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Values that can be bound as statement parameters or read back from a result row.
///
/// The same enum is used by every backend so callers never touch driver types:
/// ```rust
/// use sql_toolkit::prelude::*;
///
/// let params = vec![
///     RowValues::Int(1),
///     RowValues::Text("alice".into()),
///     RowValues::from(vec![1_i64, 2, 3]),
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
    /// A sequence. Expanded into `(v1, v2, ..)` for `IN :name` placeholders and stored as
    /// JSON text everywhere else.
    List(Vec<RowValues>),
    /// A labelled value such as an application enum member; binds as its inner value.
    Enum {
        label: String,
        value: Box<RowValues>,
    },
}

impl RowValues {
    /// Build a labelled value that binds as `value`.
    #[must_use]
    pub fn tagged(label: impl Into<String>, value: impl Into<RowValues>) -> Self {
        Self::Enum {
            label: label.into(),
            value: Box::new(value.into()),
        }
    }

    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            RowValues::Bool(value) => Some(*value),
            RowValues::Int(1) => Some(true),
            RowValues::Int(0) => Some(false),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        if let RowValues::Timestamp(value) = self {
            return Some(*value);
        } else if let Some(s) = self.as_text() {
            for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
                if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
                    return Some(dt);
                }
            }
        }
        None
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            RowValues::Float(value) => Some(*value),
            #[allow(clippy::cast_precision_loss)]
            RowValues::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let RowValues::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[RowValues]> {
        if let RowValues::List(items) = self {
            Some(items)
        } else {
            None
        }
    }

    /// Strip any number of `Enum` wrappers.
    #[must_use]
    pub fn into_inner(self) -> RowValues {
        let mut current = self;
        while let RowValues::Enum { value, .. } = current {
            current = *value;
        }
        current
    }

    /// True for lists and for JSON arrays or objects.
    #[must_use]
    pub fn is_composite(&self) -> bool {
        match self {
            RowValues::List(_) => true,
            RowValues::JSON(value) => value.is_array() || value.is_object(),
            _ => false,
        }
    }

    /// Map one element of a JSON array onto the closest scalar variant. Nested arrays and
    /// objects stay JSON.
    #[must_use]
    pub fn from_json_element(value: JsonValue) -> RowValues {
        match value {
            JsonValue::Null => RowValues::Null,
            JsonValue::Bool(b) => RowValues::Bool(b),
            JsonValue::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => RowValues::Int(i),
                (None, Some(f)) => RowValues::Float(f),
                (None, None) => RowValues::Text(n.to_string()),
            },
            JsonValue::String(s) => RowValues::Text(s),
            composite => RowValues::JSON(composite),
        }
    }

    /// Convert into a `serde_json::Value`.
    #[must_use]
    pub fn to_json_value(&self) -> JsonValue {
        match self {
            RowValues::Int(i) => JsonValue::from(*i),
            RowValues::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(JsonValue::Null, JsonValue::Number),
            RowValues::Text(s) => JsonValue::String(s.clone()),
            RowValues::Bool(b) => JsonValue::Bool(*b),
            RowValues::Timestamp(dt) => {
                JsonValue::String(dt.format("%Y-%m-%d %H:%M:%S%.f").to_string())
            }
            RowValues::Null => JsonValue::Null,
            RowValues::JSON(value) => value.clone(),
            RowValues::Blob(bytes) => {
                JsonValue::Array(bytes.iter().map(|b| JsonValue::from(*b)).collect())
            }
            RowValues::List(items) => {
                JsonValue::Array(items.iter().map(RowValues::to_json_value).collect())
            }
            RowValues::Enum { value, .. } => value.to_json_value(),
        }
    }

    /// Canonical JSON text: compact, with object keys in sorted order.
    #[must_use]
    pub fn to_json_text(&self) -> String {
        self.to_json_value().to_string()
    }
}

macro_rules! row_value_from {
    ($($source:ty => $variant:ident via $conv:expr),+ $(,)?) => {
        $(
            impl From<$source> for RowValues {
                fn from(value: $source) -> Self {
                    RowValues::$variant($conv(value))
                }
            }
        )+
    };
}

row_value_from! {
    i64 => Int via std::convert::identity,
    i32 => Int via i64::from,
    i16 => Int via i64::from,
    u32 => Int via i64::from,
    f64 => Float via std::convert::identity,
    f32 => Float via f64::from,
    bool => Bool via std::convert::identity,
    String => Text via std::convert::identity,
    NaiveDateTime => Timestamp via std::convert::identity,
    JsonValue => JSON via std::convert::identity,
}

impl From<&str> for RowValues {
    fn from(value: &str) -> Self {
        RowValues::Text(value.to_string())
    }
}

impl From<&String> for RowValues {
    fn from(value: &String) -> Self {
        RowValues::Text(value.clone())
    }
}

impl<T: Into<RowValues>> From<Option<T>> for RowValues {
    fn from(value: Option<T>) -> Self {
        value.map_or(RowValues::Null, Into::into)
    }
}

impl<T: Into<RowValues>> From<Vec<T>> for RowValues {
    fn from(values: Vec<T>) -> Self {
        RowValues::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<RowValues>, const N: usize> From<[T; N]> for RowValues {
    fn from(values: [T; N]) -> Self {
        RowValues::List(values.into_iter().map(Into::into).collect())
    }
}

/// The database backends this crate can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    /// `PostgreSQL` database
    #[cfg(feature = "postgres")]
    Postgres,
    /// `SQLite` database
    #[cfg(feature = "sqlite")]
    Sqlite,
}

impl DatabaseType {
    #[must_use]
    pub fn placeholder_style(self) -> PlaceholderStyle {
        match self {
            #[cfg(feature = "postgres")]
            DatabaseType::Postgres => PlaceholderStyle::Postgres,
            #[cfg(feature = "sqlite")]
            DatabaseType::Sqlite => PlaceholderStyle::Sqlite,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            #[cfg(feature = "postgres")]
            DatabaseType::Postgres => "postgresql",
            #[cfg(feature = "sqlite")]
            DatabaseType::Sqlite => "sqlite",
        }
    }
}

/// Positional placeholder flavour emitted when a named statement is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// PostgreSQL-style placeholders like `$1`.
    Postgres,
    /// SQLite-style placeholders like `?1`.
    Sqlite,
}

impl PlaceholderStyle {
    pub(crate) fn push(self, out: &mut String, position: usize) {
        out.push(match self {
            PlaceholderStyle::Postgres => '$',
            PlaceholderStyle::Sqlite => '?',
        });
        out.push_str(&position.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_values_unwrap_to_their_scalar() {
        let nested = RowValues::tagged("outer", RowValues::tagged("inner", 7_i64));
        assert_eq!(nested.into_inner(), RowValues::Int(7));
    }

    #[test]
    fn json_text_is_canonical() {
        let value = RowValues::JSON(serde_json::json!({"b": 1, "a": [1, 2]}));
        assert_eq!(value.to_json_text(), r#"{"a":[1,2],"b":1}"#);
        let list = RowValues::from(vec!["x", "y"]);
        assert_eq!(list.to_json_text(), r#"["x","y"]"#);
    }

    #[test]
    fn options_map_to_null() {
        assert_eq!(RowValues::from(None::<i64>), RowValues::Null);
        assert_eq!(RowValues::from(Some("a")), RowValues::Text("a".into()));
    }

    #[test]
    fn composite_detection() {
        assert!(RowValues::from([1_i64, 2]).is_composite());
        assert!(RowValues::JSON(serde_json::json!({})).is_composite());
        assert!(!RowValues::JSON(serde_json::json!(3)).is_composite());
        assert!(!RowValues::Text("[]".into()).is_composite());
    }
}
