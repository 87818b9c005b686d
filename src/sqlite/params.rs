use rusqlite::types::Value;

use crate::error::SqlToolkitError;
use crate::types::RowValues;

/// Convert a single value to its `SQLite` storage form.
///
/// # Errors
/// Returns `SqlToolkitError::ParameterError` for sequences that were neither expanded nor
/// serialized.
pub(crate) fn row_value_to_sqlite_value(value: &RowValues) -> Result<Value, SqlToolkitError> {
    Ok(match value {
        RowValues::Int(i) => Value::Integer(*i),
        RowValues::Float(f) => Value::Real(*f),
        RowValues::Text(s) => Value::Text(s.clone()),
        RowValues::Bool(b) => Value::Integer(i64::from(*b)),
        RowValues::Timestamp(dt) => Value::Text(dt.format("%F %T%.f").to_string()),
        RowValues::Null => Value::Null,
        RowValues::JSON(jval) => Value::Text(jval.to_string()),
        RowValues::Blob(bytes) => Value::Blob(bytes.clone()),
        RowValues::List(_) => {
            return Err(SqlToolkitError::ParameterError(
                "sequence values must be expanded or stored as JSON before binding".to_string(),
            ));
        }
        RowValues::Enum { value, .. } => row_value_to_sqlite_value(value)?,
    })
}
