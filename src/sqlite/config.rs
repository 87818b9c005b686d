use std::time::Duration;

use crate::engine::EngineConfig;
use crate::error::SqlToolkitError;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Connection settings parsed from the engine's query parameters.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SqliteSettings {
    pub(crate) path: String,
    pub(crate) busy_timeout: Duration,
    /// `(name, value)` pairs applied with `PRAGMA name = value` on every new connection.
    pub(crate) pragmas: Vec<(String, String)>,
}

fn is_pragma_token(token: &str) -> bool {
    !token.is_empty()
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'))
}

/// Recognised query parameters are `busy_timeout` (milliseconds) and `pragma.<name>`.
pub(crate) fn sqlite_settings(config: &EngineConfig) -> Result<SqliteSettings, SqlToolkitError> {
    let mut settings = SqliteSettings {
        path: config.database.clone(),
        busy_timeout: DEFAULT_BUSY_TIMEOUT,
        pragmas: Vec::new(),
    };
    for (key, value) in &config.query {
        if key == "busy_timeout" {
            let millis = value.parse::<u64>().map_err(|_| {
                SqlToolkitError::ConfigError(format!(
                    "busy_timeout must be whole milliseconds, got `{value}`"
                ))
            })?;
            settings.busy_timeout = Duration::from_millis(millis);
        } else if let Some(name) = key.strip_prefix("pragma.") {
            if !is_pragma_token(name) || name.contains('.') || !is_pragma_token(value) {
                return Err(SqlToolkitError::ConfigError(format!(
                    "invalid sqlite pragma `{name} = {value}`"
                )));
            }
            settings.pragmas.push((name.to_string(), value.clone()));
        } else {
            return Err(SqlToolkitError::ConfigError(format!(
                "unsupported sqlite query parameter `{key}`"
            )));
        }
    }
    Ok(settings)
}
