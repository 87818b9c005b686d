use std::time::Duration;

use crate::engine::EngineConfig;
use crate::error::SqlToolkitError;

/// Translate an engine config into driver connection settings.
///
/// Recognised query parameters are `application_name`, `options` and `connect_timeout`
/// (seconds); anything else is rejected so typos surface before the first connection.
pub(crate) fn pg_config(config: &EngineConfig) -> Result<tokio_postgres::Config, SqlToolkitError> {
    if config.host.is_empty() {
        return Err(SqlToolkitError::ConfigError(
            "host is required".to_string(),
        ));
    }
    if config.username.is_empty() {
        return Err(SqlToolkitError::ConfigError(
            "username is required".to_string(),
        ));
    }

    let mut pg = tokio_postgres::Config::new();
    pg.host(config.host.as_str())
        .port(config.port)
        .user(config.username.as_str())
        .dbname(config.database.as_str());
    if !config.password.is_empty() {
        pg.password(config.password.as_str());
    }

    for (key, value) in &config.query {
        match key.as_str() {
            "application_name" => {
                pg.application_name(value.as_str());
            }
            "options" => {
                pg.options(value.as_str());
            }
            "connect_timeout" => {
                let seconds = value
                    .parse::<f64>()
                    .ok()
                    .and_then(|seconds| Duration::try_from_secs_f64(seconds).ok())
                    .ok_or_else(|| {
                        SqlToolkitError::ConfigError(format!(
                            "connect_timeout must be a number of seconds, got `{value}`"
                        ))
                    })?;
                pg.connect_timeout(seconds);
            }
            other => {
                return Err(SqlToolkitError::ConfigError(format!(
                    "unsupported postgres query parameter `{other}`"
                )));
            }
        }
    }
    Ok(pg)
}
