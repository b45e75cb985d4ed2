use std::str::FromStr;

use crate::error::ConfigError;

/// Read an env var, treating unset and empty the same.
pub(crate) fn optional_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(val) if val.trim().is_empty() => Ok(None),
        Ok(val) => Ok(Some(val.trim().to_string())),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("failed to read: {e}"),
        }),
    }
}

/// Parse an optional env var, falling back to `fallback` when unset.
pub(crate) fn parse_env_or<T>(key: &str, fallback: T, expected: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    optional_env(key)?
        .map(|s| s.parse())
        .transpose()
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("must be {expected}: {e}"),
        })
        .map(|v| v.unwrap_or(fallback))
}

pub(crate) fn require_positive(key: &str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "must be > 0".to_string(),
        });
    }
    Ok(value)
}
