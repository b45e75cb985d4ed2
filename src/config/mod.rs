//! Configuration for MAYA.
//!
//! Settings are loaded with priority: env var > TOML file > default.
//! Env vars may also come from `./.env` or `~/.maya/.env` (loaded via
//! dotenvy early in startup).

pub(crate) mod helpers;

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::settings::Settings;

/// Main configuration for the companion.
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub polling: PollingConfig,
    pub wallet: WalletConfig,
    pub gate: GateConfig,
}

/// MAYA core HTTP client.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl ApiConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let base_url = helpers::optional_env("MAYA_API_BASE_URL")?
            .unwrap_or_else(|| settings.api.base_url.clone());
        let parsed = url::Url::parse(&base_url).map_err(|e| ConfigError::InvalidValue {
            key: "MAYA_API_BASE_URL".to_string(),
            message: format!("'{base_url}' is not a valid URL: {e}"),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidValue {
                key: "MAYA_API_BASE_URL".to_string(),
                message: format!("expected an http(s) URL, got '{base_url}'"),
            });
        }

        let timeout_secs = helpers::require_positive(
            "MAYA_HTTP_TIMEOUT_SECS",
            helpers::parse_env_or(
                "MAYA_HTTP_TIMEOUT_SECS",
                settings.api.timeout_secs,
                "a positive integer",
            )?,
        )?;

        Ok(Self {
            base_url,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// Agent log polling.
#[derive(Debug, Clone)]
pub struct PollingConfig {
    pub interval: Duration,
    pub display_limit: usize,
}

impl PollingConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let interval_secs = helpers::require_positive(
            "MAYA_LOG_POLL_INTERVAL_SECS",
            helpers::parse_env_or(
                "MAYA_LOG_POLL_INTERVAL_SECS",
                settings.polling.interval_secs,
                "a positive integer",
            )?,
        )?;

        let display_limit = helpers::parse_env_or(
            "MAYA_LOG_DISPLAY_LIMIT",
            settings.polling.display_limit,
            "a non-negative integer",
        )?;

        Ok(Self {
            interval: Duration::from_secs(interval_secs),
            display_limit,
        })
    }
}

/// Wallet session and demo signer.
#[derive(Debug, Clone)]
pub struct WalletConfig {
    pub session_path: PathBuf,
    pub approval_delay: Duration,
}

impl WalletConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let session_path = helpers::optional_env("MAYA_SESSION_PATH")?
            .or_else(|| settings.wallet.session_path.clone())
            .map(|p| expand_home(&p))
            .unwrap_or_else(crate::bootstrap::default_session_path);

        let approval_delay_ms = helpers::parse_env_or(
            "MAYA_WALLET_APPROVAL_DELAY_MS",
            settings.wallet.approval_delay_ms,
            "a non-negative integer",
        )?;

        Ok(Self {
            session_path,
            approval_delay: Duration::from_millis(approval_delay_ms),
        })
    }
}

/// Decision gate.
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub agent_id: String,
}

impl GateConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let agent_id = helpers::optional_env("MAYA_DECISION_AGENT_ID")?
            .unwrap_or_else(|| settings.gate.agent_id.clone());
        if agent_id.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "MAYA_DECISION_AGENT_ID".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(Self { agent_id })
    }
}

impl Config {
    /// Load configuration from env vars and the default TOML file.
    ///
    /// Loads both `./.env` (standard, higher priority) and `~/.maya/.env`
    /// (lower priority) via dotenvy, which never overwrites existing vars.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with_toml(None)
    }

    /// Load from env with an optional TOML config file overlay.
    pub fn from_env_with_toml(toml_path: Option<&Path>) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        crate::bootstrap::load_maya_env();
        let settings = Self::load_settings(toml_path)?;
        Self::build(&settings)
    }

    /// Load the TOML settings file.
    ///
    /// If `explicit_path` is `Some`, loads from that path (errors are fatal).
    /// If `None`, tries the default path `~/.maya/config.toml` (missing
    /// file is silently ignored).
    pub fn load_settings(explicit_path: Option<&Path>) -> Result<Settings, ConfigError> {
        let path = explicit_path
            .map(PathBuf::from)
            .unwrap_or_else(Settings::default_toml_path);

        match Settings::load_toml(&path) {
            Ok(Some(settings)) => {
                tracing::debug!("Loaded TOML config from {}", path.display());
                Ok(settings)
            }
            Ok(None) => {
                if explicit_path.is_some() {
                    return Err(ConfigError::ParseError(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                Ok(Settings::default())
            }
            Err(e) => {
                if explicit_path.is_some() {
                    return Err(ConfigError::ParseError(format!(
                        "Failed to load config file {}: {}",
                        path.display(),
                        e
                    )));
                }
                tracing::warn!("Failed to load default config file: {}", e);
                Ok(Settings::default())
            }
        }
    }

    /// Build config from settings, applying env overrides.
    pub fn build(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            api: ApiConfig::resolve(settings)?,
            polling: PollingConfig::resolve(settings)?,
            wallet: WalletConfig::resolve(settings)?,
            gate: GateConfig::resolve(settings)?,
        })
    }
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(rest),
        None => PathBuf::from(path),
    }
}
