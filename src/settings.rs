//! User settings persisted in `~/.maya/config.toml`.
//!
//! Every field is optional in the file; anything left out falls back to the
//! built-in default. Environment variables override these values (see
//! [`crate::config`]).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default MAYA core address.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
/// Agent the decision gate answers for.
pub const DEFAULT_DECISION_AGENT_ID: &str = "A-01";

/// All persisted settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub polling: PollingSettings,

    #[serde(default)]
    pub wallet: WalletSettings,

    #[serde(default)]
    pub gate: GateSettings,
}

/// MAYA core connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_http_timeout_secs() -> u64 {
    30
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            timeout_secs: default_http_timeout_secs(),
        }
    }
}

/// Agent log polling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingSettings {
    #[serde(default = "default_poll_interval_secs")]
    pub interval_secs: u64,

    /// Number of log lines shown by `logs` and `watch`.
    #[serde(default = "default_display_limit")]
    pub display_limit: usize,
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_display_limit() -> usize {
    10
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval_secs(),
            display_limit: default_display_limit(),
        }
    }
}

/// Wallet session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSettings {
    /// Session record location. Defaults to `~/.maya/wallet_connect_prefs.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_path: Option<String>,

    /// How long the demo wallet waits before approving a pairing.
    #[serde(default = "default_approval_delay_ms")]
    pub approval_delay_ms: u64,
}

fn default_approval_delay_ms() -> u64 {
    2000
}

impl Default for WalletSettings {
    fn default() -> Self {
        Self {
            session_path: None,
            approval_delay_ms: default_approval_delay_ms(),
        }
    }
}

/// Decision gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateSettings {
    #[serde(default = "default_decision_agent_id")]
    pub agent_id: String,
}

fn default_decision_agent_id() -> String {
    DEFAULT_DECISION_AGENT_ID.to_string()
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            agent_id: default_decision_agent_id(),
        }
    }
}

impl Settings {
    /// Default TOML config file path (~/.maya/config.toml).
    pub fn default_toml_path() -> PathBuf {
        crate::bootstrap::maya_home().join("config.toml")
    }

    /// Load settings from a TOML file.
    ///
    /// Returns `None` if the file doesn't exist. Returns an error only
    /// if the file exists but can't be parsed.
    pub fn load_toml(path: &Path) -> Result<Option<Self>, String> {
        let data = match std::fs::read_to_string(path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(format!("failed to read {}: {}", path.display(), e)),
        };

        let settings: Self = toml::from_str(&data)
            .map_err(|e| format!("invalid TOML in {}: {}", path.display(), e))?;
        Ok(Some(settings))
    }

    /// Write a commented TOML config file with current settings.
    pub fn save_toml(&self, path: &Path) -> Result<(), String> {
        let raw = toml::to_string_pretty(self)
            .map_err(|e| format!("failed to serialize settings: {}", e))?;

        let content = format!(
            "# MAYA companion configuration file.\n\
             #\n\
             # Priority: env var > this file > defaults.\n\
             # Run `maya config init --force` to regenerate this file.\n\
             \n\
             {raw}"
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("failed to create {}: {}", parent.display(), e))?;
        }

        std::fs::write(path, content)
            .map_err(|e| format!("failed to write {}: {}", path.display(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn default_toml_path_under_maya_home() {
        let path = Settings::default_toml_path();
        assert!(path.to_string_lossy().contains(".maya"));
        assert!(path.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [api]
            base_url = "http://192.168.0.101:8000"

            [polling]
            interval_secs = 3
            "#,
        )
        .unwrap();

        assert_eq!(settings.api.base_url, "http://192.168.0.101:8000");
        assert_eq!(settings.api.timeout_secs, 30);
        assert_eq!(settings.polling.interval_secs, 3);
        assert_eq!(settings.polling.display_limit, 10);
        assert_eq!(settings.gate, GateSettings::default());
    }

    #[test]
    fn toml_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");

        let mut settings = Settings::default();
        settings.wallet.session_path = Some("/tmp/prefs.json".to_string());
        settings.gate.agent_id = "A-07".to_string();
        settings.save_toml(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# MAYA companion configuration file."));

        let loaded = Settings::load_toml(&path).unwrap().unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn missing_file_is_none_and_bad_file_is_error() {
        let dir = tempdir().unwrap();
        assert_eq!(
            Settings::load_toml(&dir.path().join("absent.toml")).unwrap(),
            None
        );

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[api\nbase_url = 1").unwrap();
        let err = Settings::load_toml(&bad).unwrap_err();
        assert!(err.contains("invalid TOML"));
    }
}
