//! Bootstrap helpers for MAYA.
//!
//! Resolves the `~/.maya` home directory and loads `~/.maya/.env` so that
//! settings kept there are visible to [`crate::config`] as env vars.

use std::path::{Path, PathBuf};

/// MAYA home directory: `~/.maya`.
pub fn maya_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".maya")
}

/// Path to the MAYA-specific `.env` file: `~/.maya/.env`.
pub fn maya_env_path() -> PathBuf {
    maya_home().join(".env")
}

/// Default session record path: `~/.maya/wallet_connect_prefs.json`.
pub fn default_session_path() -> PathBuf {
    maya_home().join(format!("{}.json", crate::session::SESSION_NAMESPACE))
}

/// Load env vars from `~/.maya/.env` (in addition to the standard `.env`).
///
/// Call this **after** `dotenvy::dotenv()` so that the standard `./.env`
/// takes priority. dotenvy never overwrites existing env vars, so the
/// effective priority is:
///
///   explicit env vars > `./.env` > `~/.maya/.env`
pub fn load_maya_env() {
    load_env_file(&maya_env_path());
}

fn load_env_file(path: &Path) {
    if !path.exists() {
        return;
    }
    match dotenvy::from_path(path) {
        Ok(()) => tracing::debug!("Loaded env file {}", path.display()),
        Err(e) => tracing::warn!("Failed to load {}: {}", path.display(), e),
    }
}
