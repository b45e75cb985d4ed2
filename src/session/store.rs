//! Durable storage for the wallet session record.
//!
//! The record is a flat namespaced map (`connected`, `address`, `chainId`,
//! `sessionId`) kept in a JSON file, by default
//! `~/.maya/wallet_connect_prefs.json`. Writes are synchronous so the
//! record on disk always matches the last published session.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::model::WalletSession;

/// Namespace the session fields live under.
pub const SESSION_NAMESPACE: &str = "wallet_connect_prefs";

/// On-disk mirror of a connected [`WalletSession`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSessionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl PersistedSessionRecord {
    pub fn from_session(session: &WalletSession) -> Self {
        Self {
            connected: Some(session.is_connected()),
            address: session.address().map(String::from),
            chain_id: session.chain_id().map(String::from),
            session_id: session.session_id().map(String::from),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Rebuild the session. All-or-nothing: `connected` must be true and
    /// every identifier present, otherwise nothing is restorable.
    pub fn restore(&self) -> Option<WalletSession> {
        if self.connected != Some(true) {
            return None;
        }
        match (&self.address, &self.chain_id, &self.session_id) {
            (Some(address), Some(chain_id), Some(session_id)) => Some(WalletSession::connected(
                address.clone(),
                chain_id.clone(),
                session_id.clone(),
            )),
            _ => None,
        }
    }
}

/// Persistent key/value store for the session record.
///
/// Only the session manager writes to it.
pub trait SessionStore: Send + Sync {
    /// Read the record. A store with nothing saved returns an empty record.
    fn load(&self) -> Result<PersistedSessionRecord, StoreError>;

    /// Replace the record.
    fn save(&self, record: &PersistedSessionRecord) -> Result<(), StoreError>;

    /// Remove every field of the record.
    fn clear(&self) -> Result<(), StoreError>;
}

/// JSON file store. Other namespaces in the same file are left alone.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
}

type Namespaces = BTreeMap<String, serde_json::Value>;

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn read_namespaces(&self) -> Result<Namespaces, StoreError> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Namespaces::new()),
            Err(e) => return Err(self.io_error(e)),
        };
        if data.trim().is_empty() {
            return Ok(Namespaces::new());
        }
        serde_json::from_str(&data).map_err(|e| {
            StoreError::Serialization(format!(
                "invalid session file {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    fn write_namespaces(&self, namespaces: &Namespaces) -> Result<(), StoreError> {
        if namespaces.is_empty() {
            return match std::fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(self.io_error(e)),
            };
        }

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let json = serde_json::to_string_pretty(namespaces)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        // Write-then-rename.
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json).map_err(|e| self.io_error(e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&tmp_path, perms).map_err(|e| self.io_error(e))?;
        }

        std::fs::rename(&tmp_path, &self.path).map_err(|e| self.io_error(e))
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<PersistedSessionRecord, StoreError> {
        let mut namespaces = self.read_namespaces()?;
        match namespaces.remove(SESSION_NAMESPACE) {
            Some(value) => serde_json::from_value(value).map_err(|e| {
                StoreError::Serialization(format!("invalid '{}' record: {}", SESSION_NAMESPACE, e))
            }),
            None => Ok(PersistedSessionRecord::default()),
        }
    }

    fn save(&self, record: &PersistedSessionRecord) -> Result<(), StoreError> {
        let mut namespaces = self.read_namespaces().unwrap_or_else(|e| {
            tracing::warn!("Discarding unreadable session file: {}", e);
            Namespaces::new()
        });
        let value =
            serde_json::to_value(record).map_err(|e| StoreError::Serialization(e.to_string()))?;
        namespaces.insert(SESSION_NAMESPACE.to_string(), value);
        self.write_namespaces(&namespaces)?;
        tracing::debug!("Session record saved to {}", self.path.display());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut namespaces = self.read_namespaces().unwrap_or_default();
        namespaces.remove(SESSION_NAMESPACE);
        self.write_namespaces(&namespaces)?;
        tracing::debug!("Session record cleared from {}", self.path.display());
        Ok(())
    }
}

/// Volatile store for tests and one-shot CLI runs.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    record: Mutex<PersistedSessionRecord>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: PersistedSessionRecord) -> Self {
        Self {
            record: Mutex::new(record),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PersistedSessionRecord> {
        self.record
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<PersistedSessionRecord, StoreError> {
        Ok(self.lock().clone())
    }

    fn save(&self, record: &PersistedSessionRecord) -> Result<(), StoreError> {
        *self.lock() = record.clone();
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.lock() = PersistedSessionRecord::default();
        Ok(())
    }
}
