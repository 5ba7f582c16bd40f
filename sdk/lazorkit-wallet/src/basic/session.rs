use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::constants::SESSION_SCHEMA_VERSION;
use crate::core::storage::KeyValueStore;
use crate::error::{Result, WalletError};
use crate::types::WalletSession;

/// Versioned persistence of the single wallet session record.
///
/// A record that fails to parse, or carries another `schemaVersion`, reads
/// as absent. Only a failing backend is reported as an error.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn KeyValueStore>,
    key: String,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn load(&self) -> Result<Option<WalletSession>> {
        let Some(raw) = self.backend.get(&self.key)? else {
            return Ok(None);
        };

        let value: serde_json::Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %self.key, error = %e, "discarding unreadable session record");
                return Ok(None);
            },
        };

        let version = value.get("schemaVersion").and_then(|v| v.as_u64());
        if version != Some(SESSION_SCHEMA_VERSION as u64) {
            warn!(
                key = %self.key,
                found = ?version,
                expected = SESSION_SCHEMA_VERSION,
                "discarding session record with unsupported schema"
            );
            return Ok(None);
        }

        match serde_json::from_value::<WalletSession>(value) {
            Ok(session) => {
                debug!(wallet = %session.wallet_address(), "loaded session");
                Ok(Some(session))
            },
            Err(e) => {
                warn!(key = %self.key, error = %e, "discarding malformed session record");
                Ok(None)
            },
        }
    }

    /// Replace the stored record.
    pub fn save(&self, session: &WalletSession) -> Result<()> {
        let raw = serde_json::to_string(session)
            .map_err(|e| WalletError::Storage(format!("encode session: {}", e)))?;
        self.backend.set(&self.key, &raw)?;
        Ok(())
    }

    /// Persist `session` with `last_used_at` moved to now, returning the updated copy.
    pub fn touch(&self, session: &WalletSession) -> Result<WalletSession> {
        let touched = session.touched(Utc::now());
        self.save(&touched)?;
        Ok(touched)
    }

    /// Remove the record. No-op when nothing is stored.
    pub fn clear(&self) -> Result<()> {
        self.backend.remove(&self.key)?;
        Ok(())
    }
}
