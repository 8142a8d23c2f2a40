//! Local key/value persistence.
//!
//! Every domain collection is stored as one JSON blob under its domain key,
//! next to a handful of singleton keys. Reads never fail: a missing or corrupt
//! value yields the caller's default.

mod memory;
mod migrations;
mod sqlite;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

/// Singleton keys stored beside the domain keys.
pub mod keys {
    pub const THEME: &str = "theme";
    pub const CURRENCY: &str = "currency";
    pub const SESSION: &str = "session";
    pub const CALENDAR_ACCESS_TOKEN: &str = "calendarAccessToken";
    pub const CLIENT_ID: &str = "clientId";
}

/// Raw synchronous key/value storage.
pub trait KeyValueBackend: Send + Sync {
    /// Read the raw value stored under `key`
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete `key`; deleting a missing key is not an error
    fn remove(&self, key: &str) -> Result<()>;
}

/// Typed JSON access over a [`KeyValueBackend`].
#[derive(Clone)]
pub struct LocalStore {
    backend: Arc<dyn KeyValueBackend>,
}

impl LocalStore {
    pub fn new(backend: impl KeyValueBackend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// Ephemeral store, primarily for tests.
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::default())
    }

    /// Load and decode `key`, returning `default` when absent or unreadable.
    pub fn load<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let raw = match self.backend.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return default,
            Err(error) => {
                tracing::warn!("Failed to read local key {}: {}", key, error);
                return default;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!("Discarding unreadable local value for {}: {}", key, error);
                default
            }
        }
    }

    /// Encode and store `value` under `key`.
    pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.backend.set(key, &raw)
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.backend.remove(key)
    }

    /// Stable identifier for this installation, created on first use.
    pub fn client_id(&self) -> String {
        if let Some(existing) = self.load::<Option<String>>(keys::CLIENT_ID, None) {
            return existing;
        }

        let generated = crate::util::new_record_id();
        if let Err(error) = self.save(keys::CLIENT_ID, &generated) {
            tracing::warn!("Failed to persist client id: {}", error);
        }
        generated
    }
}
