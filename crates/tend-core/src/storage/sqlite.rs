//! `SQLite`-backed key/value storage

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use super::{migrations, KeyValueBackend};
use crate::error::Result;
use crate::util::lock;

/// Durable backend storing one row per key.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Open (or create) the database at `path` and run migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::configure(&conn);
        migrations::run(&conn)?;
        tracing::debug!("Opened local store at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn configure(conn: &Connection) {
        // Pragmas are best-effort; some filesystems refuse WAL.
        if let Err(error) = conn.pragma_update(None, "journal_mode", "WAL") {
            tracing::debug!("WAL journal mode unavailable: {}", error);
        }
        conn.pragma_update(None, "synchronous", "NORMAL").ok();
    }
}

impl KeyValueBackend for SqliteBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = lock(&self.conn);
        let value = conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        lock(&self.conn).execute(
            "INSERT OR REPLACE INTO kv_store (key, value, updated_at) VALUES (?, ?, ?)",
            params![key, value, now],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        lock(&self.conn).execute("DELETE FROM kv_store WHERE key = ?", params![key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStore;
    use tempfile::tempdir;

    #[test]
    fn test_set_get_remove() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        assert_eq!(backend.get("theme").unwrap(), None);

        backend.set("theme", "\"dark\"").unwrap();
        backend.set("theme", "\"light\"").unwrap();
        assert_eq!(backend.get("theme").unwrap().as_deref(), Some("\"light\""));

        backend.remove("theme").unwrap();
        backend.remove("theme").unwrap();
        assert_eq!(backend.get("theme").unwrap(), None);
    }

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("tend.db");

        {
            let local = LocalStore::new(SqliteBackend::open(&path).unwrap());
            local.save("currency", "JPY").unwrap();
        }

        let local = LocalStore::new(SqliteBackend::open(&path).unwrap());
        assert_eq!(local.load("currency", String::new()), "JPY");
    }
}
