//! Usage: Durable key/value client storage (SQLite-backed or in-memory).

use crate::infra::db::{self, Db};
use crate::shared::error::AppResult;
use crate::shared::mutex_ext::MutexExt;
use crate::shared::time::now_unix_seconds;
use rusqlite::OptionalExtension;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

/// Storage backend holding serialized values under string keys.
pub trait DurableStorage: Send + Sync {
    fn get(&self, key: &str) -> AppResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> AppResult<()>;

    /// Removing a missing key succeeds.
    fn remove(&self, key: &str) -> AppResult<()>;

    fn clear(&self) -> AppResult<()>;
}

impl std::fmt::Debug for dyn DurableStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DurableStorage")
    }
}

#[derive(Debug, Clone)]
pub struct SqliteStorage {
    db: Db,
}

impl SqliteStorage {
    pub fn open(path: &Path) -> AppResult<Self> {
        let db = db::init(path)?;
        tracing::info!(path = %path.display(), "durable storage opened");
        Ok(Self { db })
    }

    #[cfg(test)]
    fn in_memory() -> AppResult<Self> {
        Ok(Self {
            db: db::init_in_memory()?,
        })
    }
}

impl DurableStorage for SqliteStorage {
    fn get(&self, key: &str) -> AppResult<Option<String>> {
        let conn = self.db.open_connection()?;
        let value = conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> AppResult<()> {
        let conn = self.db.open_connection()?;
        conn.execute(
            r#"
INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
"#,
            rusqlite::params![key, value, now_unix_seconds()],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> AppResult<()> {
        let conn = self.db.open_connection()?;
        conn.execute("DELETE FROM kv_store WHERE key = ?1", [key])?;
        Ok(())
    }

    fn clear(&self) -> AppResult<()> {
        let conn = self.db.open_connection()?;
        conn.execute("DELETE FROM kv_store", [])?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DurableStorage for MemoryStorage {
    fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.inner.lock_or_recover().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> AppResult<()> {
        self.inner
            .lock_or_recover()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> AppResult<()> {
        self.inner.lock_or_recover().remove(key);
        Ok(())
    }

    fn clear(&self) -> AppResult<()> {
        self.inner.lock_or_recover().clear();
        Ok(())
    }
}
