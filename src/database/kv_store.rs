//! Durable key-value storage used by the tab registry and the session store.
//!
//! Values are JSON documents addressed by `(namespace, key)`. Writes to a single
//! key are atomic; concurrent writers degrade to last-write-wins.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{params, OptionalExtension};
use serde_json::Value;

use super::connection::Database;
use crate::types::errors::StoreError;

/// Contract of the durable store.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, StoreError>;
    fn set(&self, namespace: &str, key: &str, value: &Value) -> Result<(), StoreError>;
}

/// SQLite-backed store over the `kv_store` table.
pub struct SqliteStore {
    db: Mutex<Database>,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, rusqlite::Error> {
        Ok(Self::new(Database::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    fn db(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, StoreError> {
        let db = self.db();
        let raw: Option<String> = db
            .connection()
            .query_row(
                "SELECT value FROM kv_store WHERE namespace = ?1 AND key = ?2",
                params![namespace, key],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    fn set(&self, namespace: &str, key: &str, value: &Value) -> Result<(), StoreError> {
        let text = serde_json::to_string(value)?;
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64;

        self.db().connection().execute(
            "INSERT INTO kv_store (namespace, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(namespace, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![namespace, key, text, now],
        )?;
        Ok(())
    }
}

/// Ephemeral store kept in process memory.
///
/// Counts writes per key so callers can observe write coalescing.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<(String, String), Value>>,
    writes: Mutex<HashMap<(String, String), usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set` calls that targeted `(namespace, key)`.
    pub fn write_count(&self, namespace: &str, key: &str) -> usize {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(namespace.to_string(), key.to_string()))
            .copied()
            .unwrap_or(0)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(&(namespace.to_string(), key.to_string())).cloned())
    }

    fn set(&self, namespace: &str, key: &str, value: &Value) -> Result<(), StoreError> {
        let id = (namespace.to_string(), key.to_string());
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), value.clone());
        *self
            .writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id)
            .or_insert(0) += 1;
        Ok(())
    }
}
