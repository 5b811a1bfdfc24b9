//! Local (guest-mode) favorites backend.
//!
//! The whole collection persists as one serialized JSON array under a fixed
//! well-known key in a string-valued key-value store, the way a browser
//! would keep it in local storage.

use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{FavoritesError, StorageError};

use super::record::{AddOutcome, FavoriteRecord, MovieId};

/// Fixed key the favorites array lives under.
pub const FAVORITES_KEY: &str = "tmdb_favorites";

/// Minimal string-valued persistent store: the capability set of browser
/// local storage. Quota exhaustion stays distinguishable from other
/// backend failures.
pub trait KeyValueStore: Send + Sync {
  fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
  fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
  fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// In-memory key-value store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryKeyValue {
  entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValue {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StorageError> {
    self
      .entries
      .lock()
      .map_err(|e| StorageError::Backend(format!("Lock poisoned: {}", e)))
  }
}

impl KeyValueStore for MemoryKeyValue {
  fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
    Ok(self.lock()?.get(key).cloned())
  }

  fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
    self.lock()?.insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn delete(&self, key: &str) -> Result<(), StorageError> {
    self.lock()?.remove(key);
    Ok(())
  }
}

/// SQLite-backed key-value store.
pub struct SqliteKeyValue {
  conn: Mutex<Connection>,
}

/// Schema for the key-value table.
const KV_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl SqliteKeyValue {
  pub fn open(path: &Path) -> Result<Self, StorageError> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).map_err(|e| StorageError::Backend(e.to_string()))?;
    }

    let conn = Connection::open(path).map_err(|e| StorageError::Backend(e.to_string()))?;
    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;
    Ok(store)
  }

  pub fn open_default() -> Result<Self, StorageError> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| StorageError::Backend("could not determine data directory".to_string()))?;
    Self::open(&data_dir.join("marquee").join("local.db"))
  }

  fn run_migrations(&self) -> Result<(), StorageError> {
    let conn = self.lock()?;
    conn.execute_batch(KV_SCHEMA).map_err(map_sqlite)?;
    Ok(())
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StorageError> {
    self
      .conn
      .lock()
      .map_err(|e| StorageError::Backend(format!("Lock poisoned: {}", e)))
  }
}

fn map_sqlite(e: rusqlite::Error) -> StorageError {
  if let rusqlite::Error::SqliteFailure(err, _) = &e {
    if err.code == rusqlite::ErrorCode::DiskFull {
      return StorageError::QuotaExceeded;
    }
  }
  StorageError::Backend(e.to_string())
}

impl KeyValueStore for SqliteKeyValue {
  fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
    let conn = self.lock()?;
    let mut stmt = conn
      .prepare("SELECT value FROM kv_store WHERE key = ?")
      .map_err(map_sqlite)?;
    let value: Option<String> = stmt.query_row(params![key], |row| row.get(0)).ok();
    Ok(value)
  }

  fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
    let conn = self.lock()?;
    conn
      .execute(
        "INSERT OR REPLACE INTO kv_store (key, value, updated_at)
         VALUES (?, ?, datetime('now'))",
        params![key, value],
      )
      .map_err(map_sqlite)?;
    Ok(())
  }

  fn delete(&self, key: &str) -> Result<(), StorageError> {
    let conn = self.lock()?;
    conn
      .execute("DELETE FROM kv_store WHERE key = ?", params![key])
      .map_err(map_sqlite)?;
    Ok(())
  }
}

/// Guest-mode favorites over a key-value store.
pub struct LocalFavorites<L: KeyValueStore> {
  store: Arc<L>,
}

impl<L: KeyValueStore> LocalFavorites<L> {
  pub fn new(store: Arc<L>) -> Self {
    Self { store }
  }

  /// The full collection, in insertion order. A missing key is an empty
  /// collection, not an error.
  pub fn list(&self) -> Result<Vec<FavoriteRecord>, FavoritesError> {
    match self.store.get(FAVORITES_KEY)? {
      Some(raw) => {
        serde_json::from_str(&raw).map_err(|e| FavoritesError::Serialization(e.to_string()))
      }
      None => Ok(Vec::new()),
    }
  }

  pub fn add(&self, record: FavoriteRecord) -> Result<AddOutcome, FavoritesError> {
    let mut records = self.list()?;
    if records.iter().any(|existing| existing.id == record.id) {
      return Ok(AddOutcome::AlreadyPresent);
    }
    records.push(record);
    self.save(&records)?;
    Ok(AddOutcome::Inserted)
  }

  /// Idempotent: removing an absent identity is a no-op.
  pub fn remove(&self, id: &MovieId) -> Result<(), FavoritesError> {
    let records = self.list()?;
    let remaining: Vec<FavoriteRecord> =
      records.into_iter().filter(|r| &r.id != id).collect();
    self.save(&remaining)
  }

  pub fn has(&self, id: &MovieId) -> Result<bool, FavoritesError> {
    Ok(self.list()?.iter().any(|r| &r.id == id))
  }

  pub fn clear(&self) -> Result<(), FavoritesError> {
    self.store.delete(FAVORITES_KEY)?;
    Ok(())
  }

  fn save(&self, records: &[FavoriteRecord]) -> Result<(), FavoritesError> {
    let raw =
      serde_json::to_string(records).map_err(|e| FavoritesError::Serialization(e.to_string()))?;
    self.store.set(FAVORITES_KEY, &raw)?;
    Ok(())
  }
}

impl<L: KeyValueStore> Clone for LocalFavorites<L> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
    }
  }
}
