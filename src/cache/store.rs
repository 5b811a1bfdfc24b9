//! Asset store trait plus the SQLite and in-memory implementations.

use rusqlite::{params, Connection};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::CacheError;

use super::entry::{CacheEntry, CacheKey, GenerationId};

/// Durable storage for cached assets, partitioned by generation.
///
/// Implementations only store and retrieve; which generation is "current"
/// and what is allowed into the cache is decided by [`super::AssetCache`].
pub trait AssetStore: Send + Sync {
  /// Create the partition for a generation if it does not exist. Idempotent.
  fn open_generation(&self, generation: &GenerationId) -> Result<(), CacheError>;

  /// Store or overwrite an entry under its key within the named generation.
  fn put(&self, generation: &GenerationId, entry: &CacheEntry) -> Result<(), CacheError>;

  /// Fetch the entry for a key within the named generation.
  fn get(&self, generation: &GenerationId, key: &CacheKey)
    -> Result<Option<CacheEntry>, CacheError>;

  /// All known generation identifiers.
  fn list_generations(&self) -> Result<Vec<GenerationId>, CacheError>;

  /// Purge a generation and every entry in it.
  fn delete_generation(&self, generation: &GenerationId) -> Result<(), CacheError>;

  /// The persisted current-generation marker, if any.
  fn current_generation(&self) -> Result<Option<GenerationId>, CacheError>;

  /// Persist the current-generation marker.
  fn set_current_generation(&self, generation: &GenerationId) -> Result<(), CacheError>;
}

// ============================================================================
// SQLite implementation
// ============================================================================

/// Schema for the asset cache tables.
const ASSET_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS generations (
    id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS asset_entries (
    generation TEXT NOT NULL,
    entry_key TEXT NOT NULL,
    method TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    headers BLOB NOT NULL,
    body BLOB NOT NULL,
    stored_at TEXT NOT NULL,
    PRIMARY KEY (generation, entry_key)
);

CREATE TABLE IF NOT EXISTS cache_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

const CURRENT_GENERATION_KEY: &str = "current_generation";

/// SQLite-backed asset store.
pub struct SqliteAssetStore {
  conn: Mutex<Connection>,
}

impl SqliteAssetStore {
  /// Open (creating if needed) the store at the given path.
  pub fn open(path: &Path) -> Result<Self, CacheError> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).map_err(|e| CacheError::OpenFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
      })?;
    }

    let conn = Connection::open(path).map_err(|e| CacheError::OpenFailed {
      path: path.to_path_buf(),
      reason: e.to_string(),
    })?;

    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;

    Ok(store)
  }

  /// Open the store at the default platform location.
  pub fn open_default() -> Result<Self, CacheError> {
    Self::open(&Self::default_path()?)
  }

  fn default_path() -> Result<PathBuf, CacheError> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| CacheError::OpenFailed {
        path: PathBuf::new(),
        reason: "could not determine data directory".to_string(),
      })?;

    Ok(data_dir.join("marquee").join("assets.db"))
  }

  fn run_migrations(&self) -> Result<(), CacheError> {
    let conn = self.lock()?;
    conn.execute_batch(ASSET_SCHEMA).map_err(map_sqlite)?;
    Ok(())
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, CacheError> {
    self
      .conn
      .lock()
      .map_err(|e| CacheError::QueryFailed(format!("Lock poisoned: {}", e)))
  }
}

fn map_sqlite(e: rusqlite::Error) -> CacheError {
  if let rusqlite::Error::SqliteFailure(err, _) = &e {
    if err.code == rusqlite::ErrorCode::DiskFull {
      return CacheError::QuotaExceeded;
    }
  }
  CacheError::QueryFailed(e.to_string())
}

impl AssetStore for SqliteAssetStore {
  fn open_generation(&self, generation: &GenerationId) -> Result<(), CacheError> {
    let conn = self.lock()?;
    conn
      .execute(
        "INSERT OR IGNORE INTO generations (id) VALUES (?)",
        params![generation.as_str()],
      )
      .map_err(map_sqlite)?;
    Ok(())
  }

  fn put(&self, generation: &GenerationId, entry: &CacheEntry) -> Result<(), CacheError> {
    let headers =
      serde_json::to_vec(&entry.headers).map_err(|e| CacheError::Serialization(e.to_string()))?;

    let conn = self.lock()?;
    conn
      .execute(
        "INSERT OR REPLACE INTO asset_entries
           (generation, entry_key, method, url, status, headers, body, stored_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        params![
          generation.as_str(),
          entry.key().storage_hash(),
          entry.method,
          entry.url,
          entry.status,
          headers,
          entry.body,
          entry.stored_at.to_rfc3339(),
        ],
      )
      .map_err(map_sqlite)?;
    Ok(())
  }

  fn get(
    &self,
    generation: &GenerationId,
    key: &CacheKey,
  ) -> Result<Option<CacheEntry>, CacheError> {
    let conn = self.lock()?;
    let mut stmt = conn
      .prepare(
        "SELECT method, url, status, headers, body, stored_at
         FROM asset_entries WHERE generation = ? AND entry_key = ?",
      )
      .map_err(map_sqlite)?;

    let row: Option<(String, String, u16, Vec<u8>, Vec<u8>, String)> = stmt
      .query_row(params![generation.as_str(), key.storage_hash()], |row| {
        Ok((
          row.get(0)?,
          row.get(1)?,
          row.get(2)?,
          row.get(3)?,
          row.get(4)?,
          row.get(5)?,
        ))
      })
      .ok();

    match row {
      Some((method, url, status, headers, body, stored_at)) => {
        let headers: Vec<(String, String)> =
          serde_json::from_slice(&headers).map_err(|e| CacheError::Serialization(e.to_string()))?;
        let stored_at = chrono::DateTime::parse_from_rfc3339(&stored_at)
          .map_err(|e| CacheError::Serialization(e.to_string()))?
          .with_timezone(&chrono::Utc);

        Ok(Some(CacheEntry {
          method,
          url,
          status,
          headers,
          body,
          stored_at,
        }))
      }
      None => Ok(None),
    }
  }

  fn list_generations(&self) -> Result<Vec<GenerationId>, CacheError> {
    let conn = self.lock()?;
    let mut stmt = conn
      .prepare("SELECT id FROM generations ORDER BY created_at, id")
      .map_err(map_sqlite)?;

    let generations = stmt
      .query_map([], |row| row.get::<_, String>(0))
      .map_err(map_sqlite)?
      .filter_map(|r| r.ok())
      .map(GenerationId::new)
      .collect();

    Ok(generations)
  }

  fn delete_generation(&self, generation: &GenerationId) -> Result<(), CacheError> {
    let conn = self.lock()?;
    conn
      .execute(
        "DELETE FROM asset_entries WHERE generation = ?",
        params![generation.as_str()],
      )
      .map_err(map_sqlite)?;
    conn
      .execute(
        "DELETE FROM generations WHERE id = ?",
        params![generation.as_str()],
      )
      .map_err(map_sqlite)?;
    Ok(())
  }

  fn current_generation(&self) -> Result<Option<GenerationId>, CacheError> {
    let conn = self.lock()?;
    let mut stmt = conn
      .prepare("SELECT value FROM cache_meta WHERE key = ?")
      .map_err(map_sqlite)?;

    let value: Option<String> = stmt
      .query_row(params![CURRENT_GENERATION_KEY], |row| row.get(0))
      .ok();

    Ok(value.map(GenerationId::new))
  }

  fn set_current_generation(&self, generation: &GenerationId) -> Result<(), CacheError> {
    let conn = self.lock()?;
    conn
      .execute(
        "INSERT OR REPLACE INTO cache_meta (key, value) VALUES (?, ?)",
        params![CURRENT_GENERATION_KEY, generation.as_str()],
      )
      .map_err(map_sqlite)?;
    Ok(())
  }
}

// ============================================================================
// In-memory implementation
// ============================================================================

#[derive(Default)]
struct MemoryInner {
  generations: BTreeMap<GenerationId, HashMap<String, CacheEntry>>,
  current: Option<GenerationId>,
}

/// In-memory asset store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryAssetStore {
  inner: Mutex<MemoryInner>,
}

impl MemoryAssetStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryInner>, CacheError> {
    self
      .inner
      .lock()
      .map_err(|e| CacheError::QueryFailed(format!("Lock poisoned: {}", e)))
  }
}

impl AssetStore for MemoryAssetStore {
  fn open_generation(&self, generation: &GenerationId) -> Result<(), CacheError> {
    let mut inner = self.lock()?;
    inner.generations.entry(generation.clone()).or_default();
    Ok(())
  }

  fn put(&self, generation: &GenerationId, entry: &CacheEntry) -> Result<(), CacheError> {
    let mut inner = self.lock()?;
    inner
      .generations
      .entry(generation.clone())
      .or_default()
      .insert(entry.key().storage_hash(), entry.clone());
    Ok(())
  }

  fn get(
    &self,
    generation: &GenerationId,
    key: &CacheKey,
  ) -> Result<Option<CacheEntry>, CacheError> {
    let inner = self.lock()?;
    Ok(
      inner
        .generations
        .get(generation)
        .and_then(|entries| entries.get(&key.storage_hash()))
        .cloned(),
    )
  }

  fn list_generations(&self) -> Result<Vec<GenerationId>, CacheError> {
    let inner = self.lock()?;
    Ok(inner.generations.keys().cloned().collect())
  }

  fn delete_generation(&self, generation: &GenerationId) -> Result<(), CacheError> {
    let mut inner = self.lock()?;
    inner.generations.remove(generation);
    Ok(())
  }

  fn current_generation(&self) -> Result<Option<GenerationId>, CacheError> {
    let inner = self.lock()?;
    Ok(inner.current.clone())
  }

  fn set_current_generation(&self, generation: &GenerationId) -> Result<(), CacheError> {
    let mut inner = self.lock()?;
    inner.current = Some(generation.clone());
    Ok(())
  }
}
