//! Cache layer that enforces cache policy over a storage backend.
//!
//! The storage trait stores whatever it is handed; this layer is where the
//! invariants live: only successful GET responses are admitted, lookups are
//! answered from the single current generation, and eviction is wholesale
//! deletion of every generation that is not current.

use std::sync::Arc;

use crate::error::CacheError;

use super::entry::{CacheEntry, CacheKey, GenerationId};
use super::store::AssetStore;

/// Versioned, content-addressed durable cache of fetched resources.
pub struct AssetCache<S: AssetStore> {
  store: Arc<S>,
}

impl<S: AssetStore> AssetCache<S> {
  pub fn new(store: S) -> Self {
    Self {
      store: Arc::new(store),
    }
  }

  /// Acquire (creating if absent) the partition for a generation.
  pub fn open(&self, generation: &GenerationId) -> Result<(), CacheError> {
    self.store.open_generation(generation)
  }

  /// Store an entry within the named generation.
  ///
  /// Rejects anything that must never exist in the cache: non-GET requests
  /// and non-2xx responses.
  pub fn put(&self, generation: &GenerationId, entry: CacheEntry) -> Result<(), CacheError> {
    if entry.method != "GET" {
      return Err(CacheError::NotCacheable(format!(
        "{} request to {}",
        entry.method, entry.url
      )));
    }
    if !entry.is_success() {
      return Err(CacheError::NotCacheable(format!(
        "status {} for {}",
        entry.status, entry.url
      )));
    }

    self.store.put(generation, &entry)
  }

  /// Store an entry within the current generation.
  pub fn put_current(&self, entry: CacheEntry) -> Result<(), CacheError> {
    let current = self
      .store
      .current_generation()?
      .ok_or(CacheError::NoCurrentGeneration)?;
    self.put(&current, entry)
  }

  /// Look a key up within the current generation. A missing current
  /// generation is a miss, not an error.
  pub fn lookup(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
    match self.store.current_generation()? {
      Some(current) => self.store.get(&current, key),
      None => Ok(None),
    }
  }

  /// All known generation identifiers.
  pub fn list_generations(&self) -> Result<Vec<GenerationId>, CacheError> {
    self.store.list_generations()
  }

  /// The generation lookups are answered from, if one has been promoted.
  pub fn current_generation(&self) -> Result<Option<GenerationId>, CacheError> {
    self.store.current_generation()
  }

  /// Purge a non-current generation.
  pub fn delete_generation(&self, generation: &GenerationId) -> Result<(), CacheError> {
    if self.store.current_generation()?.as_ref() == Some(generation) {
      return Err(CacheError::GenerationInUse(generation.to_string()));
    }
    self.store.delete_generation(generation)
  }

  /// Make a generation the one that answers subsequent lookups.
  pub fn promote(&self, generation: &GenerationId) -> Result<(), CacheError> {
    self.store.open_generation(generation)?;
    self.store.set_current_generation(generation)?;
    tracing::debug!(generation = %generation, "promoted cache generation");
    Ok(())
  }

  /// Delete every generation other than the current one. Returns how many
  /// generations were removed.
  pub fn evict_stale(&self) -> Result<usize, CacheError> {
    let current = self
      .store
      .current_generation()?
      .ok_or(CacheError::NoCurrentGeneration)?;

    let mut removed = 0;
    for generation in self.store.list_generations()? {
      if generation != current {
        self.store.delete_generation(&generation)?;
        tracing::debug!(generation = %generation, "evicted stale cache generation");
        removed += 1;
      }
    }

    Ok(removed)
  }
}

impl<S: AssetStore> Clone for AssetCache<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
    }
  }
}
