//! Remote (authenticated-mode) favorites backend.
//!
//! The remote store is an external collaborator owned elsewhere; this core
//! only sees the capability set below and never assumes anything about the
//! internal storage layout. Transport errors are surfaced as-is.

use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Mutex;

use super::record::{FavoriteRecord, MovieId, UserId};

/// Per-user document collection keyed by movie identity.
pub trait DocumentStore: Send + Sync {
  /// The full collection for one user.
  fn list_docs(&self, user: &UserId) -> impl Future<Output = Result<Vec<FavoriteRecord>>> + Send;

  /// Store (or overwrite) one record under its identity, stamping the
  /// server-assigned insertion timestamp.
  fn set_doc(
    &self,
    user: &UserId,
    record: &FavoriteRecord,
  ) -> impl Future<Output = Result<()>> + Send;

  /// Delete one record by identity. Deleting an absent identity succeeds.
  fn delete_doc(&self, user: &UserId, id: &MovieId) -> impl Future<Output = Result<()>> + Send;
}

/// In-memory document store, used in tests and anywhere a real remote
/// backend is not wired up. Writes can be scripted to fail for exercising
/// partial-merge behavior.
#[derive(Default)]
pub struct MemoryDocumentStore {
  collections: Mutex<HashMap<UserId, BTreeMap<MovieId, FavoriteRecord>>>,
  write_failures: Mutex<usize>,
}

impl MemoryDocumentStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Make the next `count` writes fail with a transport error.
  pub fn fail_next_writes(&self, count: usize) {
    if let Ok(mut failures) = self.write_failures.lock() {
      *failures = count;
    }
  }

  fn take_failure(&self) -> Result<bool> {
    let mut failures = self
      .write_failures
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    if *failures > 0 {
      *failures -= 1;
      Ok(true)
    } else {
      Ok(false)
    }
  }
}

impl DocumentStore for MemoryDocumentStore {
  async fn list_docs(&self, user: &UserId) -> Result<Vec<FavoriteRecord>> {
    let collections = self
      .collections
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(
      collections
        .get(user)
        .map(|docs| docs.values().cloned().collect())
        .unwrap_or_default(),
    )
  }

  async fn set_doc(&self, user: &UserId, record: &FavoriteRecord) -> Result<()> {
    if self.take_failure()? {
      return Err(eyre!("simulated transport failure"));
    }

    let mut collections = self
      .collections
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stored = record.clone();
    stored.added_at = Some(Utc::now());
    collections
      .entry(user.clone())
      .or_default()
      .insert(stored.id.clone(), stored);
    Ok(())
  }

  async fn delete_doc(&self, user: &UserId, id: &MovieId) -> Result<()> {
    let mut collections = self
      .collections
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    if let Some(docs) = collections.get_mut(user) {
      docs.remove(id);
    }
    Ok(())
  }
}
