//! Dual-backend favorites facade.
//!
//! All five operations are defined identically for both backends from the
//! caller's point of view; which backend serves a call is decided purely by
//! the identity passed in, never by stored mode state.

use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::error::FavoritesError;
use crate::sync::{MergeReport, SyncEngine};

use super::events::{ChangeNotifier, FavoritesEvent};
use super::local::{KeyValueStore, LocalFavorites};
use super::record::{AddOutcome, FavoriteRecord, Identity, MovieId, UserId};
use super::remote::DocumentStore;

pub struct FavoritesStore<L: KeyValueStore, R: DocumentStore> {
  local: LocalFavorites<L>,
  remote: Arc<R>,
  notifier: ChangeNotifier,
}

impl<L: KeyValueStore, R: DocumentStore> FavoritesStore<L, R> {
  pub fn new(local_store: Arc<L>, remote: Arc<R>) -> Self {
    Self {
      local: LocalFavorites::new(local_store),
      remote,
      notifier: ChangeNotifier::default(),
    }
  }

  /// Subscribe to change events published after successful mutations.
  pub fn subscribe(&self) -> broadcast::Receiver<FavoritesEvent> {
    self.notifier.subscribe()
  }

  pub async fn list(&self, identity: &Identity) -> Result<Vec<FavoriteRecord>, FavoritesError> {
    match identity.user() {
      None => self.local.list(),
      Some(user) => Ok(self.remote.list_docs(user).await?),
    }
  }

  /// Insert a record unless its identity is already present in the selected
  /// backend. Re-adding is a defined no-op.
  pub async fn add(
    &self,
    identity: &Identity,
    record: FavoriteRecord,
  ) -> Result<AddOutcome, FavoritesError> {
    let id = record.id.clone();
    let outcome = match identity.user() {
      None => self.local.add(record)?,
      Some(user) => {
        let existing = self.remote.list_docs(user).await?;
        if existing.iter().any(|r| r.id == id) {
          AddOutcome::AlreadyPresent
        } else {
          self.remote.set_doc(user, &record).await?;
          AddOutcome::Inserted
        }
      }
    };

    if outcome == AddOutcome::Inserted {
      self.notifier.emit(FavoritesEvent::Added(id));
    }
    Ok(outcome)
  }

  /// Idempotent removal from the selected backend.
  pub async fn remove(&self, identity: &Identity, id: &MovieId) -> Result<(), FavoritesError> {
    match identity.user() {
      None => self.local.remove(id)?,
      Some(user) => self.remote.delete_doc(user, id).await?,
    }
    self.notifier.emit(FavoritesEvent::Removed(id.clone()));
    Ok(())
  }

  /// Existence check within the selected backend only, never both.
  pub async fn has(&self, identity: &Identity, id: &MovieId) -> Result<bool, FavoritesError> {
    match identity.user() {
      None => self.local.has(id),
      Some(user) => {
        let docs = self.remote.list_docs(user).await?;
        Ok(docs.iter().any(|r| &r.id == id))
      }
    }
  }

  /// Empty the selected backend entirely.
  pub async fn clear(&self, identity: &Identity) -> Result<(), FavoritesError> {
    match identity.user() {
      None => self.local.clear()?,
      Some(user) => {
        let docs = self.remote.list_docs(user).await?;
        let deletions = join_all(docs.iter().map(|r| self.remote.delete_doc(user, &r.id))).await;
        for deletion in deletions {
          deletion?;
        }
      }
    }
    self.notifier.emit(FavoritesEvent::Cleared);
    Ok(())
  }

  /// To be called once, at the guest-to-authenticated transition: merge the
  /// accumulated local snapshot into the user's remote collection, then
  /// clear the local snapshot only if every insert succeeded. With errors
  /// the local data stays untouched so the merge can be retried.
  pub async fn sync_on_sign_in(&self, user: &UserId) -> Result<MergeReport, FavoritesError> {
    let snapshot = self.local.list()?;
    let report = SyncEngine::new(Arc::clone(&self.remote))
      .merge(user, &snapshot)
      .await?;

    if report.is_clean() {
      self.local.clear()?;
    }

    self.notifier.emit(FavoritesEvent::Merged {
      merged: report.merged,
      errors: report.errors,
    });
    Ok(report)
  }
}
