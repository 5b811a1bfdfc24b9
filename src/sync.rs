//! One-shot local-to-remote favorites merge.
//!
//! Runs once per sign-in: the guest collection accumulated before
//! authentication is folded into the user's remote collection. The merge is
//! additive only, and a remote record always wins over a local one with the
//! same identity.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::FavoritesError;
use crate::favorites::record::{FavoriteRecord, MovieId, UserId};
use crate::favorites::remote::DocumentStore;

/// What happened during a merge. `errors` counts individual records that
/// failed to insert; the merge itself still completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeReport {
  /// Records newly inserted into the remote collection.
  pub merged: usize,
  /// Records whose insert failed.
  pub errors: usize,
}

impl MergeReport {
  /// True when every local record either already existed remotely or was
  /// inserted successfully.
  pub fn is_clean(&self) -> bool {
    self.errors == 0
  }
}

pub struct SyncEngine<R: DocumentStore> {
  remote: Arc<R>,
}

impl<R: DocumentStore> SyncEngine<R> {
  pub fn new(remote: Arc<R>) -> Self {
    Self { remote }
  }

  /// Fold `local_snapshot` into the user's remote collection.
  ///
  /// Reads the remote collection once, then inserts each local record whose
  /// identity is not already present. A failed insert is counted and logged
  /// but does not stop the remaining inserts. Records already present
  /// remotely are skipped untouched, so the remote copy wins on overlap.
  pub async fn merge(
    &self,
    user: &UserId,
    local_snapshot: &[FavoriteRecord],
  ) -> Result<MergeReport, FavoritesError> {
    if local_snapshot.is_empty() {
      return Ok(MergeReport::default());
    }

    let existing = self.remote.list_docs(user).await?;
    let existing_ids: HashSet<&MovieId> = existing.iter().map(|r| &r.id).collect();

    let mut report = MergeReport::default();
    for record in local_snapshot {
      if existing_ids.contains(&record.id) {
        continue;
      }
      match self.remote.set_doc(user, record).await {
        Ok(()) => report.merged += 1,
        Err(e) => {
          tracing::warn!("Failed to merge favorite {}: {}", record.id, e);
          report.errors += 1;
        }
      }
    }

    tracing::info!(
      "Merged favorites for {}: {} inserted, {} errors",
      user,
      report.merged,
      report.errors
    );
    Ok(report)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::favorites::remote::MemoryDocumentStore;
  use chrono::Utc;
  use serde_json::json;
  use std::collections::BTreeMap;
  use std::future::Future;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Mutex;

  fn record(id: u64) -> FavoriteRecord {
    FavoriteRecord::new(id, json!({"title": format!("movie {}", id)}))
  }

  #[tokio::test]
  async fn merge_is_a_set_union_keyed_by_identity() {
    let remote = Arc::new(MemoryDocumentStore::new());
    let user = UserId::from("user-1");
    remote.set_doc(&user, &record(2)).await.unwrap();
    remote.set_doc(&user, &record(3)).await.unwrap();

    let engine = SyncEngine::new(Arc::clone(&remote));
    let report = engine
      .merge(&user, &[record(1), record(2)])
      .await
      .unwrap();

    assert_eq!(report, MergeReport { merged: 1, errors: 0 });
    assert!(report.is_clean());

    let mut ids: Vec<MovieId> = remote
      .list_docs(&user)
      .await
      .unwrap()
      .into_iter()
      .map(|r| r.id)
      .collect();
    ids.sort();
    assert_eq!(
      ids,
      vec![MovieId::from(1), MovieId::from(2), MovieId::from(3)]
    );
  }

  #[tokio::test]
  async fn remote_copy_wins_on_overlapping_identity() {
    let remote = Arc::new(MemoryDocumentStore::new());
    let user = UserId::from("user-1");
    let remote_version = FavoriteRecord::new(2, json!({"title": "remote title"}));
    remote.set_doc(&user, &remote_version).await.unwrap();

    let local_version = FavoriteRecord::new(2, json!({"title": "local title"}));
    SyncEngine::new(Arc::clone(&remote))
      .merge(&user, &[local_version])
      .await
      .unwrap();

    let docs = remote.list_docs(&user).await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].metadata["title"], "remote title");
  }

  #[tokio::test]
  async fn empty_snapshot_never_touches_the_remote_store() {
    #[derive(Default)]
    struct CountingRemote {
      docs: Mutex<BTreeMap<MovieId, FavoriteRecord>>,
      reads: AtomicUsize,
    }

    impl DocumentStore for CountingRemote {
      fn list_docs(
        &self,
        _user: &UserId,
      ) -> impl Future<Output = color_eyre::Result<Vec<FavoriteRecord>>> + Send {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let docs: Vec<FavoriteRecord> = match self.docs.lock() {
          Ok(docs) => docs.values().cloned().collect(),
          Err(_) => Vec::new(),
        };
        async move { Ok(docs) }
      }

      fn set_doc(
        &self,
        _user: &UserId,
        record: &FavoriteRecord,
      ) -> impl Future<Output = color_eyre::Result<()>> + Send {
        if let Ok(mut docs) = self.docs.lock() {
          let mut stored = record.clone();
          stored.added_at = Some(Utc::now());
          docs.insert(stored.id.clone(), stored);
        }
        async { Ok(()) }
      }

      fn delete_doc(
        &self,
        _user: &UserId,
        id: &MovieId,
      ) -> impl Future<Output = color_eyre::Result<()>> + Send {
        if let Ok(mut docs) = self.docs.lock() {
          docs.remove(id);
        }
        async { Ok(()) }
      }
    }

    let remote = Arc::new(CountingRemote::default());
    let report = SyncEngine::new(Arc::clone(&remote))
      .merge(&UserId::from("user-1"), &[])
      .await
      .unwrap();

    assert_eq!(report, MergeReport::default());
    assert_eq!(remote.reads.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn a_failed_insert_does_not_stop_the_rest() {
    let remote = Arc::new(MemoryDocumentStore::new());
    let user = UserId::from("user-1");

    remote.fail_next_writes(1);
    let report = SyncEngine::new(Arc::clone(&remote))
      .merge(&user, &[record(1), record(2), record(3)])
      .await
      .unwrap();

    assert_eq!(report.merged, 2);
    assert_eq!(report.errors, 1);
    assert!(!report.is_clean());
    assert_eq!(remote.list_docs(&user).await.unwrap().len(), 2);
  }
}
