//! Change notification for favorites mutations.
//!
//! An explicit subscription channel: interested parties subscribe, the
//! facade publishes after each successful mutation, and a channel with no
//! subscribers silently drops events.

use tokio::sync::broadcast;

use super::record::MovieId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FavoritesEvent {
  Added(MovieId),
  Removed(MovieId),
  Cleared,
  Merged { merged: usize, errors: usize },
}

pub struct ChangeNotifier {
  tx: broadcast::Sender<FavoritesEvent>,
}

impl ChangeNotifier {
  pub fn new(capacity: usize) -> Self {
    let (tx, _) = broadcast::channel(capacity);
    Self { tx }
  }

  pub fn subscribe(&self) -> broadcast::Receiver<FavoritesEvent> {
    self.tx.subscribe()
  }

  pub(crate) fn emit(&self, event: FavoritesEvent) {
    // No subscribers is not an error
    let _ = self.tx.send(event);
  }
}

impl Default for ChangeNotifier {
  fn default() -> Self {
    Self::new(16)
  }
}

impl Clone for ChangeNotifier {
  fn clone(&self) -> Self {
    Self {
      tx: self.tx.clone(),
    }
  }
}
