//! Profile picture storage.
//!
//! Uploaded pictures go through the compression pipeline before they are
//! persisted, and land in the same key-value store the guest favorites use.
//! The binary payload is hex-encoded under `profile_picture_{user}` with a
//! small JSON metadata document alongside under a `_meta` suffix.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::compress::{compress_with_timeout, CompressionOutput, CompressionRequest};
use crate::config::CompressionConfig;
use crate::error::ProfileError;
use crate::favorites::local::KeyValueStore;
use crate::favorites::record::UserId;

/// Metadata stored next to each picture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileMeta {
  pub user: UserId,
  pub updated_at: DateTime<Utc>,
}

pub struct ProfileStore<L: KeyValueStore> {
  store: Arc<L>,
  config: CompressionConfig,
}

impl<L: KeyValueStore> ProfileStore<L> {
  pub fn new(store: Arc<L>, config: CompressionConfig) -> Self {
    Self { store, config }
  }

  /// Compress and persist a picture for `user`, replacing any previous one.
  /// Returns the compression result so callers can report the size saving.
  pub async fn save_picture(
    &self,
    user: &UserId,
    image_bytes: Vec<u8>,
  ) -> Result<CompressionOutput, ProfileError> {
    let request = CompressionRequest::from_config(image_bytes, &self.config);
    let output = compress_with_timeout(request, self.config.timeout()).await?;

    self
      .store
      .set(&picture_key(user), &hex::encode(&output.compressed_bytes))?;

    let meta = ProfileMeta {
      user: user.clone(),
      updated_at: Utc::now(),
    };
    let raw = serde_json::to_string(&meta).map_err(|e| ProfileError::Corrupt(e.to_string()))?;
    self.store.set(&meta_key(user), &raw)?;

    tracing::debug!(
      "Stored profile picture for {}: {} -> {} bytes",
      user,
      output.original_size,
      output.compressed_size
    );
    Ok(output)
  }

  /// The stored picture bytes, or `None` if the user has none.
  pub fn load_picture(&self, user: &UserId) -> Result<Option<Vec<u8>>, ProfileError> {
    match self.store.get(&picture_key(user))? {
      Some(encoded) => {
        let bytes = hex::decode(&encoded)
          .map_err(|e| ProfileError::Corrupt(format!("picture payload: {}", e)))?;
        Ok(Some(bytes))
      }
      None => Ok(None),
    }
  }

  pub fn load_meta(&self, user: &UserId) -> Result<Option<ProfileMeta>, ProfileError> {
    match self.store.get(&meta_key(user))? {
      Some(raw) => {
        let meta = serde_json::from_str(&raw)
          .map_err(|e| ProfileError::Corrupt(format!("picture metadata: {}", e)))?;
        Ok(Some(meta))
      }
      None => Ok(None),
    }
  }

  /// Remove both the picture and its metadata. Idempotent.
  pub fn delete_picture(&self, user: &UserId) -> Result<(), ProfileError> {
    self.store.delete(&picture_key(user))?;
    self.store.delete(&meta_key(user))?;
    Ok(())
  }
}

fn picture_key(user: &UserId) -> String {
  format!("profile_picture_{}", user)
}

fn meta_key(user: &UserId) -> String {
  format!("profile_picture_{}_meta", user)
}
