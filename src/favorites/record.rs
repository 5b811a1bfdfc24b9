//! Identity and record types shared by both favorites backends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Externally-assigned movie identifier. Stable, caller-supplied, never
/// generated by this core.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovieId(String);

impl MovieId {
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for MovieId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for MovieId {
  fn from(id: &str) -> Self {
    Self(id.to_string())
  }
}

impl From<u64> for MovieId {
  fn from(id: u64) -> Self {
    Self(id.to_string())
  }
}

/// An authenticated account identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for UserId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for UserId {
  fn from(id: &str) -> Self {
    Self(id.to_string())
  }
}

/// The caller's current identity. Backend selection is a pure function of
/// this value: guests (including anonymous sessions) get the local store,
/// everything else the remote per-user collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
  Guest,
  User(UserId),
}

impl Identity {
  pub fn is_guest(&self) -> bool {
    matches!(self, Identity::Guest)
  }

  pub fn user(&self) -> Option<&UserId> {
    match self {
      Identity::Guest => None,
      Identity::User(user) => Some(user),
    }
  }
}

/// One favorited movie. The metadata blob (title, poster path, rating, ...)
/// is opaque to everything in this crate: it is stored, copied, and compared
/// by identity, never interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoriteRecord {
  pub id: MovieId,
  #[serde(default)]
  pub metadata: serde_json::Value,
  /// Server-assigned insertion timestamp; present only on records that have
  /// been through the remote store.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub added_at: Option<DateTime<Utc>>,
}

impl FavoriteRecord {
  pub fn new(id: impl Into<MovieId>, metadata: serde_json::Value) -> Self {
    Self {
      id: id.into(),
      metadata,
      added_at: None,
    }
  }
}

/// Outcome of an `add`: re-adding an existing identity is a defined no-op,
/// never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
  Inserted,
  AlreadyPresent,
}
