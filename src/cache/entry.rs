//! Core types for the asset cache: generations, request identities, entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Identifier naming one complete, consistent set of cached resources.
/// Exactly one generation is current at any time; all others are garbage
/// awaiting the next activation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenerationId(String);

impl GenerationId {
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for GenerationId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for GenerationId {
  fn from(id: &str) -> Self {
    Self(id.to_string())
  }
}

/// Canonical request identity: method plus absolute URL. Only GET requests
/// are ever cached, but the method is part of the key so that can never be
/// violated silently.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
  method: String,
  url: String,
}

impl CacheKey {
  pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
    Self {
      method: method.into().to_uppercase(),
      url: url.into(),
    }
  }

  pub fn get(url: impl Into<String>) -> Self {
    Self::new("GET", url)
  }

  pub fn method(&self) -> &str {
    &self.method
  }

  pub fn url(&self) -> &str {
    &self.url
  }

  /// Stable, fixed-length key for storage lookups.
  pub fn storage_hash(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.method.as_bytes());
    hasher.update(b":");
    hasher.update(self.url.as_bytes());
    hex::encode(hasher.finalize())
  }
}

/// One captured response, bound to the generation it was stored under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
  pub method: String,
  pub url: String,
  pub status: u16,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
  pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
  pub fn new(key: CacheKey, status: u16, headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
    Self {
      method: key.method,
      url: key.url,
      status,
      headers,
      body,
      stored_at: Utc::now(),
    }
  }

  pub fn key(&self) -> CacheKey {
    CacheKey::new(&self.method, &self.url)
  }

  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }
}
