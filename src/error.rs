//! Error taxonomy for the resilience core.
//!
//! Recoverable conditions (cache miss, a single failed merge insert) are
//! absorbed where they occur and expressed as result values; the types here
//! cover everything that must stay distinguishable for the caller: quota
//! exhaustion, decode/encode failures, transient network errors, and opaque
//! remote-transport errors.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors from the durable asset cache.
#[derive(Error, Debug)]
pub enum CacheError {
  #[error("Failed to open cache database at {path}: {reason}")]
  OpenFailed { path: PathBuf, reason: String },

  #[error("Cache query failed: {0}")]
  QueryFailed(String),

  #[error("Failed to serialize cache entry: {0}")]
  Serialization(String),

  #[error("Storage quota exceeded")]
  QuotaExceeded,

  #[error("No generation is currently active")]
  NoCurrentGeneration,

  #[error("Cannot delete the current generation {0}")]
  GenerationInUse(String),

  #[error("Response is not cacheable: {0}")]
  NotCacheable(String),
}

/// Transient network failures. These trigger the cache fallback and are
/// never surfaced as fatal by the interceptor.
#[derive(Error, Debug)]
pub enum FetchError {
  #[error("Failed to connect to {url}: {reason}")]
  Connect { url: String, reason: String },

  #[error("Request to {url} timed out")]
  Timeout { url: String },

  #[error("Transport error for {url}: {reason}")]
  Transport { url: String, reason: String },

  #[error("Invalid request: {0}")]
  InvalidRequest(String),
}

/// Failures from the compression worker, delivered as typed values rather
/// than panics across the task boundary.
#[derive(Error, Debug)]
pub enum CompressError {
  #[error("Input image is empty")]
  EmptyInput,

  #[error("Unsupported image format: {0}")]
  UnsupportedFormat(String),

  #[error("Failed to decode image: {0}")]
  Decode(String),

  #[error("Failed to encode image: {0}")]
  Encode(String),

  #[error("Compression did not finish within {0:?}")]
  Timeout(Duration),

  #[error("Compression worker terminated unexpectedly: {0}")]
  WorkerGone(String),
}

/// Errors from the local key-value store backing guest-mode favorites and
/// profile assets.
#[derive(Error, Debug)]
pub enum StorageError {
  #[error("Storage quota exceeded")]
  QuotaExceeded,

  #[error("Storage backend error: {0}")]
  Backend(String),
}

/// Errors from the favorites facade and sync engine. Remote-transport errors
/// are carried as-is; local failures keep their quota distinction.
#[derive(Error, Debug)]
pub enum FavoritesError {
  #[error("Local favorites storage failed: {0}")]
  Local(#[from] StorageError),

  #[error("Stored favorites are not valid JSON: {0}")]
  Serialization(String),

  #[error("Remote store error: {0}")]
  Remote(color_eyre::Report),
}

impl From<color_eyre::Report> for FavoritesError {
  fn from(report: color_eyre::Report) -> Self {
    Self::Remote(report)
  }
}

/// Errors from profile-picture persistence.
#[derive(Error, Debug)]
pub enum ProfileError {
  #[error("Image compression failed: {0}")]
  Compression(#[from] CompressError),

  #[error("Profile storage failed: {0}")]
  Storage(#[from] StorageError),

  #[error("Stored profile data is corrupt: {0}")]
  Corrupt(String),
}
