//! Generation-versioned durable cache of fetched assets.
//!
//! A generation names one complete, consistent set of cached resources.
//! The cache is append/overwrite-only during a generation's lifetime and
//! generations are deleted wholesale at activation; that generation scoping
//! is the entire concurrency control story.

pub mod entry;
pub mod layer;
pub mod store;

pub use entry::{CacheEntry, CacheKey, GenerationId};
pub use layer::AssetCache;
pub use store::{AssetStore, MemoryAssetStore, SqliteAssetStore};
