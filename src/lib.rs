//! marquee — the offline-resilience and data-reconciliation core of a
//! movie-browser application.
//!
//! Three pieces share one shape — asynchronous, possibly-failing operations
//! against an external resource that must degrade gracefully and never
//! corrupt local state:
//!
//! - [`cache`] + [`net`]: a generation-versioned durable asset cache and a
//!   network-first interceptor that falls back to it when the network is
//!   unreachable.
//! - [`compress`]: an off-thread image resize/re-encode pipeline with
//!   worker-per-call isolation and a bounded timeout.
//! - [`favorites`] + [`sync`]: a dual-backend favorites store (local-only
//!   for guests, per-user document collection when authenticated) and the
//!   one-shot merge that reconciles the two at sign-in.
//!
//! All external collaborators (network, persistent stores) are injected
//! behind traits so the whole core can be exercised against in-memory fakes.

pub mod cache;
pub mod compress;
pub mod config;
pub mod error;
pub mod favorites;
pub mod net;
pub mod profile;
pub mod sync;

pub use cache::{AssetCache, CacheEntry, CacheKey, GenerationId};
pub use compress::{compress, CompressionOutput, CompressionRequest};
pub use config::Config;
pub use favorites::{
  AddOutcome, FavoriteRecord, FavoritesStore, Identity, MovieId, UserId,
};
pub use net::{FetchRequest, FetchResponse, Interceptor, ServiceAgent};
pub use sync::{MergeReport, SyncEngine};
