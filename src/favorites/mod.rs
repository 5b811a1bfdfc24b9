//! Favorites: one user-facing collection served by two interchangeable
//! backends.
//!
//! Guests get a serialized array in a local key-value store; authenticated
//! users get a per-user remote document collection. The [`FavoritesStore`]
//! facade picks the backend per call from the caller's identity, and
//! [`FavoritesStore::sync_on_sign_in`] merges a guest's accumulated
//! collection into the account at the moment of sign-in.

pub mod events;
pub mod local;
pub mod record;
pub mod remote;
pub mod store;

pub use events::{ChangeNotifier, FavoritesEvent};
pub use local::{KeyValueStore, LocalFavorites, MemoryKeyValue, SqliteKeyValue, FAVORITES_KEY};
pub use record::{AddOutcome, FavoriteRecord, Identity, MovieId, UserId};
pub use remote::{DocumentStore, MemoryDocumentStore};
pub use store::FavoritesStore;
