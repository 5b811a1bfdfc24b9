//! Background-agent lifecycle: install (seed the cache) and activate
//! (evict stale generations, take control).

use color_eyre::{eyre::eyre, Result};

use crate::cache::{AssetCache, AssetStore, CacheEntry, GenerationId};
use crate::config::CacheConfig;

use super::client::{Fetch, FetchRequest};

/// Owns the cache lifecycle for one shipped generation.
pub struct ServiceAgent<S: AssetStore, F: Fetch> {
  cache: AssetCache<S>,
  client: F,
  generation: GenerationId,
  seeds: Vec<String>,
}

impl<S: AssetStore, F: Fetch> ServiceAgent<S, F> {
  pub fn new(cache: AssetCache<S>, client: F, config: &CacheConfig) -> Result<Self> {
    Ok(Self {
      cache,
      client,
      generation: GenerationId::new(config.generation.clone()),
      seeds: config.seed_urls()?,
    })
  }

  pub fn generation(&self) -> &GenerationId {
    &self.generation
  }

  /// Install: fetch the whole seed set (application shell, offline page,
  /// logo) into a fresh generation. All-or-nothing: if any seed fails, the
  /// partially populated generation is deleted and the install fails, so a
  /// half-seeded shell can never be promoted.
  pub async fn install(&self) -> Result<()> {
    self.cache.open(&self.generation)?;

    for url in &self.seeds {
      let request = FetchRequest::get(url.clone());
      let outcome = match self.client.fetch(&request).await {
        Ok(response) if response.is_success() => self
          .cache
          .put(
            &self.generation,
            CacheEntry::new(
              request.cache_key(),
              response.status,
              response.headers,
              response.body,
            ),
          )
          .map_err(color_eyre::Report::from),
        Ok(response) => Err(eyre!("Seed fetch for {} returned status {}", url, response.status)),
        Err(err) => Err(eyre!("Failed to fetch seed {}: {}", url, err)),
      };

      if let Err(err) = outcome {
        let _ = self.cache.delete_generation(&self.generation);
        return Err(err.wrap_err("install aborted, generation discarded"));
      }
    }

    tracing::info!(generation = %self.generation, seeded = self.seeds.len(), "install complete");
    Ok(())
  }

  /// Activate: make the installed generation current and delete every other
  /// one. This is the sole eviction policy; there is no LRU and no size cap.
  pub async fn activate(&self) -> Result<usize> {
    self.cache.promote(&self.generation)?;
    let removed = self.cache.evict_stale()?;
    tracing::info!(generation = %self.generation, removed, "activation complete");
    Ok(removed)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheKey, MemoryAssetStore};
  use crate::error::FetchError;
  use crate::net::client::FetchResponse;
  use std::collections::HashSet;
  use std::sync::Mutex;

  /// Network fake where individual seed URLs can be marked unreachable.
  #[derive(Default)]
  struct SeedNetwork {
    unreachable: Mutex<HashSet<String>>,
  }

  impl SeedNetwork {
    fn unreachable(self, url: &str) -> Self {
      self.unreachable.lock().unwrap().insert(url.to_string());
      self
    }
  }

  impl Fetch for SeedNetwork {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
      if self.unreachable.lock().unwrap().contains(&request.url) {
        return Err(FetchError::Connect {
          url: request.url.clone(),
          reason: "connection refused".to_string(),
        });
      }
      Ok(FetchResponse {
        status: 200,
        headers: vec![],
        body: format!("body of {}", request.url).into_bytes(),
      })
    }
  }

  fn config(generation: &str) -> CacheConfig {
    CacheConfig {
      generation: generation.to_string(),
      base_url: "https://app.example.com".to_string(),
      ..CacheConfig::default()
    }
  }

  fn init_tracing() {
    let _ = tracing_subscriber::fmt()
      .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
      .with_test_writer()
      .try_init();
  }

  #[tokio::test]
  async fn install_then_activate_seeds_and_promotes() {
    init_tracing();
    let cache = AssetCache::new(MemoryAssetStore::new());
    let agent = ServiceAgent::new(cache.clone(), SeedNetwork::default(), &config("v1")).unwrap();

    agent.install().await.unwrap();
    // Not current until activation
    assert!(cache.current_generation().unwrap().is_none());

    agent.activate().await.unwrap();
    assert_eq!(
      cache.current_generation().unwrap(),
      Some(GenerationId::from("v1"))
    );

    // The offline page was part of the seed set
    let offline = cache
      .lookup(&CacheKey::get("https://app.example.com/offline.html"))
      .unwrap();
    assert!(offline.is_some());
  }

  #[tokio::test]
  async fn partial_seeding_is_never_kept() {
    let cache = AssetCache::new(MemoryAssetStore::new());
    let network = SeedNetwork::default().unreachable("https://app.example.com/offline.html");
    let agent = ServiceAgent::new(cache.clone(), network, &config("v1")).unwrap();

    assert!(agent.install().await.is_err());
    // The partially seeded generation was discarded wholesale
    assert!(cache.list_generations().unwrap().is_empty());
  }

  #[tokio::test]
  async fn activation_evicts_every_stale_generation() {
    let cache = AssetCache::new(MemoryAssetStore::new());

    let old = ServiceAgent::new(cache.clone(), SeedNetwork::default(), &config("v1")).unwrap();
    old.install().await.unwrap();
    old.activate().await.unwrap();

    let new = ServiceAgent::new(cache.clone(), SeedNetwork::default(), &config("v2")).unwrap();
    new.install().await.unwrap();
    let removed = new.activate().await.unwrap();

    assert_eq!(removed, 1);
    assert_eq!(
      cache.list_generations().unwrap(),
      vec![GenerationId::from("v2")]
    );
  }
}
