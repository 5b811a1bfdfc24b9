//! Network-first interception with cache fallback.
//!
//! For every intervened request the order is fixed: the live network is
//! always attempted first, the cache is only consulted after it fails.
//! Every successful live fetch is written back into the current generation,
//! so the cache refreshes opportunistically from ordinary traffic rather
//! than from a separate revalidation job.

use url::Url;

use crate::cache::{AssetCache, AssetStore, CacheEntry, CacheKey};
use crate::error::FetchError;

use super::client::{Fetch, FetchRequest, FetchResponse, RequestMode};

pub struct Interceptor<S: AssetStore, F: Fetch> {
  cache: AssetCache<S>,
  client: F,
  offline_url: String,
}

impl<S: AssetStore, F: Fetch> Interceptor<S, F> {
  pub fn new(cache: AssetCache<S>, client: F, offline_url: impl Into<String>) -> Self {
    Self {
      cache,
      client,
      offline_url: offline_url.into(),
    }
  }

  /// Synchronous decision whether to intervene: only GET requests addressed
  /// to an absolute http(s) resource. Everything else passes through.
  pub fn should_intercept(request: &FetchRequest) -> bool {
    if request.method != "GET" {
      return false;
    }
    match Url::parse(&request.url) {
      Ok(url) => matches!(url.scheme(), "http" | "https"),
      Err(_) => false,
    }
  }

  /// Handle one outbound request. Non-intervened requests are forwarded
  /// untouched; intervened ones always produce a response (degraded mode is
  /// a synthetic 503, never an error).
  pub async fn handle(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
    if !Self::should_intercept(request) {
      return self.client.fetch(request).await;
    }
    Ok(self.intercept(request).await)
  }

  async fn intercept(&self, request: &FetchRequest) -> FetchResponse {
    match self.client.fetch(request).await {
      Ok(response) if response.is_success() => {
        let entry = CacheEntry::new(
          request.cache_key(),
          response.status,
          response.headers.clone(),
          response.body.clone(),
        );
        // A failed write-back must not cost the caller its live response
        if let Err(err) = self.cache.put_current(entry) {
          tracing::warn!(url = %request.url, error = %err, "failed to cache live response");
        }
        response
      }
      Ok(response) => {
        tracing::debug!(url = %request.url, status = response.status, "live response not usable, falling back to cache");
        self.fallback(request).await
      }
      Err(err) => {
        tracing::debug!(url = %request.url, error = %err, "network unreachable, falling back to cache");
        self.fallback(request).await
      }
    }
  }

  async fn fallback(&self, request: &FetchRequest) -> FetchResponse {
    match self.cache.lookup(&request.cache_key()) {
      Ok(Some(entry)) => return FetchResponse::from_entry(&entry),
      Ok(None) => {}
      Err(err) => {
        tracing::warn!(url = %request.url, error = %err, "cache lookup failed during fallback");
      }
    }

    // Navigations get the offline page; other resources a synthetic 503
    if request.mode == RequestMode::Navigate {
      if let Ok(Some(entry)) = self.cache.lookup(&CacheKey::get(&self.offline_url)) {
        return FetchResponse::from_entry(&entry);
      }
    }

    FetchResponse::service_unavailable()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{GenerationId, MemoryAssetStore};
  use std::collections::HashMap;
  use std::sync::Mutex;

  /// Scripted network with per-URL behavior.
  #[derive(Default)]
  struct FakeNetwork {
    routes: Mutex<HashMap<String, Route>>,
  }

  #[derive(Clone)]
  enum Route {
    Ok(Vec<u8>),
    Status(u16),
    Unreachable,
  }

  impl FakeNetwork {
    fn route(self, url: &str, route: Route) -> Self {
      self.routes.lock().unwrap().insert(url.to_string(), route);
      self
    }
  }

  impl Fetch for FakeNetwork {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
      let route = self.routes.lock().unwrap().get(&request.url).cloned();
      match route {
        Some(Route::Ok(body)) => Ok(FetchResponse {
          status: 200,
          headers: vec![],
          body,
        }),
        Some(Route::Status(status)) => Ok(FetchResponse {
          status,
          headers: vec![],
          body: vec![],
        }),
        Some(Route::Unreachable) | None => Err(FetchError::Connect {
          url: request.url.clone(),
          reason: "connection refused".to_string(),
        }),
      }
    }
  }

  const OFFLINE: &str = "https://app.example.com/offline.html";

  fn cache_with_current() -> AssetCache<MemoryAssetStore> {
    let cache = AssetCache::new(MemoryAssetStore::new());
    cache.promote(&GenerationId::from("v1")).unwrap();
    cache
  }

  #[test]
  fn only_absolute_http_get_is_intercepted() {
    assert!(Interceptor::<MemoryAssetStore, FakeNetwork>::should_intercept(
      &FetchRequest::get("https://example.com/app.js")
    ));
    assert!(!Interceptor::<MemoryAssetStore, FakeNetwork>::should_intercept(&FetchRequest {
      method: "POST".to_string(),
      url: "https://example.com/api".to_string(),
      mode: RequestMode::Resource,
    }));
    assert!(!Interceptor::<MemoryAssetStore, FakeNetwork>::should_intercept(
      &FetchRequest::get("chrome-extension://abc/script.js")
    ));
    assert!(!Interceptor::<MemoryAssetStore, FakeNetwork>::should_intercept(
      &FetchRequest::get("/relative/path")
    ));
  }

  #[tokio::test]
  async fn live_success_is_returned_and_cached() {
    let cache = cache_with_current();
    let network =
      FakeNetwork::default().route("https://example.com/app.js", Route::Ok(b"fresh".to_vec()));
    let interceptor = Interceptor::new(cache.clone(), network, OFFLINE);

    let request = FetchRequest::get("https://example.com/app.js");
    let response = interceptor.handle(&request).await.unwrap();
    assert_eq!(response.body, b"fresh");

    let cached = cache.lookup(&request.cache_key()).unwrap().unwrap();
    assert_eq!(cached.body, b"fresh");
  }

  #[tokio::test]
  async fn network_failure_serves_cached_entry() {
    let cache = cache_with_current();
    let request = FetchRequest::get("https://example.com/app.js");
    cache
      .put_current(CacheEntry::new(
        request.cache_key(),
        200,
        vec![],
        b"stale but useful".to_vec(),
      ))
      .unwrap();

    let network = FakeNetwork::default().route("https://example.com/app.js", Route::Unreachable);
    let interceptor = Interceptor::new(cache, network, OFFLINE);

    let response = interceptor.handle(&request).await.unwrap();
    assert_eq!(response.body, b"stale but useful");
  }

  #[tokio::test]
  async fn non_success_live_response_falls_back() {
    let cache = cache_with_current();
    let request = FetchRequest::get("https://example.com/app.js");
    cache
      .put_current(CacheEntry::new(
        request.cache_key(),
        200,
        vec![],
        b"cached".to_vec(),
      ))
      .unwrap();

    let network = FakeNetwork::default().route("https://example.com/app.js", Route::Status(500));
    let interceptor = Interceptor::new(cache, network, OFFLINE);

    let response = interceptor.handle(&request).await.unwrap();
    assert_eq!(response.body, b"cached");
  }

  #[tokio::test]
  async fn offline_navigation_without_cache_gets_offline_page() {
    let cache = cache_with_current();
    cache
      .put_current(CacheEntry::new(
        CacheKey::get(OFFLINE),
        200,
        vec![],
        b"<h1>You are offline</h1>".to_vec(),
      ))
      .unwrap();

    let network = FakeNetwork::default();
    let interceptor = Interceptor::new(cache, network, OFFLINE);

    let request = FetchRequest::navigate("https://app.example.com/movies/42");
    let response = interceptor.handle(&request).await.unwrap();
    assert_eq!(response.body, b"<h1>You are offline</h1>");
  }

  #[tokio::test]
  async fn offline_resource_without_cache_gets_synthetic_503() {
    let cache = cache_with_current();
    let network = FakeNetwork::default();
    let interceptor = Interceptor::new(cache, network, OFFLINE);

    let request = FetchRequest::get("https://example.com/poster.jpg");
    let response = interceptor.handle(&request).await.unwrap();
    assert_eq!(response.status, 503);
  }

  #[tokio::test]
  async fn non_intercepted_requests_pass_through_without_cache_writes() {
    let cache = cache_with_current();
    let network = FakeNetwork::default().route("https://example.com/api", Route::Ok(b"{}".to_vec()));
    let interceptor = Interceptor::new(cache.clone(), network, OFFLINE);

    let request = FetchRequest {
      method: "POST".to_string(),
      url: "https://example.com/api".to_string(),
      mode: RequestMode::Resource,
    };
    let response = interceptor.handle(&request).await.unwrap();
    assert_eq!(response.body, b"{}");

    // Nothing was written for the POST identity
    assert!(cache.lookup(&request.cache_key()).unwrap().is_none());
  }

  #[tokio::test]
  async fn network_is_always_attempted_before_cache() {
    let cache = cache_with_current();
    let request = FetchRequest::get("https://example.com/app.js");
    cache
      .put_current(CacheEntry::new(
        request.cache_key(),
        200,
        vec![],
        b"cached".to_vec(),
      ))
      .unwrap();

    let network =
      FakeNetwork::default().route("https://example.com/app.js", Route::Ok(b"live".to_vec()));
    let interceptor = Interceptor::new(cache, network, OFFLINE);

    let response = interceptor.handle(&request).await.unwrap();
    // Live wins even with a cached entry present
    assert_eq!(response.body, b"live");
  }
}
