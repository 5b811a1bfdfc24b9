//! Request/response types and the live HTTP client behind the `Fetch` trait.

use std::future::Future;
use std::time::Duration;

use crate::cache::{CacheEntry, CacheKey};
use crate::error::FetchError;

/// How a request will be consumed by the caller. Navigations get the offline
/// fallback page in degraded mode; plain resources get a synthetic 503.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
  Navigate,
  Resource,
}

/// One outbound request as observed by the interceptor.
#[derive(Debug, Clone)]
pub struct FetchRequest {
  pub method: String,
  pub url: String,
  pub mode: RequestMode,
}

impl FetchRequest {
  pub fn get(url: impl Into<String>) -> Self {
    Self {
      method: "GET".to_string(),
      url: url.into(),
      mode: RequestMode::Resource,
    }
  }

  /// A full-page navigation request.
  pub fn navigate(url: impl Into<String>) -> Self {
    Self {
      mode: RequestMode::Navigate,
      ..Self::get(url)
    }
  }

  pub fn cache_key(&self) -> CacheKey {
    CacheKey::new(&self.method, &self.url)
  }
}

/// A captured response: status, headers, body bytes.
#[derive(Debug, Clone)]
pub struct FetchResponse {
  pub status: u16,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
}

impl FetchResponse {
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }

  /// Synthetic degraded-mode response: a distinguishable 503 so callers can
  /// detect offline operation instead of choking on a malformed payload.
  pub fn service_unavailable() -> Self {
    Self {
      status: 503,
      headers: vec![("content-type".to_string(), "text/plain".to_string())],
      body: b"Offline".to_vec(),
    }
  }

  pub fn from_entry(entry: &CacheEntry) -> Self {
    Self {
      status: entry.status,
      headers: entry.headers.clone(),
      body: entry.body.clone(),
    }
  }
}

/// Live network access. Injected so the interceptor can be exercised against
/// fakes with scripted connectivity.
pub trait Fetch: Send + Sync {
  fn fetch(
    &self,
    request: &FetchRequest,
  ) -> impl Future<Output = Result<FetchResponse, FetchError>> + Send;
}

/// Production `Fetch` implementation over reqwest.
#[derive(Clone)]
pub struct HttpClient {
  client: reqwest::Client,
}

impl HttpClient {
  pub fn new() -> Result<Self, FetchError> {
    Self::with_timeout(Duration::from_secs(30))
  }

  pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| FetchError::InvalidRequest(e.to_string()))?;
    Ok(Self { client })
  }
}

impl Fetch for HttpClient {
  async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
    let method = reqwest::Method::from_bytes(request.method.as_bytes())
      .map_err(|e| FetchError::InvalidRequest(e.to_string()))?;

    let response = self
      .client
      .request(method, &request.url)
      .send()
      .await
      .map_err(|e| classify(e, &request.url))?;

    let status = response.status().as_u16();
    let headers = response
      .headers()
      .iter()
      .filter_map(|(name, value)| {
        value
          .to_str()
          .ok()
          .map(|v| (name.as_str().to_string(), v.to_string()))
      })
      .collect();

    let body = response
      .bytes()
      .await
      .map_err(|e| classify(e, &request.url))?
      .to_vec();

    Ok(FetchResponse {
      status,
      headers,
      body,
    })
  }
}

fn classify(error: reqwest::Error, url: &str) -> FetchError {
  if error.is_timeout() {
    FetchError::Timeout {
      url: url.to_string(),
    }
  } else if error.is_connect() {
    FetchError::Connect {
      url: url.to_string(),
      reason: error.to_string(),
    }
  } else {
    FetchError::Transport {
      url: url.to_string(),
      reason: error.to_string(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn navigate_requests_are_get() {
    let request = FetchRequest::navigate("https://example.com/movies");
    assert_eq!(request.method, "GET");
    assert_eq!(request.mode, RequestMode::Navigate);
  }

  #[test]
  fn synthetic_offline_response_is_distinguishable() {
    let response = FetchResponse::service_unavailable();
    assert_eq!(response.status, 503);
    assert!(!response.is_success());
  }

  #[test]
  fn response_round_trips_through_cache_entry() {
    let entry = CacheEntry::new(
      CacheKey::get("https://example.com/"),
      200,
      vec![("content-type".to_string(), "text/html".to_string())],
      b"<html/>".to_vec(),
    );
    let response = FetchResponse::from_entry(&entry);
    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"<html/>");
    assert!(response.is_success());
  }
}
