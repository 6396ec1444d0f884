//! Core types for the caching system.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use reqwest::header::{HeaderMap, VARY};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

use crate::net::{Request, Response};

/// Lookup key for a cached response.
///
/// Identity is method + URL (fragment removed). The request headers are kept so that
/// entries stored with a `Vary` header only match requests with the same values.
#[derive(Debug, Clone)]
pub struct RequestKey {
  pub method: Method,
  pub url: String,
  headers: HeaderMap,
}

impl RequestKey {
  pub fn from_request(request: &Request) -> Self {
    let url = match Url::parse(&request.url) {
      Ok(mut url) => {
        url.set_fragment(None);
        url.to_string()
      }
      Err(_) => request.url.clone(),
    };

    Self {
      method: request.method.clone(),
      url,
      headers: request.headers.clone(),
    }
  }

  /// Stable, fixed-length storage key.
  pub fn cache_hash(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.method.as_str().as_bytes());
    hasher.update(b" ");
    hasher.update(self.url.as_bytes());
    hex::encode(hasher.finalize())
  }

  /// Only GET requests take part in caching.
  pub fn is_cacheable(&self) -> bool {
    self.method == Method::GET
  }

  fn header_value(&self, name: &str) -> Option<String> {
    self
      .headers
      .get(name)
      .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
  }
}

/// A request header value captured because the response varies on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaryValue {
  /// Lowercased header name
  pub name: String,
  pub value: Option<String>,
}

/// A response snapshot ready to be written into a partition.
#[derive(Debug, Clone)]
pub struct StoredEntry {
  pub key_hash: String,
  pub method: String,
  pub url: String,
  pub vary: Vec<VaryValue>,
  pub response: Response,
}

impl StoredEntry {
  /// Validate that `response` may be stored under `key`.
  ///
  /// Rejects non-GET requests, error responses, partial content and `Vary: *`.
  pub fn new(key: &RequestKey, response: &Response) -> Result<Self> {
    if !key.is_cacheable() {
      return Err(eyre!("Cannot cache {} request for {}", key.method, key.url));
    }
    if response.is_error() {
      return Err(eyre!("Cannot cache a network error for {}", key.url));
    }
    if response.status == 206 {
      return Err(eyre!("Cannot cache partial content for {}", key.url));
    }

    let names = vary_names(&response.headers);
    if names.iter().any(|n| n == "*") {
      return Err(eyre!("Cannot cache {}: response varies on *", key.url));
    }

    let vary = names
      .into_iter()
      .map(|name| VaryValue {
        value: key.header_value(&name),
        name,
      })
      .collect();

    Ok(Self {
      key_hash: key.cache_hash(),
      method: key.method.as_str().to_string(),
      url: key.url.clone(),
      vary,
      response: response.clone(),
    })
  }
}

/// Whether a request matches the header values captured when an entry was stored.
pub fn vary_matches(vary: &[VaryValue], key: &RequestKey) -> bool {
  vary.iter().all(|v| key.header_value(&v.name) == v.value)
}

fn vary_names(headers: &HeaderMap) -> Vec<String> {
  headers
    .get_all(VARY)
    .iter()
    .filter_map(|v| v.to_str().ok())
    .flat_map(|v| v.split(','))
    .map(|name| name.trim().to_lowercase())
    .filter(|name| !name.is_empty())
    .collect()
}

/// A response found in the cache.
#[derive(Debug, Clone)]
pub struct CachedResponse {
  pub response: Response,
  /// Partition the hit came from
  pub partition: String,
  /// When the entry was written
  pub cached_at: DateTime<Utc>,
}

/// Listing row for inspecting a partition.
#[derive(Debug, Clone)]
pub struct EntrySummary {
  pub method: String,
  pub url: String,
  pub status: u16,
  pub size: usize,
  pub cached_at: DateTime<Utc>,
}
