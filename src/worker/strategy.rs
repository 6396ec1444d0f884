//! Fetch strategies.
//!
//! Every strategy resolves to a response. Live responses are copied into the runtime
//! partition in the background; the caller never waits for that write and never sees it fail.

use color_eyre::Result;
use std::sync::Arc;
use tracing::debug;

use crate::cache::{CacheStorage, CacheStore, CachedResponse};
use crate::net::{Fetcher, Request, Response};

use super::classify::RequestClass;
use super::version::PartitionNames;
use super::writeback::WriteBack;

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
  Network,
  Cache,
  /// Cached shell page substituted for a failed navigation
  ShellFallback,
  /// Generic network-error response
  NetworkError,
}

/// A response handed back to the page.
#[derive(Debug, Clone)]
pub struct Served {
  pub response: Response,
  pub source: ServedFrom,
}

impl Served {
  fn new(response: Response, source: ServedFrom) -> Self {
    Self { response, source }
  }

  fn network_error() -> Self {
    Self::new(Response::error(), ServedFrom::NetworkError)
  }
}

/// Network-first and cache-first handling over one cache store.
pub struct Strategies<S: CacheStorage, F: Fetcher> {
  store: CacheStore<S>,
  fetcher: Arc<F>,
  names: PartitionNames,
  /// Request for the cached shell page used when a navigation fails
  shell_page: Request,
  writes: WriteBack,
}

impl<S: CacheStorage, F: Fetcher> Strategies<S, F> {
  pub fn new(
    store: CacheStore<S>,
    fetcher: Arc<F>,
    names: PartitionNames,
    shell_page: Request,
    writes: WriteBack,
  ) -> Self {
    Self {
      store,
      fetcher,
      names,
      shell_page,
      writes,
    }
  }

  /// Run the strategy assigned to `class`.
  pub async fn respond(&self, class: RequestClass, request: &Request) -> Served {
    match class {
      RequestClass::Navigation => self.network_first(request).await,
      RequestClass::ThirdPartyScript | RequestClass::SameOriginAsset => {
        self.cache_first(request).await
      }
      RequestClass::Other => self.network_first_any_cache(request).await,
    }
  }

  /// Live response if possible, otherwise the cached shell page.
  pub async fn network_first(&self, request: &Request) -> Served {
    if let Some(response) = self.fetch_and_store(request).await {
      return Served::new(response, ServedFrom::Network);
    }

    match self.shell_fallback().await {
      Some(shell) => Served::new(shell, ServedFrom::ShellFallback),
      None => Served::network_error(),
    }
  }

  /// Any cached copy without touching the network; fetch only on a miss.
  pub async fn cache_first(&self, request: &Request) -> Served {
    if let Some(hit) = self.lookup_any(request).await {
      return Served::new(hit, ServedFrom::Cache);
    }

    if let Some(response) = self.fetch_and_store(request).await {
      return Served::new(response, ServedFrom::Network);
    }

    self.cached_or_error(request).await
  }

  /// Live response if possible, otherwise any cached copy.
  pub async fn network_first_any_cache(&self, request: &Request) -> Served {
    if let Some(response) = self.fetch_and_store(request).await {
      return Served::new(response, ServedFrom::Network);
    }

    self.cached_or_error(request).await
  }

  async fn fetch_and_store(&self, request: &Request) -> Option<Response> {
    match self.fetcher.fetch(request).await {
      Ok(response) => {
        self.writes.spawn_put(
          &self.store,
          &self.names.runtime_name,
          request.clone(),
          response.clone(),
        );
        Some(response)
      }
      Err(e) => {
        debug!(url = %request.url, error = %e, "network fetch failed");
        None
      }
    }
  }

  async fn lookup_any(&self, request: &Request) -> Option<Response> {
    match self.store.match_any(request).await {
      Ok(Some(hit)) => {
        debug!(
          url = %request.url,
          partition = %hit.partition,
          cached_at = %hit.cached_at,
          "cache hit"
        );
        Some(hit.response)
      }
      Ok(None) => None,
      Err(e) => {
        debug!(url = %request.url, error = %e, "cache lookup failed");
        None
      }
    }
  }

  async fn cached_or_error(&self, request: &Request) -> Served {
    match self.lookup_any(request).await {
      Some(hit) => Served::new(hit, ServedFrom::Cache),
      None => Served::network_error(),
    }
  }

  async fn shell_fallback(&self) -> Option<Response> {
    match self.lookup_shell().await {
      Ok(hit) => hit.map(|h| h.response),
      Err(e) => {
        debug!(error = %e, "shell lookup failed");
        None
      }
    }
  }

  async fn lookup_shell(&self) -> Result<Option<CachedResponse>> {
    let partition = self.store.open(&self.names.static_name).await?;
    partition.matches(&self.shell_page).await
  }
}
