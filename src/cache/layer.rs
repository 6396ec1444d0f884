//! Async cache store handles over a synchronous storage backend.

use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;

use crate::net::{Fetcher, Request, Response};

use super::storage::CacheStorage;
use super::traits::{CachedResponse, EntrySummary, RequestKey, StoredEntry};

/// Entry point to the partitioned cache.
///
/// Storage calls run on the blocking pool so request handlers never stall the runtime.
pub struct CacheStore<S: CacheStorage> {
  storage: Arc<S>,
}

impl<S: CacheStorage> CacheStore<S> {
  /// Create a new cache store with the given storage backend.
  pub fn new(storage: S) -> Self {
    Self {
      storage: Arc::new(storage),
    }
  }

  async fn blocking<T, F>(&self, op: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&S) -> Result<T> + Send + 'static,
  {
    run_blocking(Arc::clone(&self.storage), op).await
  }

  /// Open a partition, creating it on first use.
  pub async fn open(&self, name: &str) -> Result<Partition<S>> {
    let owned = name.to_string();
    self.blocking(move |s| s.open(&owned)).await?;

    Ok(Partition {
      name: name.to_string(),
      storage: Arc::clone(&self.storage),
    })
  }

  /// Names of all existing partitions.
  pub async fn keys(&self) -> Result<Vec<String>> {
    self.blocking(|s| s.keys()).await
  }

  /// Delete a partition. Returns false if it did not exist.
  pub async fn delete(&self, name: &str) -> Result<bool> {
    let name = name.to_string();
    self.blocking(move |s| s.delete(&name)).await
  }

  /// Look up a request across every partition.
  pub async fn match_any(&self, request: &Request) -> Result<Option<CachedResponse>> {
    let key = RequestKey::from_request(request);
    self.blocking(move |s| s.match_any(&key)).await
  }
}

impl<S: CacheStorage> Clone for CacheStore<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
    }
  }
}

/// Handle to one named partition.
pub struct Partition<S: CacheStorage> {
  name: String,
  storage: Arc<S>,
}

impl<S: CacheStorage> Partition<S> {
  async fn blocking<T, F>(&self, op: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&S, &str) -> Result<T> + Send + 'static,
  {
    let name = self.name.clone();
    run_blocking(Arc::clone(&self.storage), move |s| op(s, &name)).await
  }

  /// Look up a request in this partition only.
  pub async fn matches(&self, request: &Request) -> Result<Option<CachedResponse>> {
    let key = RequestKey::from_request(request);
    self.blocking(move |s, name| s.match_in(name, &key)).await
  }

  /// Store a response snapshot for `request`.
  pub async fn put(&self, request: &Request, response: &Response) -> Result<()> {
    let entry = StoredEntry::new(&RequestKey::from_request(request), response)?;
    self.blocking(move |s, name| s.put(name, &entry)).await
  }

  /// Fetch every request and store all responses, or store nothing.
  ///
  /// Fails if any fetch fails or returns a non-2xx status.
  pub async fn add_all<F>(&self, fetcher: &F, requests: &[Request]) -> Result<()>
  where
    F: Fetcher + ?Sized,
  {
    let responses =
      futures::future::try_join_all(requests.iter().map(|request| async move {
        let response = fetcher.fetch(request).await?;
        if !response.ok() {
          return Err(eyre!(
            "Fetching {} returned status {}",
            request.url,
            response.status
          ));
        }
        StoredEntry::new(&RequestKey::from_request(request), &response)
      }))
      .await?;

    self
      .blocking(move |s, name| s.put_all(name, &responses))
      .await
  }

  /// List the entries of this partition.
  pub async fn entries(&self) -> Result<Vec<EntrySummary>> {
    self.blocking(|s, name| s.entries(name)).await
  }
}

impl<S: CacheStorage> Clone for Partition<S> {
  fn clone(&self) -> Self {
    Self {
      name: self.name.clone(),
      storage: Arc::clone(&self.storage),
    }
  }
}

async fn run_blocking<S, T, F>(storage: Arc<S>, op: F) -> Result<T>
where
  S: CacheStorage,
  T: Send + 'static,
  F: FnOnce(&S) -> Result<T> + Send + 'static,
{
  tokio::task::spawn_blocking(move || op(&storage))
    .await
    .map_err(|e| eyre!("Cache task failed: {}", e))?
}
