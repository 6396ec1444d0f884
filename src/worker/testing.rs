//! Test doubles for the network and the cache backend.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::header::HeaderMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Mutex};

use crate::cache::{CacheStorage, CachedResponse, EntrySummary, MemoryStorage, RequestKey, StoredEntry};
use crate::net::{Fetcher, Request, Response};

/// Fetcher with canned responses and an on/off switch for the network.
/// Unknown URLs answer 404.
pub struct ScriptedFetcher {
  routes: Mutex<HashMap<String, Response>>,
  online: AtomicBool,
  calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
  pub fn new() -> Self {
    Self {
      routes: Mutex::new(HashMap::new()),
      online: AtomicBool::new(true),
      calls: Mutex::new(Vec::new()),
    }
  }

  pub fn route(self, url: &str, status: u16, body: &'static str) -> Self {
    self
      .routes
      .lock()
      .unwrap()
      .insert(url.to_string(), Response::new(status, HeaderMap::new(), body));
    self
  }

  pub fn set_online(&self, online: bool) {
    self.online.store(online, Ordering::SeqCst);
  }

  pub fn calls(&self) -> Vec<String> {
    self.calls.lock().unwrap().clone()
  }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
  async fn fetch(&self, request: &Request) -> Result<Response> {
    self.calls.lock().unwrap().push(request.url.clone());
    if !self.online.load(Ordering::SeqCst) {
      return Err(eyre!("network unreachable"));
    }
    Ok(
      self
        .routes
        .lock()
        .unwrap()
        .get(&request.url)
        .cloned()
        .unwrap_or_else(|| Response::new(404, HeaderMap::new(), "not found")),
    )
  }
}

/// Memory storage with injectable failures.
#[derive(Default)]
pub struct FaultyStorage {
  inner: MemoryStorage,
  fail_puts: bool,
  sticky_partition: Option<String>,
  put_gate: Option<Mutex<mpsc::Receiver<()>>>,
}

impl FaultyStorage {
  /// Every single-entry put fails.
  pub fn failing_puts() -> Self {
    Self {
      fail_puts: true,
      ..Self::default()
    }
  }

  /// Deleting `partition` always fails.
  pub fn sticky(partition: &str) -> Self {
    Self {
      sticky_partition: Some(partition.to_string()),
      ..Self::default()
    }
  }

  /// Single-entry puts block until a value is sent on the returned channel.
  pub fn gated() -> (Self, mpsc::Sender<()>) {
    let (release, gate) = mpsc::channel();
    let storage = Self {
      put_gate: Some(Mutex::new(gate)),
      ..Self::default()
    };
    (storage, release)
  }
}

impl CacheStorage for FaultyStorage {
  fn open(&self, partition: &str) -> Result<()> {
    self.inner.open(partition)
  }

  fn keys(&self) -> Result<Vec<String>> {
    self.inner.keys()
  }

  fn delete(&self, partition: &str) -> Result<bool> {
    if self.sticky_partition.as_deref() == Some(partition) {
      return Err(eyre!("partition {} is busy", partition));
    }
    self.inner.delete(partition)
  }

  fn match_in(&self, partition: &str, key: &RequestKey) -> Result<Option<CachedResponse>> {
    self.inner.match_in(partition, key)
  }

  fn match_any(&self, key: &RequestKey) -> Result<Option<CachedResponse>> {
    self.inner.match_any(key)
  }

  fn put(&self, partition: &str, entry: &StoredEntry) -> Result<()> {
    if let Some(gate) = &self.put_gate {
      let _ = gate.lock().unwrap().recv();
    }
    if self.fail_puts {
      return Err(eyre!("quota exceeded"));
    }
    self.inner.put(partition, entry)
  }

  fn put_all(&self, partition: &str, entries: &[StoredEntry]) -> Result<()> {
    self.inner.put_all(partition, entries)
  }

  fn entries(&self, partition: &str) -> Result<Vec<EntrySummary>> {
    self.inner.entries(partition)
  }
}
