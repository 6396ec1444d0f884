//! The offline worker: install, activate and fetch handling.

use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};
use url::Url;

use crate::cache::{CacheStorage, CacheStore};
use crate::config::Config;
use crate::net::{Fetcher, Request};

use super::classify::Classifier;
use super::strategy::{Served, Strategies};
use super::version::{prune_stale, ActivationReport, PartitionNames};
use super::writeback::WriteBack;

/// Relative URL of the page served when a navigation cannot reach the network.
const SHELL_PAGE: &str = "./index.html";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
  Parsed,
  Installing,
  /// Shell populated; waiting is skipped so activation may follow at once
  Installed,
  Activating,
  Activated,
  /// Install failed; this worker will never activate
  Redundant,
}

/// Lifecycle state as seen by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlState {
  pub state: LifecycleState,
  /// Set once the worker has claimed its clients
  pub controlling: bool,
}

/// Offline-caching worker for one application scope and cache version.
pub struct Worker<S: CacheStorage, F: Fetcher> {
  store: CacheStore<S>,
  fetcher: Arc<F>,
  names: PartitionNames,
  scope: Url,
  shell: Vec<Request>,
  classifier: Classifier,
  strategies: Strategies<S, F>,
  writes: WriteBack,
  state: watch::Sender<ControlState>,
}

impl<S: CacheStorage, F: Fetcher> Worker<S, F> {
  pub fn new(config: &Config, storage: S, fetcher: F) -> Result<Self> {
    let scope = config.scope_url()?;
    let names = PartitionNames::derive(&config.app_prefix, &config.version);
    let store = CacheStore::new(storage);
    let fetcher = Arc::new(fetcher);
    let writes = WriteBack::new();

    let shell = config
      .shell
      .iter()
      .map(|entry| resolve(&scope, entry).map(Request::get))
      .collect::<Result<Vec<_>>>()?;

    let shell_page = Request::get(resolve(&scope, SHELL_PAGE)?);
    let classifier = Classifier::new(scope.clone(), config.third_party_markers.clone());
    let strategies = Strategies::new(
      store.clone(),
      Arc::clone(&fetcher),
      names.clone(),
      shell_page,
      writes.clone(),
    );

    let (state, _) = watch::channel(ControlState {
      state: LifecycleState::Parsed,
      controlling: false,
    });

    Ok(Self {
      store,
      fetcher,
      names,
      scope,
      shell,
      classifier,
      strategies,
      writes,
      state,
    })
  }

  pub fn names(&self) -> &PartitionNames {
    &self.names
  }

  pub fn store(&self) -> &CacheStore<S> {
    &self.store
  }

  pub fn state(&self) -> LifecycleState {
    self.state.borrow().state
  }

  /// Observe lifecycle transitions, including the client claim.
  pub fn subscribe(&self) -> watch::Receiver<ControlState> {
    self.state.subscribe()
  }

  fn set_state(&self, state: LifecycleState, controlling: bool) {
    self.state.send_replace(ControlState { state, controlling });
  }

  /// Populate the static partition with the shell. All entries are stored or none are.
  pub async fn install(&self) -> Result<()> {
    match self.state() {
      LifecycleState::Parsed | LifecycleState::Installed => {}
      other => return Err(eyre!("Cannot install while {:?}", other)),
    }
    self.set_state(LifecycleState::Installing, false);

    match self.populate_shell().await {
      Ok(()) => {
        info!(
          partition = %self.names.static_name,
          entries = self.shell.len(),
          "shell cached"
        );
        self.set_state(LifecycleState::Installed, false);
        Ok(())
      }
      Err(e) => {
        self.set_state(LifecycleState::Redundant, false);
        Err(eyre!("Install failed: {}", e))
      }
    }
  }

  async fn populate_shell(&self) -> Result<()> {
    let partition = self.store.open(&self.names.static_name).await?;
    partition.add_all(self.fetcher.as_ref(), &self.shell).await
  }

  /// Prune partitions of other versions, then claim clients.
  pub async fn activate(&self) -> Result<ActivationReport> {
    match self.state() {
      LifecycleState::Installed | LifecycleState::Activated => {}
      other => return Err(eyre!("Cannot activate while {:?}", other)),
    }
    self.set_state(LifecycleState::Activating, false);

    let report = match prune_stale(&self.store, &self.names).await {
      Ok(report) => report,
      Err(e) => {
        self.set_state(LifecycleState::Installed, false);
        return Err(e);
      }
    };

    info!(
      deleted = report.deleted.len(),
      failed = report.failed.len(),
      "stale partitions pruned"
    );
    self.set_state(LifecycleState::Activated, true);
    Ok(report)
  }

  /// Classify a request and answer it with the matching strategy.
  pub async fn handle_fetch(&self, mut request: Request) -> Served {
    let class = self.classifier.classify(&request);
    if let Ok(absolute) = self.scope.join(&request.url) {
      request.url = absolute.to_string();
    }
    debug!(url = %request.url, ?class, "handling fetch");

    let served = self.strategies.respond(class, &request).await;
    debug!(url = %request.url, source = ?served.source, status = served.response.status, "served");
    served
  }

  /// Wait for background cache writes to finish.
  pub async fn flush(&self) {
    self.writes.flush().await;
  }
}

fn resolve(scope: &Url, entry: &str) -> Result<String> {
  scope
    .join(entry)
    .map(|u| u.to_string())
    .map_err(|e| eyre!("Invalid URL {} in scope {}: {}", entry, scope, e))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::MemoryStorage;
  use crate::net::Response;
  use crate::worker::strategy::ServedFrom;
  use crate::worker::testing::ScriptedFetcher;
  use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};

  fn config(version: &str) -> Config {
    Config::from_yaml(&format!(
      "version: {}\nscope: https://app.example/\nshell: [./index.html, ./app.js]\n",
      version
    ))
    .unwrap()
  }

  fn online() -> ScriptedFetcher {
    ScriptedFetcher::new()
      .route("https://app.example/index.html", 200, "<html>shell</html>")
      .route("https://app.example/app.js", 200, "boot()")
  }

  #[tokio::test]
  async fn test_install_populates_static_partition() {
    let worker = Worker::new(&config("v1"), MemoryStorage::new(), online()).unwrap();
    worker.install().await.unwrap();

    assert_eq!(worker.state(), LifecycleState::Installed);
    let entries = worker
      .store()
      .open("sawmill-static-v1")
      .await
      .unwrap()
      .entries()
      .await
      .unwrap();
    assert_eq!(entries.len(), 2);
  }

  #[tokio::test]
  async fn test_install_failure_commits_nothing() {
    let fetcher = ScriptedFetcher::new().route("https://app.example/index.html", 200, "<html>");
    let worker = Worker::new(&config("v1"), MemoryStorage::new(), fetcher).unwrap();

    // app.js answers 404
    assert!(worker.install().await.is_err());
    assert_eq!(worker.state(), LifecycleState::Redundant);
    assert!(worker
      .store()
      .match_any(&Request::get("https://app.example/index.html"))
      .await
      .unwrap()
      .is_none());
    assert!(worker.activate().await.is_err());
  }

  #[tokio::test]
  async fn test_activate_requires_install() {
    let worker = Worker::new(&config("v1"), MemoryStorage::new(), online()).unwrap();
    assert!(worker.activate().await.is_err());
    assert_eq!(worker.state(), LifecycleState::Parsed);
  }

  #[tokio::test]
  async fn test_activate_claims_after_pruning() {
    let worker = Worker::new(&config("v2"), MemoryStorage::new(), online()).unwrap();
    worker.store().open("sawmill-static-v1").await.unwrap();
    worker.store().open("sawmill-runtime-v1").await.unwrap();
    let mut clients = worker.subscribe();
    assert!(!clients.borrow().controlling);

    worker.install().await.unwrap();
    let report = worker.activate().await.unwrap();

    assert_eq!(report.deleted.len(), 2);
    assert_eq!(worker.store().keys().await.unwrap(), vec!["sawmill-static-v2"]);
    assert!(clients.has_changed().unwrap());
    let seen = *clients.borrow_and_update();
    assert_eq!(
      seen,
      ControlState {
        state: LifecycleState::Activated,
        controlling: true,
      }
    );
  }

  #[tokio::test]
  async fn test_reactivation_prunes_nothing() {
    let worker = Worker::new(&config("v1"), MemoryStorage::new(), online()).unwrap();
    worker.install().await.unwrap();
    worker.activate().await.unwrap();
    let again = worker.activate().await.unwrap();
    assert_eq!(again, ActivationReport::default());
  }

  #[tokio::test]
  async fn test_version_rotation_discards_runtime_entries() {
    let storage = Arc::new(MemoryStorage::new());
    let fetcher = online().route("https://app.example/extra.css", 200, "p{}");
    let v1 = Worker::new(&config("v1"), Arc::clone(&storage), fetcher).unwrap();
    v1.install().await.unwrap();
    v1.activate().await.unwrap();
    v1.handle_fetch(Request::get("https://app.example/extra.css")).await;
    v1.flush().await;
    assert!(v1
      .store()
      .match_any(&Request::get("https://app.example/extra.css"))
      .await
      .unwrap()
      .is_some());

    let v2 = Worker::new(&config("v2"), storage, online()).unwrap();
    v2.install().await.unwrap();
    let report = v2.activate().await.unwrap();

    let mut deleted = report.deleted;
    deleted.sort();
    assert_eq!(deleted, vec!["sawmill-runtime-v1", "sawmill-static-v1"]);
    assert!(v2
      .store()
      .match_any(&Request::get("https://app.example/extra.css"))
      .await
      .unwrap()
      .is_none());
  }

  #[tokio::test]
  async fn test_offline_navigation_gets_shell() {
    let fetcher = online();
    let worker = Worker::new(&config("v1"), MemoryStorage::new(), fetcher).unwrap();
    worker.install().await.unwrap();
    worker.activate().await.unwrap();
    worker.fetcher.set_online(false);

    let served = worker
      .handle_fetch(
        Request::get("https://app.example/reports/7")
          .with_header(ACCEPT, HeaderValue::from_static("text/html")),
      )
      .await;
    assert_eq!(served.source, ServedFrom::ShellFallback);
    assert_eq!(served.response.body.as_ref(), b"<html>shell</html>");
  }

  #[tokio::test]
  async fn test_shell_asset_served_without_network() {
    let worker = Worker::new(&config("v1"), MemoryStorage::new(), online()).unwrap();
    worker.install().await.unwrap();
    let calls_after_install = worker.fetcher.calls().len();

    let served = worker.handle_fetch(Request::get("/app.js")).await;
    assert_eq!(served.source, ServedFrom::Cache);
    assert_eq!(served.response.body.as_ref(), b"boot()");
    assert_eq!(worker.fetcher.calls().len(), calls_after_install);
  }

  #[tokio::test]
  async fn test_third_party_script_fetched_once_then_cached() {
    let url = "https://cdn.jsdelivr.net/npm/pdfmake@0.2.7/build/pdfmake.min.js";
    let fetcher = online().route(url, 200, "pdfMake={}");
    let worker = Worker::new(&config("v1"), MemoryStorage::new(), fetcher).unwrap();
    worker.install().await.unwrap();
    worker.activate().await.unwrap();

    let first = worker.handle_fetch(Request::get(url)).await;
    assert_eq!(first.source, ServedFrom::Network);
    worker.flush().await;

    let second = worker.handle_fetch(Request::get(url)).await;
    assert_eq!(second.source, ServedFrom::Cache);
    assert_eq!(second.response.body.as_ref(), b"pdfMake={}");
    let network_hits = worker.fetcher.calls().iter().filter(|c| *c == url).count();
    assert_eq!(network_hits, 1);
  }

  #[tokio::test]
  async fn test_offline_uncached_asset_is_network_error() {
    let worker = Worker::new(&config("v1"), MemoryStorage::new(), online()).unwrap();
    worker.fetcher.set_online(false);

    let served = worker.handle_fetch(Request::get("/missing.js")).await;
    assert_eq!(served.source, ServedFrom::NetworkError);
    assert!(served.response.is_error());
  }

  #[tokio::test]
  async fn test_live_navigation_is_returned_as_is() {
    let worker = Worker::new(&config("v1"), MemoryStorage::new(), online()).unwrap();
    worker.install().await.unwrap();
    worker
      .store()
      .open("sawmill-runtime-v1")
      .await
      .unwrap()
      .put(
        &Request::get("https://app.example/index.html"),
        &Response::new(200, HeaderMap::new(), "old"),
      )
      .await
      .unwrap();

    let served = worker
      .handle_fetch(Request::navigate("https://app.example/index.html"))
      .await;
    assert_eq!(served.source, ServedFrom::Network);
    assert_eq!(served.response.body.as_ref(), b"<html>shell</html>");
  }
}
