use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::CacheStorage;
use crate::net::{Fetcher, Request};
use crate::worker::{ActivationReport, Served, Worker};

/// Lifecycle events delivered by the host
#[derive(Debug)]
pub enum Event {
  /// Populate the shell
  Install { reply: oneshot::Sender<Result<()>> },
  /// Prune stale partitions and claim clients
  Activate {
    reply: oneshot::Sender<Result<ActivationReport>>,
  },
  /// Intercepted request
  Fetch {
    request: Request,
    reply: oneshot::Sender<Served>,
  },
}

/// Host-side handle that feeds events to a running worker
#[derive(Clone)]
pub struct EventHandler {
  tx: mpsc::UnboundedSender<Event>,
}

impl EventHandler {
  /// Start the event loop for `worker`.
  ///
  /// Install and activate run in arrival order. Each fetch runs in its own task.
  /// The loop ends once every handle is dropped.
  pub fn spawn<S, F>(worker: Arc<Worker<S, F>>) -> (Self, JoinHandle<()>)
  where
    S: CacheStorage,
    F: Fetcher,
  {
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = tokio::spawn(async move {
      while let Some(event) = rx.recv().await {
        match event {
          Event::Install { reply } => {
            let _ = reply.send(worker.install().await);
          }
          Event::Activate { reply } => {
            let _ = reply.send(worker.activate().await);
          }
          Event::Fetch { request, reply } => {
            let worker = Arc::clone(&worker);
            tokio::spawn(async move {
              let served = worker.handle_fetch(request).await;
              if reply.send(served).is_err() {
                debug!("fetch caller went away before the response");
              }
            });
          }
        }
      }
    });

    (Self { tx }, handle)
  }

  fn send(&self, event: Event) -> Result<()> {
    self
      .tx
      .send(event)
      .map_err(|_| eyre!("Worker event loop has stopped"))
  }

  pub async fn install(&self) -> Result<()> {
    let (reply, rx) = oneshot::channel();
    self.send(Event::Install { reply })?;
    rx.await.map_err(|_| eyre!("Worker dropped the install event"))?
  }

  pub async fn activate(&self) -> Result<ActivationReport> {
    let (reply, rx) = oneshot::channel();
    self.send(Event::Activate { reply })?;
    rx.await
      .map_err(|_| eyre!("Worker dropped the activate event"))?
  }

  pub async fn fetch(&self, request: Request) -> Result<Served> {
    let (reply, rx) = oneshot::channel();
    self.send(Event::Fetch { request, reply })?;
    rx.await.map_err(|_| eyre!("Worker dropped the fetch event"))
  }
}
