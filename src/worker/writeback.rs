use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinSet;

use crate::cache::{CacheStorage, CacheStore};
use crate::net::{Request, Response};

/// Detached cache writes.
///
/// Writes are spawned and never awaited by the request that caused them. Their errors are
/// discarded. `flush` lets a host wait for outstanding writes before shutting down.
#[derive(Clone, Default)]
pub struct WriteBack {
  tasks: Arc<Mutex<JoinSet<()>>>,
}

impl WriteBack {
  pub fn new() -> Self {
    Self::default()
  }

  fn tasks(&self) -> MutexGuard<'_, JoinSet<()>> {
    self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Store `response` for `request` in `partition`, in the background.
  pub fn spawn_put<S: CacheStorage>(
    &self,
    store: &CacheStore<S>,
    partition: &str,
    request: Request,
    response: Response,
  ) {
    let store = store.clone();
    let partition = partition.to_string();

    let mut tasks = self.tasks();
    // Reap finished writes so the set does not grow with every request
    while tasks.try_join_next().is_some() {}

    tasks.spawn(async move {
      if let Ok(handle) = store.open(&partition).await {
        let _ = handle.put(&request, &response).await;
      }
    });
  }

  /// Number of writes not yet reaped.
  #[cfg(test)]
  pub fn pending(&self) -> usize {
    self.tasks().len()
  }

  /// Wait for every outstanding write to finish.
  pub async fn flush(&self) {
    loop {
      let mut batch = {
        let mut tasks = self.tasks();
        std::mem::take(&mut *tasks)
      };
      if batch.is_empty() {
        return;
      }
      while batch.join_next().await.is_some() {}
    }
  }
}
