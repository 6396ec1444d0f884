//! Versioned partition naming and stale partition pruning.

use color_eyre::Result;
use tracing::{debug, warn};

use crate::cache::{CacheStorage, CacheStore};

/// Names of the two partitions owned by one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionNames {
  pub static_name: String,
  pub runtime_name: String,
}

impl PartitionNames {
  /// Derive `<prefix>-static-<version>` and `<prefix>-runtime-<version>`.
  pub fn derive(app_prefix: &str, version: &str) -> Self {
    Self {
      static_name: format!("{}-static-{}", app_prefix, version),
      runtime_name: format!("{}-runtime-{}", app_prefix, version),
    }
  }

  pub fn is_current(&self, name: &str) -> bool {
    name == self.static_name || name == self.runtime_name
  }
}

/// Outcome of pruning at activation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationReport {
  /// Stale partitions removed
  pub deleted: Vec<String>,
  /// Stale partitions whose deletion failed; retried at the next activation
  pub failed: Vec<String>,
}

/// Delete every partition not owned by the current version.
///
/// Deletions run concurrently and independently. A failed deletion is recorded, not fatal.
pub async fn prune_stale<S: CacheStorage>(
  store: &CacheStore<S>,
  names: &PartitionNames,
) -> Result<ActivationReport> {
  let stale: Vec<String> = store
    .keys()
    .await?
    .into_iter()
    .filter(|name| !names.is_current(name))
    .collect();

  let outcomes = futures::future::join_all(stale.into_iter().map(|name| async move {
    let outcome = store.delete(&name).await;
    (name, outcome)
  }))
  .await;

  let mut report = ActivationReport::default();
  for (name, outcome) in outcomes {
    match outcome {
      Ok(_) => {
        debug!(partition = %name, "deleted stale partition");
        report.deleted.push(name);
      }
      Err(e) => {
        warn!(partition = %name, error = %e, "failed to delete stale partition");
        report.failed.push(name);
      }
    }
  }

  Ok(report)
}
