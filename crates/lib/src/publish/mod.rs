//! Publishing a build output to object storage.
//!
//! A run has three phases, strictly in order:
//!
//! 1. read the remote inventory (fails on a truncated listing, before anything
//!    is uploaded)
//! 2. upload the output in stages: static resources, then pages, then metadata
//! 3. mark remote objects that were not uploaded for deferred deletion
//!
//! Reconciliation only runs after every stage completed.

pub mod inventory;
pub mod policy;
pub mod reconcile;
pub mod types;
pub mod upload;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::info;

use crate::build::BuildOutput;
use crate::config::PublishConfig;
use crate::storage::ObjectStore;

pub use inventory::read_inventory;
pub use policy::{ResourceClass, classify, content_type};
pub use reconcile::{deletion_candidates, plan_reconcile, reconcile};
pub use types::{CompletedManifest, PublishError, PublishPlan, PublishReport, ReconcileReport, RemoteInventory};
pub use upload::publish_output;

/// Publish `output` to `store` and reconcile.
pub async fn publish_site(
  store: Arc<dyn ObjectStore>,
  output: &BuildOutput,
  config: &PublishConfig,
) -> Result<PublishReport, PublishError> {
  let location = store.location();
  info!(location = %location, files = output.files.len(), "publishing");

  let inventory = read_inventory(store.as_ref()).await?;
  let manifest = publish_output(store.clone(), output, config).await?;
  let marked = reconcile(store, &inventory, &manifest, &config.delete_tag(), config.concurrency).await?;

  info!(
    location = %location,
    uploaded = manifest.len(),
    tagged = marked.tagged.len(),
    "publish complete"
  );

  Ok(PublishReport {
    location,
    inventory: inventory.len(),
    manifest,
    reconcile: marked,
  })
}

/// Preview [`publish_site`] without mutating the store.
pub async fn plan_publish(
  store: Arc<dyn ObjectStore>,
  output: &BuildOutput,
  config: &PublishConfig,
) -> Result<PublishPlan, PublishError> {
  let location = store.location();
  let inventory = read_inventory(store.as_ref()).await?;

  let mut uploads = BTreeMap::new();
  for class in ResourceClass::ORDER {
    let count = output.files_of(class).count();
    if count > 0 {
      uploads.insert(class, count);
    }
  }

  let local: BTreeSet<String> = output.files.iter().map(|f| f.key.clone()).collect();
  let (overwritten, added): (Vec<String>, Vec<String>) =
    local.iter().cloned().partition(|key| inventory.contains(key));

  let reconcile = plan_reconcile(store, &inventory, &local, &config.delete_tag(), config.concurrency).await?;

  Ok(PublishPlan {
    location,
    inventory: inventory.len(),
    uploads,
    added,
    overwritten,
    reconcile,
  })
}
