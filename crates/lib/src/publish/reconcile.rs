//! Reconciliation of the remote store against a completed publish.
//!
//! Objects that are in the store but were not part of the publish are marked
//! for deferred deletion with a tag. Nothing is ever deleted here; an external
//! lifecycle rule acts on the tag.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::storage::{ObjectStore, Tag};

use super::{CompletedManifest, PublishError, ReconcileReport, RemoteInventory};

/// Keys present remotely but absent from `published`.
pub fn deletion_candidates(inventory: &RemoteInventory, published: &BTreeSet<String>) -> BTreeSet<String> {
  inventory.keys().difference(published).cloned().collect()
}

/// `tags` with `marker` set, replacing any other value under the same key.
fn with_marker(mut tags: Vec<Tag>, marker: &Tag) -> Vec<Tag> {
  tags.retain(|(k, _)| k != &marker.0);
  tags.push(marker.clone());
  tags
}

enum Outcome {
  Tagged(String),
  AlreadyTagged(String),
}

/// Inspect every candidate and, when `apply` is set, tag those not yet marked.
async fn process_candidates(
  store: Arc<dyn ObjectStore>,
  candidates: BTreeSet<String>,
  marker: &Tag,
  concurrency: usize,
  apply: bool,
) -> Result<ReconcileReport, PublishError> {
  let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
  let mut join_set = JoinSet::new();

  for key in candidates {
    let store = store.clone();
    let semaphore = semaphore.clone();
    let marker = marker.clone();

    join_set.spawn(async move {
      let _permit = semaphore
        .acquire_owned()
        .await
        .map_err(|e| PublishError::Join(e.to_string()))?;

      let tags = store.get_tags(&key).await?;
      if tags.contains(&marker) {
        debug!(key = %key, "already marked for deletion");
        return Ok::<_, PublishError>(Outcome::AlreadyTagged(key));
      }

      if apply {
        store.set_tags(&key, &with_marker(tags, &marker)).await?;
        debug!(key = %key, "marked for deletion");
      }
      Ok(Outcome::Tagged(key))
    });
  }

  let mut report = ReconcileReport::default();
  while let Some(join_result) = join_set.join_next().await {
    let result = join_result.map_err(|e| PublishError::Join(e.to_string())).and_then(|r| r);
    match result {
      Ok(Outcome::Tagged(key)) => report.tagged.push(key),
      Ok(Outcome::AlreadyTagged(key)) => report.already_tagged.push(key),
      Err(e) => {
        join_set.abort_all();
        while join_set.join_next().await.is_some() {}
        return Err(e);
      }
    }
  }

  report.tagged.sort();
  report.already_tagged.sort();
  Ok(report)
}

/// Mark every deletion candidate with `marker`.
///
/// Candidates that already carry the marker get no mutating call, so running
/// this twice against the same inventory and manifest changes nothing the
/// second time. Other tags on a candidate are preserved.
pub async fn reconcile(
  store: Arc<dyn ObjectStore>,
  inventory: &RemoteInventory,
  manifest: &CompletedManifest,
  marker: &Tag,
  concurrency: usize,
) -> Result<ReconcileReport, PublishError> {
  let candidates = deletion_candidates(inventory, manifest.keys());
  info!(candidates = candidates.len(), "reconciling remote store");

  let report = process_candidates(store, candidates, marker, concurrency, true).await?;

  info!(
    tagged = report.tagged.len(),
    already_tagged = report.already_tagged.len(),
    "reconcile complete"
  );
  Ok(report)
}

/// Report what [`reconcile`] would do if `local` were published. Read-only.
pub async fn plan_reconcile(
  store: Arc<dyn ObjectStore>,
  inventory: &RemoteInventory,
  local: &BTreeSet<String>,
  marker: &Tag,
  concurrency: usize,
) -> Result<ReconcileReport, PublishError> {
  let candidates = deletion_candidates(inventory, local);
  process_candidates(store, candidates, marker, concurrency, false).await
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::storage::memory::StoredObject;
  use crate::storage::{MemoryStore, StorageError};
  use std::collections::BTreeMap;

  fn marker() -> Tag {
    ("sitepub-delete".to_string(), "true".to_string())
  }

  fn keys(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
  }

  fn manifest(items: &[&str]) -> CompletedManifest {
    CompletedManifest::new(keys(items), BTreeMap::new())
  }

  #[test]
  fn candidates_are_exact_difference() {
    let inventory = RemoteInventory::from_keys(keys(&["a", "b", "c"]));
    assert_eq!(deletion_candidates(&inventory, &keys(&["a", "b", "d"])), keys(&["c"]));
    assert!(deletion_candidates(&inventory, &keys(&["a", "b", "c"])).is_empty());
    assert!(deletion_candidates(&RemoteInventory::default(), &keys(&["a"])).is_empty());
  }

  #[test]
  fn marker_replaces_previous_value() {
    let tags = vec![
      ("owner".to_string(), "me".to_string()),
      ("sitepub-delete".to_string(), "false".to_string()),
    ];
    assert_eq!(
      with_marker(tags, &marker()),
      vec![("owner".to_string(), "me".to_string()), marker()]
    );
  }

  #[tokio::test]
  async fn tags_candidates_and_keeps_other_tags() {
    let store = Arc::new(MemoryStore::with_keys("bucket", ["a", "b"]));
    store.insert(
      "c",
      StoredObject {
        tags: vec![("owner".to_string(), "me".to_string())],
        ..Default::default()
      },
    );
    let inventory = RemoteInventory::from_keys(keys(&["a", "b", "c"]));

    let report = reconcile(store.clone(), &inventory, &manifest(&["a", "b"]), &marker(), 4)
      .await
      .unwrap();

    assert_eq!(report.tagged, vec!["c"]);
    assert!(report.already_tagged.is_empty());
    let tags = store.object("c").unwrap().tags;
    assert!(tags.contains(&marker()));
    assert!(tags.contains(&("owner".to_string(), "me".to_string())));
    assert!(store.object("c").is_some());
  }

  #[tokio::test]
  async fn second_run_makes_no_mutations() {
    let store = Arc::new(MemoryStore::with_keys("bucket", ["a", "stale1", "stale2"]));
    let inventory = RemoteInventory::from_keys(keys(&["a", "stale1", "stale2"]));
    let manifest = manifest(&["a"]);

    reconcile(store.clone(), &inventory, &manifest, &marker(), 4).await.unwrap();
    store.clear_events();

    let report = reconcile(store.clone(), &inventory, &manifest, &marker(), 4).await.unwrap();

    assert!(report.tagged.is_empty());
    assert_eq!(report.already_tagged, vec!["stale1", "stale2"]);
    assert!(store.events().iter().all(|e| !e.is_mutation()));
  }

  #[tokio::test]
  async fn failed_tag_read_aborts() {
    // "gone" is listed but vanished before its tags were read.
    let store = Arc::new(MemoryStore::with_keys("bucket", ["a"]));
    let inventory = RemoteInventory::from_keys(keys(&["a", "gone"]));

    let err = reconcile(store.clone(), &inventory, &manifest(&["a"]), &marker(), 4)
      .await
      .unwrap_err();

    assert!(matches!(err, PublishError::Storage(StorageError::GetTags { key, .. }) if key == "gone"));
    assert!(store.tagged().is_empty());
  }

  #[tokio::test]
  async fn failed_tag_write_aborts() {
    let store = Arc::new(MemoryStore::with_keys("bucket", ["a", "b"]));
    store.fail_tag("b");
    let inventory = RemoteInventory::from_keys(keys(&["a", "b"]));

    let err = reconcile(store.clone(), &inventory, &manifest(&[]), &marker(), 1)
      .await
      .unwrap_err();

    assert!(matches!(err, PublishError::Storage(StorageError::Tag { key, .. }) if key == "b"));
    assert!(store.object("b").unwrap().tags.is_empty());
  }

  #[tokio::test]
  async fn plan_is_read_only() {
    let store = Arc::new(MemoryStore::with_keys("bucket", ["a", "old"]));
    let inventory = RemoteInventory::from_keys(keys(&["a", "old"]));

    let report = plan_reconcile(store.clone(), &inventory, &keys(&["a"]), &marker(), 4)
      .await
      .unwrap();

    assert_eq!(report.tagged, vec!["old"]);
    assert!(store.tagged().is_empty());
    assert!(store.object("old").unwrap().tags.is_empty());
  }
}
