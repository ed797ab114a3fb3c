use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::storage::StorageError;

use super::policy::ResourceClass;

#[derive(Debug, Error)]
pub enum PublishError {
  #[error(transparent)]
  Storage(#[from] StorageError),

  #[error("remote listing is truncated after {count} keys; refusing to publish against a partial inventory")]
  TruncatedListing { count: usize },

  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("upload task failed: {0}")]
  Join(String),
}

/// Keys present in the remote store before publishing.
///
/// Only ever constructed from a complete listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RemoteInventory {
  keys: BTreeSet<String>,
}

impl RemoteInventory {
  pub(crate) fn from_keys<I: IntoIterator<Item = String>>(keys: I) -> Self {
    Self {
      keys: keys.into_iter().collect(),
    }
  }

  pub fn keys(&self) -> &BTreeSet<String> {
    &self.keys
  }

  pub fn contains(&self, key: &str) -> bool {
    self.keys.contains(key)
  }

  pub fn len(&self) -> usize {
    self.keys.len()
  }

  pub fn is_empty(&self) -> bool {
    self.keys.is_empty()
  }
}

/// Keys uploaded by a publish run that finished every stage.
///
/// There is no public constructor: the only way to get one is a successful
/// [`publish_output`](super::publish_output), so reconciliation can never run
/// against a partial upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletedManifest {
  keys: BTreeSet<String>,
  per_class: BTreeMap<ResourceClass, usize>,
}

impl CompletedManifest {
  pub(crate) fn new(keys: BTreeSet<String>, per_class: BTreeMap<ResourceClass, usize>) -> Self {
    Self { keys, per_class }
  }

  pub fn keys(&self) -> &BTreeSet<String> {
    &self.keys
  }

  pub fn contains(&self, key: &str) -> bool {
    self.keys.contains(key)
  }

  pub fn len(&self) -> usize {
    self.keys.len()
  }

  pub fn is_empty(&self) -> bool {
    self.keys.is_empty()
  }

  /// Number of uploads in a stage.
  pub fn count(&self, class: ResourceClass) -> usize {
    self.per_class.get(&class).copied().unwrap_or(0)
  }
}

/// Outcome of marking deletion candidates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
  /// Candidates that received the marker in this run.
  pub tagged: Vec<String>,
  /// Candidates that already carried the marker and were left alone.
  pub already_tagged: Vec<String>,
}

impl ReconcileReport {
  pub fn candidates(&self) -> usize {
    self.tagged.len() + self.already_tagged.len()
  }
}

/// Outcome of a full publish run.
#[derive(Debug, Clone, Serialize)]
pub struct PublishReport {
  pub location: String,
  pub inventory: usize,
  pub manifest: CompletedManifest,
  pub reconcile: ReconcileReport,
}

/// What a publish run would do, computed without mutating the store.
#[derive(Debug, Clone, Serialize)]
pub struct PublishPlan {
  pub location: String,
  pub inventory: usize,
  /// Number of uploads per stage.
  pub uploads: BTreeMap<ResourceClass, usize>,
  /// Local keys not yet in the store.
  pub added: Vec<String>,
  /// Local keys that would overwrite an existing object.
  pub overwritten: Vec<String>,
  /// Deletion candidates; `tagged` holds those that would be marked.
  pub reconcile: ReconcileReport,
}

impl PublishPlan {
  pub fn upload_count(&self) -> usize {
    self.uploads.values().sum()
  }
}
