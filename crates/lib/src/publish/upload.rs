//! Staged upload of a build output.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::build::{BuildOutput, OutputFile};
use crate::config::PublishConfig;
use crate::storage::ObjectStore;

use super::policy::{ResourceClass, content_type};
use super::{CompletedManifest, PublishError};

/// Upload every file of `output`, one resource class at a time.
///
/// Stages run in [`ResourceClass::ORDER`]. A stage starts only after every
/// upload of the previous stage has completed. Within a stage at most
/// `config.concurrency` uploads are in flight and their order is unspecified.
///
/// The first failed upload aborts the remaining uploads of its stage and the
/// whole run; nothing is retried.
pub async fn publish_output(
  store: Arc<dyn ObjectStore>,
  output: &BuildOutput,
  config: &PublishConfig,
) -> Result<CompletedManifest, PublishError> {
  let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));
  let mut keys = BTreeSet::new();
  let mut per_class = BTreeMap::new();

  for class in ResourceClass::ORDER {
    let files: Vec<OutputFile> = output.files_of(class).cloned().collect();
    if files.is_empty() {
      debug!(stage = %class, "nothing to upload");
      continue;
    }

    info!(stage = %class, files = files.len(), "uploading stage");
    let uploaded = upload_stage(
      store.clone(),
      &output.out_dir,
      &files,
      &config.cache_control(class),
      semaphore.clone(),
    )
    .await?;

    per_class.insert(class, uploaded.len());
    keys.extend(uploaded);
    info!(stage = %class, "stage complete");
  }

  Ok(CompletedManifest::new(keys, per_class))
}

/// Upload one stage. Returns only once every upload has finished.
async fn upload_stage(
  store: Arc<dyn ObjectStore>,
  out_dir: &Path,
  files: &[OutputFile],
  cache_control: &str,
  semaphore: Arc<Semaphore>,
) -> Result<Vec<String>, PublishError> {
  let mut join_set = JoinSet::new();

  for file in files {
    let store = store.clone();
    let semaphore = semaphore.clone();
    let key = file.key.clone();
    let path: PathBuf = out_dir.join(&file.key);
    let cache_control = cache_control.to_string();

    join_set.spawn(async move {
      let _permit = semaphore
        .acquire_owned()
        .await
        .map_err(|e| PublishError::Join(e.to_string()))?;

      let body = tokio::fs::read(&path)
        .await
        .map_err(|source| PublishError::Read { path, source })?;
      let content_type = content_type(&key);

      debug!(key = %key, bytes = body.len(), content_type = %content_type, "uploading");
      store.put_object(&key, body, &content_type, &cache_control).await?;

      Ok::<_, PublishError>(key)
    });
  }

  let mut uploaded = Vec::with_capacity(files.len());

  while let Some(join_result) = join_set.join_next().await {
    let result = join_result.map_err(|e| PublishError::Join(e.to_string())).and_then(|r| r);
    match result {
      Ok(key) => uploaded.push(key),
      Err(e) => {
        error!(error = %e, "upload failed, aborting stage");
        join_set.abort_all();
        while join_set.join_next().await.is_some() {}
        return Err(e);
      }
    }
  }

  Ok(uploaded)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::build::build_site;
  use crate::storage::MemoryStore;
  use crate::storage::memory::StoreEvent;
  use crate::publish::policy::classify;
  use crate::util::testutil::sample_site;
  use tempfile::TempDir;

  fn config() -> PublishConfig {
    PublishConfig::for_bucket("bucket", "us-east-1")
  }

  #[tokio::test]
  async fn uploads_every_file_with_class_policy() {
    let temp = TempDir::new().unwrap();
    let site = sample_site(temp.path());
    let output = build_site(&site).unwrap();
    let store = Arc::new(MemoryStore::new("bucket"));

    let manifest = publish_output(store.clone(), &output, &config()).await.unwrap();

    assert_eq!(manifest.len(), output.files.len());
    for file in &output.files {
      let object = store.object(&file.key).unwrap();
      let expected = if file.class == ResourceClass::Static {
        "public, max-age=604800"
      } else {
        "public, max-age=300"
      };
      assert_eq!(object.cache_control, expected, "{}", file.key);
    }
    assert_eq!(
      store.object("index.html").unwrap().content_type,
      "text/html; charset=utf-8"
    );
  }

  #[tokio::test]
  async fn stages_do_not_overlap() {
    let temp = TempDir::new().unwrap();
    let site = sample_site(temp.path());
    let output = build_site(&site).unwrap();
    let store = Arc::new(MemoryStore::new("bucket").with_latency(std::time::Duration::from_millis(5)));

    publish_output(store.clone(), &output, &config()).await.unwrap();

    let events = store.events();
    let class_of = |e: &StoreEvent| match e {
      StoreEvent::PutStarted(k) | StoreEvent::PutFinished(k) => Some(classify(k)),
      _ => None,
    };

    for pair in ResourceClass::ORDER.windows(2) {
      let (earlier, later) = (pair[0], pair[1]);
      let last_finish = events
        .iter()
        .rposition(|e| matches!(e, StoreEvent::PutFinished(_)) && class_of(e) == Some(earlier))
        .unwrap();
      let first_start = events
        .iter()
        .position(|e| matches!(e, StoreEvent::PutStarted(_)) && class_of(e) == Some(later))
        .unwrap();
      assert!(last_finish < first_start, "{} started before {} finished", later, earlier);
    }
  }

  #[tokio::test]
  async fn failure_aborts_before_next_stage() {
    let temp = TempDir::new().unwrap();
    let site = sample_site(temp.path());
    let output = build_site(&site).unwrap();
    let store = Arc::new(MemoryStore::new("bucket"));
    let static_key = output.files_of(ResourceClass::Static).next().unwrap().key.clone();
    store.fail_put(&static_key);

    let err = publish_output(store.clone(), &output, &config()).await.unwrap_err();

    assert!(matches!(err, PublishError::Storage(_)));
    assert!(
      store
        .uploaded()
        .iter()
        .all(|k| classify(k) == ResourceClass::Static)
    );
  }
}
