//! In-memory object store.
//!
//! Backs the publish tests. Every call is appended to an event log so callers
//! can assert ordering, and the number of concurrent uploads is tracked.
//! Failures can be injected per key for uploads and for tag writes.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{ListPage, ObjectStore, StorageError, Tag};

/// An object held by [`MemoryStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredObject {
  pub body: Vec<u8>,
  pub content_type: String,
  pub cache_control: String,
  pub tags: Vec<Tag>,
}

/// A recorded store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
  List,
  PutStarted(String),
  PutFinished(String),
  GetTags(String),
  SetTags(String),
}

impl StoreEvent {
  pub fn is_mutation(&self) -> bool {
    matches!(self, StoreEvent::PutStarted(_) | StoreEvent::PutFinished(_) | StoreEvent::SetTags(_))
  }
}

#[derive(Debug, Default)]
struct State {
  objects: BTreeMap<String, StoredObject>,
  events: Vec<StoreEvent>,
  truncated: bool,
  failing_puts: BTreeSet<String>,
  failing_tags: BTreeSet<String>,
  in_flight: usize,
  max_in_flight: usize,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
  name: String,
  state: Mutex<State>,
  latency: Option<Duration>,
}

impl MemoryStore {
  pub fn new(name: &str) -> Self {
    Self {
      name: name.to_string(),
      ..Default::default()
    }
  }

  /// A store holding empty objects under `keys`.
  pub fn with_keys<I, S>(name: &str, keys: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let store = Self::new(name);
    {
      let mut state = store.lock();
      for key in keys {
        state.objects.insert(key.into(), StoredObject::default());
      }
    }
    store
  }

  /// Hold every upload and tag write for `latency` so concurrent calls overlap.
  pub fn with_latency(mut self, latency: Duration) -> Self {
    self.latency = Some(latency);
    self
  }

  /// Report every listing as truncated.
  pub fn set_truncated(&self, truncated: bool) {
    self.lock().truncated = truncated;
  }

  /// Make uploads of `key` fail.
  pub fn fail_put(&self, key: &str) {
    self.lock().failing_puts.insert(key.to_string());
  }

  /// Make tag writes on `key` fail.
  pub fn fail_tag(&self, key: &str) {
    self.lock().failing_tags.insert(key.to_string());
  }

  pub fn insert(&self, key: &str, object: StoredObject) {
    self.lock().objects.insert(key.to_string(), object);
  }

  pub fn object(&self, key: &str) -> Option<StoredObject> {
    self.lock().objects.get(key).cloned()
  }

  pub fn keys(&self) -> Vec<String> {
    self.lock().objects.keys().cloned().collect()
  }

  /// All recorded calls, in order.
  pub fn events(&self) -> Vec<StoreEvent> {
    self.lock().events.clone()
  }

  /// Keys that were uploaded, in completion order.
  pub fn uploaded(&self) -> Vec<String> {
    self
      .lock()
      .events
      .iter()
      .filter_map(|e| match e {
        StoreEvent::PutFinished(key) => Some(key.clone()),
        _ => None,
      })
      .collect()
  }

  /// Keys whose tags were written, in order.
  pub fn tagged(&self) -> Vec<String> {
    self
      .lock()
      .events
      .iter()
      .filter_map(|e| match e {
        StoreEvent::SetTags(key) => Some(key.clone()),
        _ => None,
      })
      .collect()
  }

  /// Highest number of uploads observed in flight at once.
  pub fn max_in_flight(&self) -> usize {
    self.lock().max_in_flight
  }

  pub fn clear_events(&self) {
    self.lock().events.clear();
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, State> {
    // A poisoned lock only means a test panicked mid-call; the data is still usable.
    self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }
}

#[async_trait]
impl ObjectStore for MemoryStore {
  fn location(&self) -> String {
    format!("memory://{}", self.name)
  }

  async fn list_page(&self) -> Result<ListPage, StorageError> {
    let mut state = self.lock();
    state.events.push(StoreEvent::List);
    Ok(ListPage {
      keys: state.objects.keys().cloned().collect(),
      truncated: state.truncated,
    })
  }

  async fn put_object(
    &self,
    key: &str,
    body: Vec<u8>,
    content_type: &str,
    cache_control: &str,
  ) -> Result<(), StorageError> {
    {
      let mut state = self.lock();
      state.events.push(StoreEvent::PutStarted(key.to_string()));
      state.in_flight += 1;
      state.max_in_flight = state.max_in_flight.max(state.in_flight);
    }

    match self.latency {
      Some(latency) => tokio::time::sleep(latency).await,
      None => tokio::task::yield_now().await,
    }

    let mut state = self.lock();
    state.in_flight -= 1;

    if state.failing_puts.contains(key) {
      return Err(StorageError::Put {
        key: key.to_string(),
        message: "injected failure".to_string(),
      });
    }

    state.objects.insert(
      key.to_string(),
      StoredObject {
        body,
        content_type: content_type.to_string(),
        cache_control: cache_control.to_string(),
        tags: Vec::new(),
      },
    );
    state.events.push(StoreEvent::PutFinished(key.to_string()));
    Ok(())
  }

  async fn get_tags(&self, key: &str) -> Result<Vec<Tag>, StorageError> {
    let mut state = self.lock();
    state.events.push(StoreEvent::GetTags(key.to_string()));
    match state.objects.get(key) {
      Some(object) => Ok(object.tags.clone()),
      None => Err(StorageError::GetTags {
        key: key.to_string(),
        message: "no such key".to_string(),
      }),
    }
  }

  async fn set_tags(&self, key: &str, tags: &[Tag]) -> Result<(), StorageError> {
    {
      let mut state = self.lock();
      state.events.push(StoreEvent::SetTags(key.to_string()));
      if state.failing_tags.contains(key) {
        return Err(StorageError::Tag {
          key: key.to_string(),
          message: "injected failure".to_string(),
        });
      }
    }

    if let Some(latency) = self.latency {
      tokio::time::sleep(latency).await;
    }

    let mut state = self.lock();
    match state.objects.get_mut(key) {
      Some(object) => {
        object.tags = tags.to_vec();
        Ok(())
      }
      None => Err(StorageError::Tag {
        key: key.to_string(),
        message: "no such key".to_string(),
      }),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn put_overwrites_and_clears_tags() {
    let store = MemoryStore::with_keys("test", ["a.html"]);
    store
      .set_tags("a.html", &[("k".to_string(), "v".to_string())])
      .await
      .unwrap();

    store
      .put_object("a.html", b"new".to_vec(), "text/html", "public, max-age=300")
      .await
      .unwrap();

    let object = store.object("a.html").unwrap();
    assert_eq!(object.body, b"new");
    assert_eq!(object.cache_control, "public, max-age=300");
    assert!(object.tags.is_empty());
  }

  #[tokio::test]
  async fn injected_failure_leaves_object_untouched() {
    let store = MemoryStore::new("test");
    store.fail_put("x.css");

    let err = store.put_object("x.css", vec![1], "text/css", "c").await.unwrap_err();
    assert!(matches!(err, StorageError::Put { key, .. } if key == "x.css"));
    assert!(store.object("x.css").is_none());
    assert!(store.uploaded().is_empty());
  }

  #[tokio::test]
  async fn injected_tag_failure_keeps_existing_tags() {
    let store = MemoryStore::new("test");
    store.insert(
      "old.html",
      StoredObject {
        tags: vec![("owner".to_string(), "me".to_string())],
        ..Default::default()
      },
    );
    store.fail_tag("old.html");

    let err = store.set_tags("old.html", &[]).await.unwrap_err();
    assert!(matches!(err, StorageError::Tag { key, .. } if key == "old.html"));
    assert_eq!(store.object("old.html").unwrap().tags.len(), 1);
  }

  #[tokio::test]
  async fn listing_reports_truncation() {
    let store = MemoryStore::with_keys("test", ["b", "a"]);
    store.set_truncated(true);

    let page = store.list_page().await.unwrap();
    assert_eq!(page.keys, vec!["a", "b"]);
    assert!(page.truncated);
  }

  #[tokio::test]
  async fn tagging_missing_key_fails() {
    let store = MemoryStore::new("test");
    assert!(store.set_tags("nope", &[]).await.is_err());
    assert!(store.get_tags("nope").await.is_err());
  }
}
