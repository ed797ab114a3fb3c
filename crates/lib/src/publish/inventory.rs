//! Remote inventory: what is in the store before publishing.

use tracing::{debug, error};

use crate::storage::ObjectStore;

use super::{PublishError, RemoteInventory};

/// Read the set of keys in the store.
///
/// Only a single listing page is read. If the store reports more objects than
/// the page holds, the inventory would be incomplete and reconciliation would
/// miss stale objects, so this fails instead.
pub async fn read_inventory(store: &dyn ObjectStore) -> Result<RemoteInventory, PublishError> {
  let page = store.list_page().await?;

  if page.truncated {
    error!(
      location = %store.location(),
      count = page.keys.len(),
      "remote listing is truncated"
    );
    return Err(PublishError::TruncatedListing { count: page.keys.len() });
  }

  debug!(location = %store.location(), keys = page.keys.len(), "read remote inventory");
  Ok(RemoteInventory::from_keys(page.keys))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::storage::MemoryStore;
  use tracing_test::traced_test;

  #[tokio::test]
  async fn reads_all_keys() {
    let store = MemoryStore::with_keys("bucket", ["index.html", "assets/styles/0a.css"]);
    let inventory = read_inventory(&store).await.unwrap();
    assert_eq!(inventory.len(), 2);
    assert!(inventory.contains("index.html"));
  }

  #[tokio::test]
  async fn empty_store_is_empty_inventory() {
    let store = MemoryStore::new("bucket");
    assert!(read_inventory(&store).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn truncated_listing_fails() {
    let store = MemoryStore::with_keys("bucket", ["a", "b"]);
    store.set_truncated(true);

    let err = read_inventory(&store).await.unwrap_err();
    assert!(matches!(err, PublishError::TruncatedListing { count: 2 }));
  }

  #[tokio::test]
  #[traced_test]
  async fn truncated_listing_is_logged() {
    let store = MemoryStore::with_keys("bucket", ["a"]);
    store.set_truncated(true);

    assert!(read_inventory(&store).await.is_err());
    assert!(logs_contain("remote listing is truncated"));
    assert!(logs_contain("memory://bucket"));
  }
}
