//! Object storage.
//!
//! The publish pipeline talks to remote storage through [`ObjectStore`]. Object
//! keys are output paths relative to the output directory. Each object carries
//! its bytes, a content type, a `Cache-Control` value and a tag set; the tag set
//! is where the deferred-deletion marker lives.
//!
//! Implementations:
//! - [`s3::S3Store`]: an S3 (or S3-compatible) bucket
//! - [`memory::MemoryStore`]: in-process store that records every call

pub mod memory;
pub mod s3;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryStore;
pub use s3::S3Store;

/// A tag on a stored object.
pub type Tag = (String, String);

#[derive(Debug, Error)]
pub enum StorageError {
  #[error("invalid storage configuration: {0}")]
  Config(String),

  #[error("failed to list objects: {0}")]
  List(String),

  #[error("failed to upload {key}: {message}")]
  Put { key: String, message: String },

  #[error("failed to read tags of {key}: {message}")]
  GetTags { key: String, message: String },

  #[error("failed to tag {key}: {message}")]
  Tag { key: String, message: String },
}

/// One page of a bucket listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
  pub keys: Vec<String>,
  /// More objects exist than this page holds.
  pub truncated: bool,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
  /// Human-readable location, e.g. `s3://bucket`.
  fn location(&self) -> String;

  /// List the first page of keys in the store.
  async fn list_page(&self) -> Result<ListPage, StorageError>;

  /// Upload an object, unconditionally overwriting any existing object.
  async fn put_object(
    &self,
    key: &str,
    body: Vec<u8>,
    content_type: &str,
    cache_control: &str,
  ) -> Result<(), StorageError>;

  /// Read the tag set of an object.
  async fn get_tags(&self, key: &str) -> Result<Vec<Tag>, StorageError>;

  /// Replace the tag set of an object in place. Content and other metadata are
  /// left untouched.
  async fn set_tags(&self, key: &str, tags: &[Tag]) -> Result<(), StorageError>;
}
