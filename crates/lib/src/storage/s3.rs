//! S3-backed object store.

use async_trait::async_trait;
use s3::Bucket;
use s3::Region;
use s3::creds::Credentials;
use tracing::debug;

use crate::config::PublishConfig;
use crate::consts::LIST_PAGE_SIZE;

use super::{ListPage, ObjectStore, StorageError, Tag};

/// An S3 bucket, or an S3-compatible store when an endpoint is configured.
///
/// Credentials come from the standard AWS environment variables or profile.
pub struct S3Store {
  bucket: Box<Bucket>,
}

fn is_success(status: u16) -> bool {
  (200..300).contains(&status)
}

impl S3Store {
  pub fn new(config: &PublishConfig) -> Result<Self, StorageError> {
    let region = match &config.endpoint {
      Some(endpoint) => Region::Custom {
        region: config.region.clone(),
        endpoint: endpoint.clone(),
      },
      None => config
        .region
        .parse::<Region>()
        .map_err(|e| StorageError::Config(format!("invalid region {}: {}", config.region, e)))?,
    };

    let credentials = Credentials::default().map_err(|e| StorageError::Config(e.to_string()))?;
    let bucket = Bucket::new(&config.bucket, region, credentials).map_err(|e| StorageError::Config(e.to_string()))?;

    let bucket = if config.endpoint.is_some() {
      bucket.with_path_style()
    } else {
      bucket
    };

    Ok(Self { bucket })
  }
}

#[async_trait]
impl ObjectStore for S3Store {
  fn location(&self) -> String {
    format!("s3://{}", self.bucket.name())
  }

  async fn list_page(&self) -> Result<ListPage, StorageError> {
    let (result, status) = self
      .bucket
      .list_page(String::new(), None, None, None, Some(LIST_PAGE_SIZE))
      .await
      .map_err(|e| StorageError::List(e.to_string()))?;

    if !is_success(status) {
      return Err(StorageError::List(format!("HTTP {}", status)));
    }

    debug!(keys = result.contents.len(), truncated = result.is_truncated, "listed bucket");

    Ok(ListPage {
      keys: result.contents.into_iter().map(|o| o.key).collect(),
      truncated: result.is_truncated,
    })
  }

  async fn put_object(
    &self,
    key: &str,
    body: Vec<u8>,
    content_type: &str,
    cache_control: &str,
  ) -> Result<(), StorageError> {
    let mut bucket = (*self.bucket).clone();
    bucket.add_header("Cache-Control", cache_control);

    let response = bucket
      .put_object_with_content_type(key, &body, content_type)
      .await
      .map_err(|e| StorageError::Put {
        key: key.to_string(),
        message: e.to_string(),
      })?;

    if !is_success(response.status_code()) {
      return Err(StorageError::Put {
        key: key.to_string(),
        message: format!("HTTP {}", response.status_code()),
      });
    }

    Ok(())
  }

  async fn get_tags(&self, key: &str) -> Result<Vec<Tag>, StorageError> {
    let (tags, status) = self
      .bucket
      .get_object_tagging(key)
      .await
      .map_err(|e| StorageError::GetTags {
        key: key.to_string(),
        message: e.to_string(),
      })?;

    if !is_success(status) {
      return Err(StorageError::GetTags {
        key: key.to_string(),
        message: format!("HTTP {}", status),
      });
    }

    Ok(tags.into_iter().map(|t| (t.key(), t.value())).collect())
  }

  async fn set_tags(&self, key: &str, tags: &[Tag]) -> Result<(), StorageError> {
    let pairs: Vec<(&str, &str)> = tags.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();

    let response = self
      .bucket
      .put_object_tagging(key, &pairs)
      .await
      .map_err(|e| StorageError::Tag {
        key: key.to_string(),
        message: e.to_string(),
      })?;

    if !is_success(response.status_code()) {
      return Err(StorageError::Tag {
        key: key.to_string(),
        message: format!("HTTP {}", response.status_code()),
      });
    }

    Ok(())
  }
}
