//! Site configuration.
//!
//! The configuration lives in `sitepub.toml` at the site root:
//!
//! ```toml
//! [site]
//! name = "Example"
//! url = "https://example.com"
//!
//! [publish]
//! bucket = "example.com"
//! region = "eu-west-1"
//!
//! [[remote_assets]]
//! url = "https://example.com/fonts/font-0123abcd.woff"
//! sha256 = "..."
//! dest = "_assets/fonts"
//! rename = ["(.+)-.+\\.woff$", "$1.woff"]
//! ```
//!
//! Relative `source` and `output` paths are resolved against the directory
//! containing the config file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::{
  DEFAULT_CONCURRENCY, DELETE_TAG_KEY, DELETE_TAG_VALUE, LONG_CACHE_SECONDS, SHORT_CACHE_SECONDS,
};
use crate::publish::policy::ResourceClass;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse config {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[error("invalid config: {0}")]
  Invalid(String),
}

/// Complete configuration for one site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
  pub site: SiteSection,

  #[serde(default)]
  pub publish: Option<PublishConfig>,

  #[serde(default)]
  pub remote_assets: Vec<RemoteAsset>,

  /// Directory containing the config file. Not part of the file itself.
  #[serde(skip)]
  pub root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteSection {
  pub name: String,

  /// Base URL without a trailing slash, e.g. `https://example.com`.
  pub url: String,

  #[serde(default = "default_source")]
  pub source: PathBuf,

  #[serde(default = "default_output")]
  pub output: PathBuf,

  /// Templates directory, relative to `source`.
  #[serde(default = "default_templates")]
  pub templates: PathBuf,

  /// Posts directory, relative to `source`.
  #[serde(default = "default_posts")]
  pub posts: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublishConfig {
  pub bucket: String,
  pub region: String,

  /// Custom endpoint for S3-compatible stores.
  #[serde(default)]
  pub endpoint: Option<String>,

  #[serde(default = "default_concurrency")]
  pub concurrency: usize,

  #[serde(default = "default_long_cache")]
  pub long_cache_seconds: u64,

  #[serde(default = "default_short_cache")]
  pub short_cache_seconds: u64,

  #[serde(default = "default_delete_tag_key")]
  pub delete_tag_key: String,

  #[serde(default = "default_delete_tag_value")]
  pub delete_tag_value: String,
}

/// A binary asset that is downloaded into the source tree instead of being
/// kept in the repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteAsset {
  pub url: String,

  /// Expected SHA-256 of the downloaded bytes (lowercase hex).
  pub sha256: String,

  /// Destination directory, relative to the source directory.
  pub dest: PathBuf,

  /// Optional `[pattern, replacement]` applied to the file name taken from the URL.
  #[serde(default)]
  pub rename: Option<(String, String)>,
}

fn default_source() -> PathBuf {
  PathBuf::from("src")
}

fn default_output() -> PathBuf {
  PathBuf::from("_site")
}

fn default_templates() -> PathBuf {
  PathBuf::from("_layouts")
}

fn default_posts() -> PathBuf {
  PathBuf::from("_posts")
}

fn default_concurrency() -> usize {
  DEFAULT_CONCURRENCY
}

fn default_long_cache() -> u64 {
  LONG_CACHE_SECONDS
}

fn default_short_cache() -> u64 {
  SHORT_CACHE_SECONDS
}

fn default_delete_tag_key() -> String {
  DELETE_TAG_KEY.to_string()
}

fn default_delete_tag_value() -> String {
  DELETE_TAG_VALUE.to_string()
}

impl SiteConfig {
  /// Load and validate a config file.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;

    let mut config: SiteConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })?;

    config.root = path
      .parent()
      .filter(|p| !p.as_os_str().is_empty())
      .map(Path::to_path_buf)
      .unwrap_or_else(|| PathBuf::from("."));

    config.validate()?;
    Ok(config)
  }

  /// A config rooted at `root` with default layout and no publish target.
  pub fn default_for(root: &Path, name: &str, url: &str) -> Self {
    Self {
      site: SiteSection {
        name: name.to_string(),
        url: url.to_string(),
        source: default_source(),
        output: default_output(),
        templates: default_templates(),
        posts: default_posts(),
      },
      publish: None,
      remote_assets: Vec::new(),
      root: root.to_path_buf(),
    }
  }

  fn validate(&self) -> Result<(), ConfigError> {
    if self.site.url.ends_with('/') {
      return Err(ConfigError::Invalid(format!(
        "site.url must not end with '/': {}",
        self.site.url
      )));
    }

    if let Some(publish) = &self.publish {
      if publish.bucket.is_empty() {
        return Err(ConfigError::Invalid("publish.bucket must not be empty".to_string()));
      }
      if publish.concurrency == 0 {
        return Err(ConfigError::Invalid("publish.concurrency must be at least 1".to_string()));
      }
    }

    for asset in &self.remote_assets {
      if asset.sha256.len() != 64 || !asset.sha256.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ConfigError::Invalid(format!(
          "remote asset {} has an invalid sha256",
          asset.url
        )));
      }
    }

    Ok(())
  }

  pub fn source_dir(&self) -> PathBuf {
    self.root.join(&self.site.source)
  }

  pub fn output_dir(&self) -> PathBuf {
    self.root.join(&self.site.output)
  }

  pub fn templates_dir(&self) -> PathBuf {
    self.source_dir().join(&self.site.templates)
  }

  pub fn posts_dir(&self) -> PathBuf {
    self.source_dir().join(&self.site.posts)
  }

  /// The publish section, or an error naming what is missing.
  pub fn publish_config(&self) -> Result<&PublishConfig, ConfigError> {
    self
      .publish
      .as_ref()
      .ok_or_else(|| ConfigError::Invalid("missing [publish] section".to_string()))
  }
}

impl PublishConfig {
  /// A config for the given bucket with every other field at its default.
  pub fn for_bucket(bucket: &str, region: &str) -> Self {
    Self {
      bucket: bucket.to_string(),
      region: region.to_string(),
      endpoint: None,
      concurrency: default_concurrency(),
      long_cache_seconds: default_long_cache(),
      short_cache_seconds: default_short_cache(),
      delete_tag_key: default_delete_tag_key(),
      delete_tag_value: default_delete_tag_value(),
    }
  }

  /// `Cache-Control` header value for a resource class.
  pub fn cache_control(&self, class: ResourceClass) -> String {
    let seconds = if class.is_long_lived() {
      self.long_cache_seconds
    } else {
      self.short_cache_seconds
    };
    format!("public, max-age={}", seconds)
  }

  pub fn delete_tag(&self) -> (String, String) {
    (self.delete_tag_key.clone(), self.delete_tag_value.clone())
  }
}
