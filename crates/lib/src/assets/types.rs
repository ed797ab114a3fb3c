//! Types for content-hashed assets.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::util::hash::ContentHash;

/// Errors that can occur while collecting or hashing assets.
#[derive(Debug, Error)]
pub enum AssetError {
  #[error("failed to walk {path}: {message}")]
  Walk { path: PathBuf, message: String },

  #[error("failed to read asset {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to write asset {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("asset {0} has no file extension")]
  NoExtension(String),
}

/// Broad kind of an asset, which decides its output directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
  Fonts,
  Images,
  Scripts,
  Styles,
}

impl AssetClass {
  /// Classify a file extension. Returns `None` for files that are not assets.
  pub fn from_extension(ext: &str) -> Option<Self> {
    match ext.to_ascii_lowercase().as_str() {
      "woff" | "woff2" | "otf" | "ttf" | "eot" => Some(AssetClass::Fonts),
      "svg" | "png" | "jpg" | "jpeg" | "gif" | "webp" | "ico" => Some(AssetClass::Images),
      "js" => Some(AssetClass::Scripts),
      "css" => Some(AssetClass::Styles),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      AssetClass::Fonts => "fonts",
      AssetClass::Images => "images",
      AssetClass::Scripts => "scripts",
      AssetClass::Styles => "styles",
    }
  }
}

impl std::fmt::Display for AssetClass {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A source asset: original relative path, content bytes and MIME type.
///
/// Created when the source file is read and never modified afterwards.
#[derive(Debug, Clone)]
pub struct Asset {
  /// Path relative to the source directory, `/`-separated.
  pub source: String,
  pub content: Vec<u8>,
  pub mime: String,
  pub class: AssetClass,
}

impl Asset {
  /// Lowercased extension of the original path.
  pub fn extension(&self) -> Option<String> {
    self
      .source
      .rsplit('/')
      .next()
      .and_then(|name| name.rsplit_once('.'))
      .map(|(_, ext)| ext.to_ascii_lowercase())
      .filter(|ext| !ext.is_empty())
  }
}

/// One physical output file produced by the hashing stage.
///
/// Several source assets with identical bytes share a single `HashedAsset`.
#[derive(Debug, Clone)]
pub struct HashedAsset {
  /// Output path relative to the output directory, e.g. `assets/images/0123abcd.png`.
  pub output: String,
  pub hash: ContentHash,
  pub content: Vec<u8>,
  /// Every source path that maps to this output.
  pub sources: Vec<String>,
}

/// Mapping from original asset path to content-hashed output path.
///
/// Filled in by the hashing stage only. Rendering receives it behind an `Arc`
/// once hashing has finished, so it is never written and read at the same time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssetMap {
  entries: BTreeMap<String, String>,
}

impl AssetMap {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a mapping. A key is only ever written once per run.
  pub(crate) fn insert(&mut self, source: String, output: String) {
    debug_assert!(!self.entries.contains_key(&source), "asset registered twice: {}", source);
    self.entries.insert(source, output);
  }

  /// Look up the hashed output path for an original asset path.
  pub fn get(&self, source: &str) -> Option<&str> {
    self.entries.get(source.trim_start_matches('/')).map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }
}

/// Result of the hashing stage.
#[derive(Debug, Clone, Default)]
pub struct HashedAssets {
  pub map: AssetMap,
  /// De-duplicated output files, sorted by output path.
  pub files: Vec<HashedAsset>,
}
