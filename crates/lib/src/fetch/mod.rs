//! Remote asset download.
//!
//! Large binary assets (fonts, mostly) are not kept in the repository. Each
//! `[[remote_assets]]` entry names a URL and the SHA-256 of its bytes; the file
//! is downloaded into the source tree before building.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::config::{RemoteAsset, SiteConfig};
use crate::util::hash::{hash_bytes, hash_file};

#[derive(Debug, Error)]
pub enum FetchError {
  #[error("failed to fetch {url}: {message}")]
  Download { url: String, message: String },

  #[error("hash mismatch for {url}: expected {expected}, got {actual}")]
  HashMismatch { url: String, expected: String, actual: String },

  #[error("invalid rename pattern '{pattern}': {source}")]
  Pattern {
    pattern: String,
    #[source]
    source: regex::Error,
  },

  #[error("failed to write {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// What happened to one remote asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FetchOutcome {
  Downloaded { path: PathBuf, bytes: usize },
  Cached { path: PathBuf },
}

impl FetchOutcome {
  pub fn path(&self) -> &Path {
    match self {
      FetchOutcome::Downloaded { path, .. } | FetchOutcome::Cached { path } => path,
    }
  }
}

/// Download every remote asset of `config` into its source directory.
///
/// Assets already present with the expected hash are left alone. The first
/// failure stops the run.
pub async fn fetch_remote_assets(config: &SiteConfig) -> Result<Vec<FetchOutcome>, FetchError> {
  let source_dir = config.source_dir();
  let mut outcomes = Vec::with_capacity(config.remote_assets.len());

  for asset in &config.remote_assets {
    outcomes.push(fetch_asset(asset, &source_dir).await?);
  }

  Ok(outcomes)
}

/// Where `asset` lands under `source_dir`.
pub fn destination(asset: &RemoteAsset, source_dir: &Path) -> Result<PathBuf, FetchError> {
  let mut filename = url_to_filename(&asset.url);

  if let Some((pattern, replacement)) = &asset.rename {
    let regex = Regex::new(pattern).map_err(|source| FetchError::Pattern {
      pattern: pattern.clone(),
      source,
    })?;
    filename = regex.replace(&filename, replacement.as_str()).into_owned();
  }

  Ok(source_dir.join(&asset.dest).join(filename))
}

async fn fetch_asset(asset: &RemoteAsset, source_dir: &Path) -> Result<FetchOutcome, FetchError> {
  let url = asset.url.as_str();
  let dest_path = destination(asset, source_dir)?;

  if dest_path.exists() {
    debug!(path = ?dest_path, "checking existing file");
    if let Ok(actual) = hash_file(&dest_path) {
      if actual.matches(&asset.sha256) {
        debug!(path = ?dest_path, "already present");
        return Ok(FetchOutcome::Cached { path: dest_path });
      }
      debug!(expected = %asset.sha256, actual = %actual, "existing file hash mismatch, re-downloading");
    }
  }

  info!(url = %url, "fetching remote asset");

  let response = reqwest::get(url).await.map_err(|e| FetchError::Download {
    url: url.to_string(),
    message: e.to_string(),
  })?;

  if !response.status().is_success() {
    return Err(FetchError::Download {
      url: url.to_string(),
      message: format!("HTTP {}", response.status()),
    });
  }

  let bytes = response.bytes().await.map_err(|e| FetchError::Download {
    url: url.to_string(),
    message: e.to_string(),
  })?;

  let actual = hash_bytes(&bytes);
  if !actual.matches(&asset.sha256) {
    return Err(FetchError::HashMismatch {
      url: url.to_string(),
      expected: asset.sha256.clone(),
      actual: actual.0,
    });
  }

  write_file(&dest_path, &bytes).await?;
  info!(path = ?dest_path, size = bytes.len(), "download complete");

  Ok(FetchOutcome::Downloaded {
    path: dest_path,
    bytes: bytes.len(),
  })
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), FetchError> {
  let to_err = |source| FetchError::Write {
    path: path.to_path_buf(),
    source,
  };

  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).await.map_err(to_err)?;
  }
  let mut file = fs::File::create(path).await.map_err(to_err)?;
  file.write_all(bytes).await.map_err(to_err)?;
  file.flush().await.map_err(to_err)?;
  Ok(())
}

/// Convert a URL to a safe filename.
///
/// Takes the last path component and sanitizes it. Falls back to a hash of
/// the URL if no suitable filename can be extracted.
fn url_to_filename(url: &str) -> String {
  if let Some(filename) = url.rsplit('/').next() {
    let filename = filename.split('?').next().unwrap_or(filename);

    let sanitized: String = filename
      .chars()
      .map(|c| {
        if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
          c
        } else {
          '_'
        }
      })
      .collect();

    if !sanitized.is_empty() && sanitized != "." && sanitized != ".." {
      return sanitized;
    }
  }

  format!("download_{}", hash_bytes(url.as_bytes()).short())
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn asset(url: &str, sha256: &str, rename: Option<(&str, &str)>) -> RemoteAsset {
    RemoteAsset {
      url: url.to_string(),
      sha256: sha256.to_string(),
      dest: PathBuf::from("_assets/fonts"),
      rename: rename.map(|(p, r)| (p.to_string(), r.to_string())),
    }
  }

  #[test]
  fn url_to_filename_simple() {
    assert_eq!(url_to_filename("https://example.com/file.woff2"), "file.woff2");
  }

  #[test]
  fn url_to_filename_with_query() {
    assert_eq!(url_to_filename("https://example.com/font.woff?v=3"), "font.woff");
  }

  #[test]
  fn url_to_filename_sanitizes_special_chars() {
    assert_eq!(url_to_filename("https://example.com/my font.woff"), "my_font.woff");
  }

  #[test]
  fn url_to_filename_fallback_for_empty() {
    assert!(url_to_filename("https://example.com/").starts_with("download_"));
  }

  #[test]
  fn destination_applies_rename() {
    let asset = asset(
      "https://fonts.example.com/Inter-Regular-abc123.woff",
      "",
      Some((r"(.+)-.+\.woff$", "$1.woff")),
    );
    let dest = destination(&asset, Path::new("src")).unwrap();
    assert_eq!(dest, PathBuf::from("src/_assets/fonts/Inter-Regular.woff"));
  }

  #[test]
  fn destination_rejects_bad_pattern() {
    let asset = asset("https://example.com/a.woff", "", Some(("(", "")));
    assert!(matches!(
      destination(&asset, Path::new("src")),
      Err(FetchError::Pattern { .. })
    ));
  }

  #[tokio::test]
  async fn present_file_with_matching_hash_is_not_downloaded() {
    let temp = TempDir::new().unwrap();
    let fonts = temp.path().join("_assets/fonts");
    std::fs::create_dir_all(&fonts).unwrap();
    std::fs::write(fonts.join("a.woff"), b"font bytes").unwrap();

    // Unroutable host: any network access would fail the test.
    let asset = asset("http://127.0.0.1:9/a.woff", &hash_bytes(b"font bytes").0, None);

    let outcome = fetch_asset(&asset, temp.path()).await.unwrap();
    assert_eq!(outcome, FetchOutcome::Cached { path: fonts.join("a.woff") });
  }

  #[tokio::test]
  async fn unreachable_url_is_download_error() {
    let temp = TempDir::new().unwrap();
    let asset = asset("http://127.0.0.1:9/a.woff", &hash_bytes(b"x").0, None);

    let err = fetch_asset(&asset, temp.path()).await.unwrap_err();
    assert!(matches!(err, FetchError::Download { .. }));
    assert!(!temp.path().join("_assets/fonts/a.woff").exists());
  }
}
