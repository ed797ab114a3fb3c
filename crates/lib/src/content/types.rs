//! Typed records for content metadata.

use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading content files.
#[derive(Debug, Error)]
pub enum ContentError {
  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("front matter is not closed with '---'")]
  UnclosedFrontMatter,

  #[error("invalid front matter in {path}: {message}")]
  FrontMatter { path: PathBuf, message: String },

  #[error("{path} is missing required field '{field}'")]
  MissingField { path: PathBuf, field: &'static str },

  #[error("{path} has an invalid date '{value}'")]
  InvalidDate { path: PathBuf, value: String },

  #[error("{path} has no categories")]
  NoCategories { path: PathBuf },

  #[error("{path} has an empty slug")]
  EmptySlug { path: PathBuf },

  #[error("posts {first} and {second} both publish to {url}")]
  DuplicateUrl { first: PathBuf, second: PathBuf, url: String },
}

/// Categories may be written as a space-separated string or as a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Categories {
  Spaced(String),
  List(Vec<String>),
}

impl Categories {
  fn into_vec(self) -> Vec<String> {
    let parts = match self {
      Categories::Spaced(s) => s.split_whitespace().map(str::to_string).collect(),
      Categories::List(v) => v,
    };
    parts
      .into_iter()
      .map(|c| c.trim().to_string())
      .filter(|c| !c.is_empty())
      .collect()
  }
}

/// Front matter exactly as written in the file.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawFrontMatter {
  pub title: Option<String>,
  pub date: Option<serde_yaml::Value>,
  categories: Option<Categories>,
  pub description: Option<String>,
  pub layout: Option<String>,
}

impl RawFrontMatter {
  pub fn categories(&self) -> Vec<String> {
    self.categories.clone().map(Categories::into_vec).unwrap_or_default()
  }
}

/// Post metadata consumed by templates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostMeta {
  pub title: String,
  pub date: NaiveDate,
  pub categories: Vec<String>,
  pub description: Option<String>,
  /// Template used to render the post.
  pub layout: String,
}

/// A fully loaded post.
#[derive(Debug, Clone, Serialize)]
pub struct Post {
  #[serde(flatten)]
  pub meta: PostMeta,
  pub slug: String,
  /// Rendered HTML body.
  pub content: String,
  /// Site-relative URL with leading and trailing slash.
  pub url: String,
  /// Output path relative to the output directory.
  #[serde(skip)]
  pub output_path: String,
  #[serde(skip)]
  pub source: PathBuf,
}

/// Site-wide values available to every template as `site`.
#[derive(Debug, Clone, Serialize)]
pub struct SiteMeta {
  pub name: String,
  /// Base URL without trailing slash.
  pub url: String,
  /// RFC 3339 build timestamp.
  pub build_time: String,
}
