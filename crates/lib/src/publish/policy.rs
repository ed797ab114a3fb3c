//! Per-resource-class upload policy: ordering, content type and caching.

use serde::Serialize;

use crate::consts::ASSETS_OUTPUT_DIR;

/// Resource classes, in upload order.
///
/// Pages reference static resources by hashed name, and the sitemap indexes
/// pages, so each class must be fully uploaded before the next one starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceClass {
  /// Fonts, images, scripts and styles under content-hashed names.
  Static,
  /// HTML pages.
  Page,
  /// Everything else under an unhashed name: sitemap, robots file, favicon
  /// and other root passthrough files.
  Meta,
}

impl ResourceClass {
  /// Upload stages in order.
  pub const ORDER: [ResourceClass; 3] = [ResourceClass::Static, ResourceClass::Page, ResourceClass::Meta];

  /// Whether objects of this class get the long cache lifetime.
  pub fn is_long_lived(&self) -> bool {
    matches!(self, ResourceClass::Static)
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      ResourceClass::Static => "static",
      ResourceClass::Page => "page",
      ResourceClass::Meta => "meta",
    }
  }
}

impl std::fmt::Display for ResourceClass {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Classify an output key.
///
/// Only keys under the hashed assets directory are [`ResourceClass::Static`];
/// any other file keeps its name across builds and must not be cached long.
pub fn classify(key: &str) -> ResourceClass {
  let hashed = key
    .strip_prefix(ASSETS_OUTPUT_DIR)
    .is_some_and(|rest| rest.starts_with('/'));
  if key.ends_with(".html") {
    ResourceClass::Page
  } else if hashed {
    ResourceClass::Static
  } else {
    ResourceClass::Meta
  }
}

/// MIME types that are text even though they are not `text/*`.
const TEXT_LIKE: &[&str] = &[
  "application/javascript",
  "application/json",
  "application/xml",
  "image/svg+xml",
];

/// `Content-Type` for a key, derived from its extension.
///
/// Text types carry `; charset=utf-8`.
pub fn content_type(key: &str) -> String {
  let mime = mime_guess::from_path(key).first_or_octet_stream();
  let essence = mime.essence_str();
  if mime.type_() == mime_guess::mime::TEXT || TEXT_LIKE.contains(&essence) {
    format!("{}; charset=utf-8", essence)
  } else {
    essence.to_string()
  }
}
