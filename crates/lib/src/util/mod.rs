//! Shared utilities.
//!
//! Common utilities used across the crate: hashing and path normalization.

pub mod hash;

use std::path::Path;

/// Convert a relative path into a forward-slash key.
///
/// Output paths double as object store keys and URL paths, so they are always
/// `/`-separated regardless of platform.
pub fn to_key(path: &Path) -> String {
  path
    .components()
    .map(|c| c.as_os_str().to_string_lossy())
    .collect::<Vec<_>>()
    .join("/")
}

#[cfg(test)]
pub mod testutil;
