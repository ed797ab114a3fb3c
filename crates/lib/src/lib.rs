//! sitepub-lib: build a static site and publish it to object storage.
//!
//! - `build`: materializes the output directory from posts, templates and
//!   content-hashed assets
//! - `publish`: uploads the output in dependency order and marks stale remote
//!   objects for deferred deletion
//! - `storage`: the object store seam, with S3 and in-memory backends
//! - `fetch`: downloads hash-pinned remote assets into the source tree

pub mod assets;
pub mod build;
pub mod config;
pub mod consts;
pub mod content;
pub mod fetch;
pub mod publish;
pub mod render;
pub mod storage;
pub mod util;
