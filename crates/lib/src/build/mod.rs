//! Site build: materializes the output directory.
//!
//! The build runs as a fixed sequence of stages. Each stage finishes before the
//! next one starts:
//!
//! 1. collect and hash assets, producing the [`AssetMap`]
//! 2. write the hashed assets
//! 3. load posts and render posts and root pages against the frozen mapping
//! 4. copy root passthrough files and generate `sitemap.xml` / `robots.txt`
//!
//! The output directory is cleared before the build and removed again if any
//! stage fails, so a failed build never leaves partial output behind.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::assets::{self, AssetError, AssetMap};
use crate::config::SiteConfig;
use crate::content::{self, ContentError, SiteMeta};
use crate::publish::policy::{ResourceClass, classify};
use crate::render::{RenderError, Renderer, SitemapEntry, robots_txt, sitemap_xml};

const SITEMAP: &str = "sitemap.xml";
const ROBOTS: &str = "robots.txt";

#[derive(Debug, Error)]
pub enum BuildError {
  #[error(transparent)]
  Asset(#[from] AssetError),

  #[error(transparent)]
  Content(#[from] ContentError),

  #[error(transparent)]
  Render(#[from] RenderError),

  #[error("failed to write {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to clean output directory {path}: {source}")]
  Clean {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to scan {path}: {message}")]
  Scan { path: PathBuf, message: String },

  #[error("source directory not found: {0}")]
  MissingSource(PathBuf),

  #[error("output directory {output} must not contain the source directory {source_dir}")]
  OutputContainsSource { output: PathBuf, source_dir: PathBuf },

  #[error("{key} is produced twice (by {first} and {second})")]
  DuplicateOutput { key: String, first: String, second: String },

  #[error("asset {source_path} maps to {output} which was not written")]
  UnwrittenAsset { source_path: String, output: String },
}

/// One file in the output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputFile {
  /// Path relative to the output directory; also the object key.
  pub key: String,
  pub class: ResourceClass,
}

/// Result of a successful build.
#[derive(Debug, Clone)]
pub struct BuildOutput {
  pub out_dir: PathBuf,
  /// Every output file, sorted by key.
  pub files: Vec<OutputFile>,
  pub asset_map: Arc<AssetMap>,
  pub post_count: usize,
}

impl BuildOutput {
  /// Output files of one resource class.
  pub fn files_of(&self, class: ResourceClass) -> impl Iterator<Item = &OutputFile> {
    self.files.iter().filter(move |f| f.class == class)
  }

  /// Scan an existing output directory, e.g. to publish without rebuilding.
  pub fn from_dir(out_dir: &Path) -> Result<Self, BuildError> {
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(out_dir).sort_by_file_name() {
      let entry = entry.map_err(|e| BuildError::Scan {
        path: out_dir.to_path_buf(),
        message: e.to_string(),
      })?;
      if entry.file_type().is_file() {
        let rel = entry.path().strip_prefix(out_dir).unwrap_or(entry.path());
        let key = crate::util::to_key(rel);
        files.push(OutputFile {
          class: classify(&key),
          key,
        });
      }
    }
    files.sort_by(|a, b| a.key.cmp(&b.key));

    Ok(Self {
      out_dir: out_dir.to_path_buf(),
      files,
      asset_map: Arc::new(AssetMap::new()),
      post_count: 0,
    })
  }
}

/// Tracks written keys and who produced them.
#[derive(Default)]
struct OutputSet {
  producers: BTreeMap<String, String>,
}

impl OutputSet {
  fn write(&mut self, out_dir: &Path, key: &str, producer: &str, content: &[u8]) -> Result<(), BuildError> {
    if let Some(first) = self.producers.get(key) {
      return Err(BuildError::DuplicateOutput {
        key: key.to_string(),
        first: first.clone(),
        second: producer.to_string(),
      });
    }

    let dest = out_dir.join(key);
    if let Some(parent) = dest.parent() {
      fs::create_dir_all(parent).map_err(|source| BuildError::Write {
        path: parent.to_path_buf(),
        source,
      })?;
    }
    fs::write(&dest, content).map_err(|source| BuildError::Write { path: dest, source })?;

    debug!(key = %key, producer = %producer, "wrote output");
    self.producers.insert(key.to_string(), producer.to_string());
    Ok(())
  }

  fn record(&mut self, key: &str, producer: &str) {
    self.producers.insert(key.to_string(), producer.to_string());
  }

  fn contains(&self, key: &str) -> bool {
    self.producers.contains_key(key)
  }

  fn into_files(self) -> Vec<OutputFile> {
    self
      .producers
      .into_keys()
      .map(|key| OutputFile {
        class: classify(&key),
        key,
      })
      .collect()
  }
}

fn clean_output(out_dir: &Path) -> Result<(), BuildError> {
  match fs::remove_dir_all(out_dir) {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
    Err(source) => Err(BuildError::Clean {
      path: out_dir.to_path_buf(),
      source,
    }),
  }
}

/// Build the site described by `config` into its output directory.
pub fn build_site(config: &SiteConfig) -> Result<BuildOutput, BuildError> {
  let source_dir = config.source_dir();
  let out_dir = config.output_dir();

  if !source_dir.is_dir() {
    return Err(BuildError::MissingSource(source_dir));
  }
  if source_dir.starts_with(&out_dir) {
    return Err(BuildError::OutputContainsSource {
      output: out_dir,
      source_dir,
    });
  }

  info!(source = %source_dir.display(), output = %out_dir.display(), "building site");

  clean_output(&out_dir)?;
  match materialize(config, &source_dir, &out_dir) {
    Ok(output) => Ok(output),
    Err(e) => {
      if let Err(clean_err) = clean_output(&out_dir) {
        warn!(error = %clean_err, "failed to remove partial output");
      }
      Err(e)
    }
  }
}

fn materialize(config: &SiteConfig, source_dir: &Path, out_dir: &Path) -> Result<BuildOutput, BuildError> {
  let mut outputs = OutputSet::default();

  // Stage 1: hash. The mapping is complete once this returns.
  let exclude = vec![config.templates_dir(), config.posts_dir(), out_dir.to_path_buf()];
  warn_nested_pages(source_dir, &exclude);
  let hashed = assets::hash_assets(assets::collect_assets(source_dir, &exclude)?)?;

  // Stage 2: write hashed assets.
  for key in assets::write_assets(&hashed, out_dir)? {
    outputs.record(&key, "assets");
  }
  let asset_map = Arc::new(hashed.map);

  // Stage 3: render.
  let site = SiteMeta {
    name: config.site.name.clone(),
    url: config.site.url.clone(),
    build_time: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
  };
  let posts = content::load_posts(&config.posts_dir())?;
  let renderer = Renderer::new(&config.templates_dir(), source_dir, asset_map.clone(), site)?;

  let mut sitemap = Vec::new();

  for page in renderer.pages() {
    let html = renderer.render_page(page, &posts)?;
    outputs.write(out_dir, page.output_path(), &page.name, html.as_bytes())?;
    sitemap.push(SitemapEntry {
      url: page.url(),
      lastmod: None,
    });
  }

  for post in &posts {
    let html = renderer.render_post(post, &posts)?;
    let producer = post.source.display().to_string();
    outputs.write(out_dir, &post.output_path, &producer, html.as_bytes())?;
    sitemap.push(SitemapEntry {
      url: post.url.clone(),
      lastmod: Some(post.meta.date),
    });
  }

  // Stage 4: root files and metadata.
  for (name, content) in root_passthrough(source_dir)? {
    outputs.write(out_dir, &name, &name, &content)?;
  }
  if !outputs.contains(SITEMAP) {
    outputs.write(out_dir, SITEMAP, "generated", sitemap_xml(renderer.site(), &sitemap).as_bytes())?;
  }
  if !outputs.contains(ROBOTS) {
    outputs.write(out_dir, ROBOTS, "generated", robots_txt(renderer.site()).as_bytes())?;
  }

  for (source, output) in asset_map.iter() {
    if !outputs.contains(output) {
      return Err(BuildError::UnwrittenAsset {
        source_path: source.to_string(),
        output: output.to_string(),
      });
    }
  }

  let files = outputs.into_files();
  info!(files = files.len(), posts = posts.len(), assets = asset_map.len(), "build complete");

  Ok(BuildOutput {
    out_dir: out_dir.to_path_buf(),
    files,
    asset_map,
    post_count: posts.len(),
  })
}

/// Only root pages are rendered. Log every `.html` file deeper in the tree
/// that would otherwise be dropped silently.
fn warn_nested_pages(source_dir: &Path, exclude: &[PathBuf]) {
  let walker = walkdir::WalkDir::new(source_dir)
    .min_depth(1)
    .sort_by_file_name()
    .into_iter()
    .filter_entry(|e| {
      let name = e.file_name().to_string_lossy();
      let private = e.file_type().is_dir() && (name.starts_with('.') || name.starts_with('_'));
      !private && !exclude.iter().any(|ex| e.path().starts_with(ex))
    });

  for entry in walker.flatten() {
    let path = entry.path();
    if entry.depth() >= 2 && entry.file_type().is_file() && path.extension().and_then(|e| e.to_str()) == Some("html") {
      let rel = path.strip_prefix(source_dir).unwrap_or(path);
      warn!(page = %rel.display(), "nested page is not published; only root pages are rendered");
    }
  }
}

/// Non-template files directly in the source root, copied unchanged.
fn root_passthrough(source_dir: &Path) -> Result<Vec<(String, Vec<u8>)>, BuildError> {
  let read_err = |source| BuildError::Content(ContentError::Read {
    path: source_dir.to_path_buf(),
    source,
  });

  let mut files = Vec::new();
  for entry in fs::read_dir(source_dir).map_err(read_err)? {
    let entry = entry.map_err(read_err)?;
    let path = entry.path();
    let name = entry.file_name().to_string_lossy().to_string();

    let skip = name.starts_with('.')
      || name.starts_with('_')
      || !path.is_file()
      || matches!(path.extension().and_then(|e| e.to_str()), Some("html" | "md" | "toml"));
    if skip {
      continue;
    }

    let content = fs::read(&path).map_err(|source| {
      BuildError::Content(ContentError::Read {
        path: path.clone(),
        source,
      })
    })?;
    files.push((name, content));
  }

  files.sort_by(|a, b| a.0.cmp(&b.0));
  Ok(files)
}
