//! Template rendering.
//!
//! Templates are Tera files. Layouts live in the templates directory and are
//! addressed by their path relative to it (`post.html`, `base.html`). Root
//! pages in the source directory (`index.html`, ...) are templates too and may
//! extend the layouts.
//!
//! Every template sees:
//! - `site`: [`SiteMeta`]
//! - `posts`: all posts, newest first
//! - `post`: the post being rendered (post templates only)
//! - `asset(path="...")`: URL of a content-hashed asset
//! - `nicedate` / `isodate` filters

pub mod filters;
pub mod meta;

use std::error::Error as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tera::{Context, Tera};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use crate::assets::AssetMap;
use crate::content::{Post, SiteMeta};
use crate::util::to_key;

pub use meta::{SitemapEntry, robots_txt, sitemap_xml};

/// Prefix under which root pages are registered, so they never clash with layouts.
const PAGE_PREFIX: &str = "pages/";

#[derive(Debug, Error)]
pub enum RenderError {
  #[error("failed to read template {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to load templates: {0}")]
  Load(String),

  #[error("failed to render {template}: {message}")]
  Template { template: String, message: String },

  #[error("template not found: {0}")]
  NotFound(String),
}

/// Flatten a Tera error and its sources into one line.
fn error_chain(err: &tera::Error) -> String {
  let mut parts = vec![err.to_string()];
  let mut source = err.source();
  while let Some(inner) = source {
    parts.push(inner.to_string());
    source = inner.source();
  }
  parts.join(": ")
}

/// A root page found in the source directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootPage {
  /// File name relative to the source directory, e.g. `index.html`.
  pub name: String,
}

impl RootPage {
  pub fn output_path(&self) -> &str {
    &self.name
  }

  /// Site-relative URL; `index.html` is served as `/`.
  pub fn url(&self) -> String {
    match self.name.strip_suffix("index.html") {
      Some(dir) => format!("/{}", dir),
      None => format!("/{}", self.name),
    }
  }
}

/// Renders posts and pages against a frozen asset mapping.
pub struct Renderer {
  tera: Tera,
  site: SiteMeta,
  pages: Vec<RootPage>,
}

fn read_template(path: &Path) -> Result<String, RenderError> {
  fs::read_to_string(path).map_err(|source| RenderError::Read {
    path: path.to_path_buf(),
    source,
  })
}

impl Renderer {
  /// Load layouts from `templates_dir` and root pages from `source_dir`.
  ///
  /// The asset mapping must be complete: it is moved behind an `Arc` and only
  /// read from here on.
  pub fn new(
    templates_dir: &Path,
    source_dir: &Path,
    assets: Arc<AssetMap>,
    site: SiteMeta,
  ) -> Result<Self, RenderError> {
    let mut templates: Vec<(String, String)> = Vec::new();

    if templates_dir.exists() {
      for entry in WalkDir::new(templates_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| RenderError::Load(e.to_string()))?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().and_then(|e| e.to_str()) == Some("html") {
          let name = to_key(path.strip_prefix(templates_dir).unwrap_or(path));
          templates.push((name, read_template(path)?));
        }
      }
    }

    let mut pages = Vec::new();
    if source_dir.exists() {
      let entries = fs::read_dir(source_dir).map_err(|source| RenderError::Read {
        path: source_dir.to_path_buf(),
        source,
      })?;
      for entry in entries {
        let entry = entry.map_err(|source| RenderError::Read {
          path: source_dir.to_path_buf(),
          source,
        })?;
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("html") {
          let name = entry.file_name().to_string_lossy().to_string();
          templates.push((format!("{}{}", PAGE_PREFIX, name), read_template(&path)?));
          pages.push(RootPage { name });
        }
      }
    }
    pages.sort_by(|a, b| a.name.cmp(&b.name));

    let mut tera = Tera::default();
    tera.autoescape_on(vec![]);
    tera.register_function("asset", filters::asset_function(assets));
    tera.register_filter("nicedate", filters::nicedate);
    tera.register_filter("isodate", filters::isodate);
    tera
      .add_raw_templates(templates)
      .map_err(|e| RenderError::Load(error_chain(&e)))?;

    debug!(pages = pages.len(), "loaded templates");

    Ok(Self { tera, site, pages })
  }

  pub fn site(&self) -> &SiteMeta {
    &self.site
  }

  /// Root pages discovered in the source directory, sorted by name.
  pub fn pages(&self) -> &[RootPage] {
    &self.pages
  }

  fn base_context(&self, posts: &[Post]) -> Context {
    let mut context = Context::new();
    context.insert("site", &self.site);
    context.insert("posts", posts);
    context
  }

  fn render(&self, template: &str, context: &Context) -> Result<String, RenderError> {
    if !self.tera.get_template_names().any(|n| n == template) {
      return Err(RenderError::NotFound(template.to_string()));
    }
    self.tera.render(template, context).map_err(|e| RenderError::Template {
      template: template.to_string(),
      message: error_chain(&e),
    })
  }

  /// Render a single post with its layout.
  pub fn render_post(&self, post: &Post, posts: &[Post]) -> Result<String, RenderError> {
    let mut context = self.base_context(posts);
    context.insert("post", post);
    self.render(&post.meta.layout, &context)
  }

  /// Render a root page.
  pub fn render_page(&self, page: &RootPage, posts: &[Post]) -> Result<String, RenderError> {
    let context = self.base_context(posts);
    self.render(&format!("{}{}", PAGE_PREFIX, page.name), &context)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::content::load_posts;
  use crate::util::testutil::{BASE_TEMPLATE, INDEX_TEMPLATE, POST_TEMPLATE, write_file};
  use tempfile::TempDir;

  fn site() -> SiteMeta {
    SiteMeta {
      name: "Example".to_string(),
      url: "https://example.com".to_string(),
      build_time: "2024-01-01T00:00:00Z".to_string(),
    }
  }

  fn asset_map() -> Arc<AssetMap> {
    let mut map = AssetMap::new();
    map.insert(
      "_assets/stylesheets/site.css".to_string(),
      "assets/styles/0123456789abcdef.css".to_string(),
    );
    Arc::new(map)
  }

  fn layout(temp: &TempDir) -> (PathBuf, PathBuf) {
    let src = temp.path().join("src");
    let templates = src.join("_layouts");
    write_file(&templates, "base.html", BASE_TEMPLATE);
    write_file(&templates, "post.html", POST_TEMPLATE);
    write_file(&src, "index.html", INDEX_TEMPLATE);
    write_file(
      &src,
      "_posts/2024-01-03-hello.md",
      "---\ntitle: Hello & Welcome\ncategories: rust\n---\nHi *there*\n",
    );
    (src, templates)
  }

  #[test]
  fn renders_post_with_hashed_asset() {
    let temp = TempDir::new().unwrap();
    let (src, templates) = layout(&temp);
    let renderer = Renderer::new(&templates, &src, asset_map(), site()).unwrap();
    let posts = load_posts(&src.join("_posts")).unwrap();

    let html = renderer.render_post(&posts[0], &posts).unwrap();
    assert!(html.contains("href=\"/assets/styles/0123456789abcdef.css\""));
    assert!(html.contains("<h1>Hello & Welcome</h1>"));
    assert!(html.contains("Wednesday January 3rd, 2024"));
    assert!(html.contains("datetime=\"2024-01-03T00:00:00.000Z\""));
    assert!(html.contains("<em>there</em>"));
  }

  #[test]
  fn renders_index_page_listing_posts() {
    let temp = TempDir::new().unwrap();
    let (src, templates) = layout(&temp);
    let renderer = Renderer::new(&templates, &src, asset_map(), site()).unwrap();
    let posts = load_posts(&src.join("_posts")).unwrap();

    assert_eq!(renderer.pages(), &[RootPage { name: "index.html".to_string() }]);
    let html = renderer.render_page(&renderer.pages()[0], &posts).unwrap();
    assert!(html.contains("<a href=\"/blog/posts/rust/hello/\">Hello & Welcome</a>"));
  }

  #[test]
  fn missing_asset_is_render_error() {
    let temp = TempDir::new().unwrap();
    let (src, templates) = layout(&temp);
    let renderer = Renderer::new(&templates, &src, Arc::new(AssetMap::new()), site()).unwrap();
    let posts = load_posts(&src.join("_posts")).unwrap();

    let err = renderer.render_post(&posts[0], &posts).unwrap_err();
    match err {
      RenderError::Template { template, message } => {
        assert_eq!(template, "post.html");
        assert!(message.contains("unknown asset '_assets/stylesheets/site.css'"), "{}", message);
      }
      other => panic!("unexpected error: {}", other),
    }
  }

  #[test]
  fn missing_layout_is_not_found() {
    let temp = TempDir::new().unwrap();
    let (src, templates) = layout(&temp);
    let renderer = Renderer::new(&templates, &src, asset_map(), site()).unwrap();
    let mut posts = load_posts(&src.join("_posts")).unwrap();
    posts[0].meta.layout = "gallery.html".to_string();

    assert!(matches!(
      renderer.render_post(&posts[0], &posts),
      Err(RenderError::NotFound(name)) if name == "gallery.html"
    ));
  }

  #[test]
  fn root_page_urls() {
    assert_eq!(RootPage { name: "index.html".to_string() }.url(), "/");
    assert_eq!(RootPage { name: "about.html".to_string() }.url(), "/about.html");
  }
}
