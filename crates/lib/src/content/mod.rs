//! Blog post loading.
//!
//! Posts are Markdown files with YAML front matter. The file name supplies the
//! slug (and the date when the front matter has none):
//!
//! ```text
//! _posts/2024-01-03-hello-world.md  ->  slug "hello-world", date 2024-01-03
//! ```
//!
//! A post with categories `rust web` is published at
//! `/blog/posts/rust/web/hello-world/`.

pub mod frontmatter;
pub mod types;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use pulldown_cmark::{Options, Parser, html};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::consts::POSTS_OUTPUT_DIR;

pub use frontmatter::split_front_matter;
pub use types::{ContentError, Post, PostMeta, SiteMeta};

use types::RawFrontMatter;

const DEFAULT_POST_LAYOUT: &str = "post.html";

/// Split a file stem into an optional `YYYY-MM-DD-` date prefix and the slug.
pub fn slug_from_file_name(stem: &str) -> (Option<NaiveDate>, &str) {
  if stem.len() > 11 && stem.is_char_boundary(11) && stem.as_bytes()[10] == b'-' {
    if let Ok(date) = NaiveDate::parse_from_str(&stem[..10], "%Y-%m-%d") {
      return (Some(date), &stem[11..]);
    }
  }
  (None, stem)
}

/// Parse a front matter date. Accepts `YYYY-MM-DD` optionally followed by a time.
fn parse_date(value: &serde_yaml::Value) -> Option<NaiveDate> {
  let text = match value {
    serde_yaml::Value::String(s) => s.as_str(),
    _ => return None,
  };
  let date_part = text.get(..10)?;
  NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Render Markdown to HTML.
pub fn render_markdown(source: &str) -> String {
  let mut options = Options::empty();
  options.insert(Options::ENABLE_TABLES);
  options.insert(Options::ENABLE_FOOTNOTES);
  options.insert(Options::ENABLE_STRIKETHROUGH);

  let parser = Parser::new_ext(source, options);
  let mut out = String::with_capacity(source.len() * 3 / 2);
  html::push_html(&mut out, parser);
  out
}

/// Load a single post.
pub fn load_post(path: &Path) -> Result<Post, ContentError> {
  let text = fs::read_to_string(path).map_err(|source| ContentError::Read {
    path: path.to_path_buf(),
    source,
  })?;

  let (front, body) = split_front_matter(&text).map_err(|e| ContentError::FrontMatter {
    path: path.to_path_buf(),
    message: e.to_string(),
  })?;

  let raw: RawFrontMatter = match front {
    Some(front) if !front.trim().is_empty() => serde_yaml::from_str(front).map_err(|e| ContentError::FrontMatter {
      path: path.to_path_buf(),
      message: e.to_string(),
    })?,
    _ => RawFrontMatter::default(),
  };

  let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
  let (prefix_date, slug) = slug_from_file_name(stem);
  if slug.is_empty() {
    return Err(ContentError::EmptySlug { path: path.to_path_buf() });
  }

  let title = raw.title.clone().ok_or_else(|| ContentError::MissingField {
    path: path.to_path_buf(),
    field: "title",
  })?;

  let date = match &raw.date {
    Some(value) => parse_date(value).ok_or_else(|| ContentError::InvalidDate {
      path: path.to_path_buf(),
      value: serde_yaml::to_string(value).unwrap_or_default().trim().to_string(),
    })?,
    None => prefix_date.ok_or_else(|| ContentError::MissingField {
      path: path.to_path_buf(),
      field: "date",
    })?,
  };

  let categories = raw.categories();
  if categories.is_empty() {
    return Err(ContentError::NoCategories { path: path.to_path_buf() });
  }

  let dir = format!("{}/{}/{}", POSTS_OUTPUT_DIR, categories.join("/"), slug);
  let url = format!("/{}/", dir);
  let output_path = format!("{}/index.html", dir);

  debug!(post = %path.display(), url = %url, "loaded post");

  Ok(Post {
    meta: PostMeta {
      title,
      date,
      categories,
      description: raw.description.clone(),
      layout: raw.layout.clone().unwrap_or_else(|| DEFAULT_POST_LAYOUT.to_string()),
    },
    slug: slug.to_string(),
    content: render_markdown(body),
    url,
    output_path,
    source: path.to_path_buf(),
  })
}

/// Load every `*.md` post under `posts_dir`, newest first.
///
/// A missing posts directory yields no posts. Two posts resolving to the same
/// URL is an error.
pub fn load_posts(posts_dir: &Path) -> Result<Vec<Post>, ContentError> {
  if !posts_dir.exists() {
    return Ok(Vec::new());
  }

  let mut posts = Vec::new();
  for entry in WalkDir::new(posts_dir).sort_by_file_name() {
    let entry = entry.map_err(|e| ContentError::Read {
      path: posts_dir.to_path_buf(),
      source: e.into(),
    })?;
    let path = entry.path();
    if entry.file_type().is_file() && path.extension().and_then(|e| e.to_str()) == Some("md") {
      posts.push(load_post(path)?);
    }
  }

  let mut seen: HashMap<String, PathBuf> = HashMap::new();
  for post in &posts {
    if let Some(first) = seen.insert(post.url.clone(), post.source.clone()) {
      return Err(ContentError::DuplicateUrl {
        first,
        second: post.source.clone(),
        url: post.url.clone(),
      });
    }
  }

  posts.sort_by(|a, b| b.meta.date.cmp(&a.meta.date).then_with(|| a.slug.cmp(&b.slug)));
  info!(count = posts.len(), "loaded posts");
  Ok(posts)
}
