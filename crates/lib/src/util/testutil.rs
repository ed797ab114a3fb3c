//! Test utilities for sitepub-lib.
//!
//! Helpers for laying out small source trees in temporary directories.

use std::fs;
use std::path::Path;

use crate::config::SiteConfig;

/// Write `content` to `root/relative`, creating parent directories.
pub fn write_file(root: &Path, relative: &str, content: &str) {
  let path = root.join(relative);
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).unwrap();
  }
  fs::write(&path, content).unwrap();
}

pub const BASE_TEMPLATE: &str = r#"<!doctype html>
<html>
<head>
<title>{% block title %}{{ site.name }}{% endblock title %}</title>
<link rel="stylesheet" href="{{ asset(path="_assets/stylesheets/site.css") }}">
</head>
<body>{% block content %}{% endblock content %}</body>
</html>
"#;

pub const POST_TEMPLATE: &str = r#"{% extends "base.html" %}
{% block title %}{{ post.title }} | {{ site.name }}{% endblock title %}
{% block content %}<article><h1>{{ post.title }}</h1><time datetime="{{ post.date | isodate }}">{{ post.date | nicedate }}</time>{{ post.content | safe }}</article>{% endblock content %}
"#;

pub const INDEX_TEMPLATE: &str = r#"{% extends "base.html" %}
{% block content %}<ul>{% for post in posts %}<li><a href="{{ post.url }}">{{ post.title }}</a></li>{% endfor %}</ul>{% endblock content %}
"#;

pub const HELLO_POST: &str = "---\ntitle: Hello World\ncategories: rust web\n---\nFirst *post*.\n";

pub const SECOND_POST: &str = "---\ntitle: Second\ndate: 2024-02-10\ncategories:\n  - notes\n---\nAnother post.\n";

/// Lay out a small but complete site under `root` and return its config.
pub fn sample_site(root: &Path) -> SiteConfig {
  let src = root.join("src");
  write_file(&src, "_layouts/base.html", BASE_TEMPLATE);
  write_file(&src, "_layouts/post.html", POST_TEMPLATE);
  write_file(&src, "index.html", INDEX_TEMPLATE);
  write_file(&src, "favicon.ico", "icon");
  write_file(&src, "_assets/stylesheets/site.css", "body{margin:0}");
  write_file(&src, "_assets/images/logo.svg", "<svg/>");
  write_file(&src, "_posts/2024-01-03-hello-world.md", HELLO_POST);
  write_file(&src, "_posts/second.md", SECOND_POST);

  SiteConfig::default_for(root, "Example", "https://example.com")
}
