//! Rewriting `url(...)` references inside stylesheets.
//!
//! Stylesheets are hashed after every other asset, so by the time one is
//! rewritten the mapping already holds the fonts and images it points at.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::{debug, warn};

use super::AssetMap;

static URL_REF: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r#"url\(\s*(['"]?)([^'")]+?)['"]?\s*\)"#).expect("url() pattern is valid"));

/// Resolve `reference` as written in the stylesheet at `stylesheet` to a
/// source-relative path. Returns `None` for references that leave the source
/// tree.
pub(crate) fn resolve_reference(stylesheet: &str, reference: &str) -> Option<String> {
  let (base, rest) = match reference.strip_prefix('/') {
    Some(absolute) => ("", absolute),
    None => (stylesheet.rsplit_once('/').map(|(dir, _)| dir).unwrap_or(""), reference),
  };

  let mut parts: Vec<&str> = base.split('/').filter(|p| !p.is_empty()).collect();
  for part in rest.split('/') {
    match part {
      "" | "." => {}
      ".." => {
        parts.pop()?;
      }
      _ => parts.push(part),
    }
  }
  Some(parts.join("/"))
}

fn is_external(reference: &str) -> bool {
  reference.starts_with('#') || reference.starts_with("//") || reference.contains(':')
}

/// Point every local `url(...)` in `content` at its hashed output.
///
/// References to paths that are not in `map` are left as written and logged.
pub(crate) fn rewrite_stylesheet(source: &str, content: &[u8], map: &AssetMap) -> Vec<u8> {
  let Ok(text) = std::str::from_utf8(content) else {
    warn!(stylesheet = %source, "stylesheet is not UTF-8, references left as written");
    return content.to_vec();
  };

  let rewritten = URL_REF.replace_all(text, |caps: &Captures| {
    let quote = &caps[1];
    let target = caps[2].trim();
    if is_external(target) {
      return caps[0].to_string();
    }

    let split = target.find(['?', '#']).unwrap_or(target.len());
    let (path, suffix) = target.split_at(split);

    match resolve_reference(source, path).as_deref().and_then(|p| map.get(p)) {
      Some(output) => {
        debug!(stylesheet = %source, reference = %path, output = %output, "rewrote stylesheet reference");
        format!("url({quote}/{output}{suffix}{quote})")
      }
      None => {
        warn!(stylesheet = %source, reference = %path, "stylesheet references an unknown asset");
        caps[0].to_string()
      }
    }
  });

  rewritten.into_owned().into_bytes()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn map() -> AssetMap {
    let mut map = AssetMap::new();
    map.insert("_assets/fonts/a.woff".to_string(), "assets/fonts/0123456789abcdef.woff".to_string());
    map.insert("_assets/images/bg.png".to_string(), "assets/images/fedcba9876543210.png".to_string());
    map
  }

  fn rewrite(css: &str) -> String {
    String::from_utf8(rewrite_stylesheet("_assets/stylesheets/site.css", css.as_bytes(), &map())).unwrap()
  }

  #[test]
  fn resolves_relative_and_absolute() {
    let css = "_assets/stylesheets/site.css";
    assert_eq!(resolve_reference(css, "../fonts/a.woff").as_deref(), Some("_assets/fonts/a.woff"));
    assert_eq!(resolve_reference(css, "./x.png").as_deref(), Some("_assets/stylesheets/x.png"));
    assert_eq!(resolve_reference(css, "/_assets/fonts/a.woff").as_deref(), Some("_assets/fonts/a.woff"));
    assert_eq!(resolve_reference(css, "../../../x.png"), None);
  }

  #[test]
  fn rewrites_font_and_image_urls() {
    let out = rewrite("@font-face{src:url(../fonts/a.woff)} body{background:url('../images/bg.png')}");
    assert_eq!(
      out,
      "@font-face{src:url(/assets/fonts/0123456789abcdef.woff)} \
       body{background:url('/assets/images/fedcba9876543210.png')}"
    );
  }

  #[test]
  fn keeps_query_and_fragment() {
    let out = rewrite(r#"src:url("../fonts/a.woff?#iefix")"#);
    assert_eq!(out, r#"src:url("/assets/fonts/0123456789abcdef.woff?#iefix")"#);
  }

  #[test]
  fn leaves_external_and_unknown_references() {
    let css = "a{b:url(data:image/png;base64,AA==)} c{d:url(https://x.test/f.woff)} e{f:url(../fonts/missing.woff)}";
    assert_eq!(rewrite(css), css);
  }
}
