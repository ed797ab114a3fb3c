//! Front matter splitting.
//!
//! A content file may start with a YAML block fenced by `---` lines:
//!
//! ```text
//! ---
//! title: Hello
//! categories: rust web
//! ---
//! Body text.
//! ```

use super::types::ContentError;

const FENCE: &str = "---";

/// Split a content file into its front matter (if any) and body.
///
/// The opening fence must be the very first line. An opening fence without a
/// closing one is an error rather than being treated as body text.
pub fn split_front_matter(text: &str) -> Result<(Option<&str>, &str), ContentError> {
  let text = text.strip_prefix('\u{feff}').unwrap_or(text);

  let Some(rest) = strip_fence_line(text) else {
    return Ok((None, text));
  };

  let mut offset = 0;
  for line in rest.split_inclusive('\n') {
    if line.trim_end() == FENCE {
      let front = &rest[..offset];
      let body = &rest[offset + line.len()..];
      return Ok((Some(front), body));
    }
    offset += line.len();
  }

  Err(ContentError::UnclosedFrontMatter)
}

/// If `text` starts with a fence line, return what follows it.
fn strip_fence_line(text: &str) -> Option<&str> {
  let first_end = text.find('\n').map(|i| i + 1).unwrap_or(text.len());
  let (first, rest) = text.split_at(first_end);
  (first.trim_end() == FENCE).then_some(rest)
}
