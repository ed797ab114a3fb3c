//! Top-level metadata files: `sitemap.xml` and `robots.txt`.

use chrono::NaiveDate;

use crate::content::SiteMeta;

/// One page listed in the sitemap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapEntry {
  /// Site-relative URL with a leading slash.
  pub url: String,
  pub lastmod: Option<NaiveDate>,
}

fn xml_escape(text: &str) -> String {
  let mut out = String::with_capacity(text.len());
  for c in text.chars() {
    match c {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      '\'' => out.push_str("&apos;"),
      _ => out.push(c),
    }
  }
  out
}

/// Render a sitemap for the given pages, in the order given.
pub fn sitemap_xml(site: &SiteMeta, entries: &[SitemapEntry]) -> String {
  let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
  out.push_str("<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n");
  for entry in entries {
    out.push_str("  <url>\n");
    out.push_str(&format!("    <loc>{}</loc>\n", xml_escape(&format!("{}{}", site.url, entry.url))));
    if let Some(lastmod) = entry.lastmod {
      out.push_str(&format!("    <lastmod>{}</lastmod>\n", lastmod.format("%Y-%m-%d")));
    }
    out.push_str("  </url>\n");
  }
  out.push_str("</urlset>\n");
  out
}

/// Default `robots.txt` allowing everything and pointing at the sitemap.
pub fn robots_txt(site: &SiteMeta) -> String {
  format!("User-agent: *\nAllow: /\n\nSitemap: {}/sitemap.xml\n", site.url)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn site() -> SiteMeta {
    SiteMeta {
      name: "Example".to_string(),
      url: "https://example.com".to_string(),
      build_time: "2024-01-01T00:00:00Z".to_string(),
    }
  }

  #[test]
  fn sitemap_lists_entries() {
    let xml = sitemap_xml(
      &site(),
      &[
        SitemapEntry {
          url: "/".to_string(),
          lastmod: None,
        },
        SitemapEntry {
          url: "/blog/posts/a/b/?x=1&y=2".to_string(),
          lastmod: NaiveDate::from_ymd_opt(2024, 1, 3),
        },
      ],
    );

    assert!(xml.starts_with("<?xml"));
    assert!(xml.contains("<loc>https://example.com/</loc>"));
    assert!(xml.contains("<loc>https://example.com/blog/posts/a/b/?x=1&amp;y=2</loc>"));
    assert!(xml.contains("<lastmod>2024-01-03</lastmod>"));
    assert_eq!(xml.matches("<url>").count(), 2);
  }

  #[test]
  fn robots_points_at_sitemap() {
    assert!(robots_txt(&site()).contains("Sitemap: https://example.com/sitemap.xml"));
  }
}
