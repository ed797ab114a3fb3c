//! Terminal rendering for sitepub commands.
//!
//! Human output goes to stdout, colored when the terminal supports it.
//! `--output json` replaces it with a single JSON document.

use std::fmt::Display;
use std::io::{self, Write};
use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

use sitepub_lib::publish::{PublishPlan, ResourceClass};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

/// What happens to one file or object, shown as a one-character marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
  Added,
  Overwritten,
  Stale,
  Unchanged,
}

impl Change {
  pub fn marker(self) -> &'static str {
    match self {
      Change::Added => "+",
      Change::Overwritten => "~",
      Change::Stale => "-",
      Change::Unchanged => "•",
    }
  }

  fn paint(self) -> String {
    let marker = self.marker();
    match self {
      Change::Added => marker.if_supports_color(Stream::Stdout, |s| s.green()).to_string(),
      Change::Overwritten => marker.if_supports_color(Stream::Stdout, |s| s.yellow()).to_string(),
      Change::Stale => marker.if_supports_color(Stream::Stdout, |s| s.red()).to_string(),
      Change::Unchanged => marker.if_supports_color(Stream::Stdout, |s| s.dimmed()).to_string(),
    }
  }
}

/// `✓ message`, for the outcome of a command.
pub fn headline(message: &str) {
  println!("{} {}", "✓".if_supports_color(Stream::Stdout, |s| s.green()), message);
}

pub fn note(message: &str) {
  println!("{} {}", "•".if_supports_color(Stream::Stdout, |s| s.blue()), message);
}

pub fn field(label: &str, value: impl Display) {
  println!("  {}: {}", label.if_supports_color(Stream::Stdout, |s| s.dimmed()), value);
}

pub fn change(change: Change, text: impl Display) {
  println!("  {} {}", change.paint(), text);
}

/// One `field` per upload stage, in upload order.
pub fn stage_counts(count: impl Fn(ResourceClass) -> usize) {
  for class in ResourceClass::ORDER {
    field(class.as_str(), count(class));
  }
}

/// Render a publish plan: uploads per stage, then stale objects.
pub fn write_plan(out: &mut impl Write, plan: &PublishPlan, verbose: bool) -> io::Result<()> {
  writeln!(out, "Comparing local build → {}", plan.location)?;
  writeln!(out)?;

  writeln!(out, "Uploads:")?;
  for class in ResourceClass::ORDER {
    writeln!(out, "  {}: {}", class, plan.uploads.get(&class).copied().unwrap_or(0))?;
  }
  writeln!(out, "  {} {} new", Change::Added.paint(), plan.added.len())?;
  writeln!(out, "  {} {} overwritten", Change::Overwritten.paint(), plan.overwritten.len())?;
  if verbose {
    for key in &plan.added {
      writeln!(out, "      {} {}", Change::Added.paint(), key)?;
    }
  }

  writeln!(out)?;
  writeln!(out, "Stale objects:")?;
  if plan.reconcile.candidates() == 0 {
    return writeln!(out, "  none");
  }
  writeln!(
    out,
    "  {} {} to mark for deletion",
    Change::Stale.paint(),
    plan.reconcile.tagged.len()
  )?;
  writeln!(
    out,
    "  {} {} already marked",
    Change::Unchanged.paint(),
    plan.reconcile.already_tagged.len()
  )?;
  for key in &plan.reconcile.tagged {
    writeln!(out, "      {} {}", Change::Stale.paint(), key)?;
  }
  if verbose {
    for key in &plan.reconcile.already_tagged {
      writeln!(out, "      {} {}", Change::Unchanged.paint(), key)?;
    }
  }
  Ok(())
}

pub fn print_plan(plan: &PublishPlan, verbose: bool) -> anyhow::Result<()> {
  write_plan(&mut io::stdout().lock(), plan, verbose).context("Failed to write plan")
}

pub fn emit_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let mut stdout = io::stdout().lock();
  serde_json::to_writer_pretty(&mut stdout, value).context("Failed to serialize to JSON")?;
  writeln!(stdout)?;
  Ok(())
}

/// Download sizes, in binary units.
pub fn format_size(bytes: u64) -> String {
  const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];

  let mut value = bytes as f64;
  let mut unit = 0;
  while value >= 1024.0 && unit < UNITS.len() - 1 {
    value /= 1024.0;
    unit += 1;
  }

  if unit == 0 {
    format!("{} B", bytes)
  } else {
    format!("{:.1} {}", value, UNITS[unit])
  }
}

pub fn format_elapsed(elapsed: Duration) -> String {
  if elapsed < Duration::from_secs(1) {
    format!("{}ms", elapsed.as_millis())
  } else {
    format!("{:.1}s", elapsed.as_secs_f64())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use sitepub_lib::publish::ReconcileReport;
  use std::collections::BTreeMap;

  fn plan(tagged: &[&str], already: &[&str]) -> PublishPlan {
    PublishPlan {
      location: "s3://example.com".to_string(),
      inventory: 3,
      uploads: BTreeMap::from([(ResourceClass::Static, 2), (ResourceClass::Page, 1)]),
      added: vec!["about.html".to_string()],
      overwritten: vec!["index.html".to_string(), "assets/styles/0a.css".to_string()],
      reconcile: ReconcileReport {
        tagged: tagged.iter().map(|s| s.to_string()).collect(),
        already_tagged: already.iter().map(|s| s.to_string()).collect(),
      },
    }
  }

  fn render(plan: &PublishPlan, verbose: bool) -> String {
    let mut out = Vec::new();
    write_plan(&mut out, plan, verbose).unwrap();
    String::from_utf8(out).unwrap()
  }

  #[test]
  fn plan_lists_every_stage_in_order() {
    let text = render(&plan(&[], &[]), false);
    let stat = text.find("static: 2").unwrap();
    let page = text.find("page: 1").unwrap();
    let meta = text.find("meta: 0").unwrap();
    assert!(stat < page && page < meta, "{}", text);
    assert!(text.contains("1 new"));
    assert!(text.contains("2 overwritten"));
    assert!(text.trim_end().ends_with("none"));
  }

  #[test]
  fn plan_shows_stale_keys() {
    let text = render(&plan(&["gone.html"], &["older.html"]), false);
    assert!(text.contains("1 to mark for deletion"));
    assert!(text.contains("1 already marked"));
    assert!(text.contains("gone.html"));
    assert!(!text.contains("older.html"));
    assert!(!text.contains("      + about.html"));

    let verbose = render(&plan(&["gone.html"], &["older.html"]), true);
    assert!(verbose.contains("older.html"));
    assert!(verbose.contains("about.html"));
  }

  #[test]
  fn change_markers() {
    assert_eq!(Change::Added.marker(), "+");
    assert_eq!(Change::Overwritten.marker(), "~");
    assert_eq!(Change::Stale.marker(), "-");
  }

  #[test]
  fn sizes() {
    assert_eq!(format_size(0), "0 B");
    assert_eq!(format_size(1023), "1023 B");
    assert_eq!(format_size(2048), "2.0 KiB");
    assert_eq!(format_size(5 * 1024 * 1024 + 512 * 1024), "5.5 MiB");
    assert_eq!(format_size(3 << 30), "3.0 GiB");
  }

  #[test]
  fn elapsed() {
    assert_eq!(format_elapsed(Duration::from_millis(42)), "42ms");
    assert_eq!(format_elapsed(Duration::from_millis(2500)), "2.5s");
  }
}
