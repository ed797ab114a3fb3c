//! Implementation of the `sitepub fetch` command.

use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::{OwoColorize, Stream};

use sitepub_lib::fetch::{FetchOutcome, fetch_remote_assets};

use crate::output::{Change, OutputFormat, change, emit_json, format_size, headline, note};

use super::{load_config, runtime};

pub fn cmd_fetch(config: &Path, output: OutputFormat) -> Result<()> {
  let site = load_config(config)?;

  if site.remote_assets.is_empty() && !output.is_json() {
    note("No remote assets configured");
    return Ok(());
  }

  let rt = runtime()?;
  let outcomes = rt
    .block_on(fetch_remote_assets(&site))
    .context("Failed to fetch remote assets")?;

  if output.is_json() {
    emit_json(&outcomes)?;
    return Ok(());
  }

  for outcome in &outcomes {
    match outcome {
      FetchOutcome::Downloaded { path, bytes } => {
        change(Change::Added, format!("{} ({})", path.display(), format_size(*bytes as u64)))
      }
      FetchOutcome::Cached { path } => change(
        Change::Unchanged,
        format!(
          "{} {}",
          path.display(),
          "(up to date)".if_supports_color(Stream::Stdout, |s| s.dimmed())
        ),
      ),
    }
  }

  let downloaded = outcomes
    .iter()
    .filter(|o| matches!(o, FetchOutcome::Downloaded { .. }))
    .count();
  headline(&format!("{} downloaded, {} up to date", downloaded, outcomes.len() - downloaded));

  Ok(())
}
