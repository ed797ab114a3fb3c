//! Implementation of the `sitepub publish` command.
//!
//! Builds the site (unless `--skip-build`), uploads it stage by stage and marks
//! stale objects in the bucket for deferred deletion.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};

use sitepub_lib::publish::{plan_publish, publish_site};
use sitepub_lib::storage::S3Store;

use crate::output::{
  Change, OutputFormat, change, emit_json, field, format_elapsed, headline, note, print_plan, stage_counts,
};

use super::{load_config, local_output, runtime};

pub fn cmd_publish(config: &Path, skip_build: bool, dry_run: bool, verbose: bool, output: OutputFormat) -> Result<()> {
  let start = Instant::now();
  let site = load_config(config)?;
  let publish = site.publish_config()?;
  let build = local_output(&site, skip_build)?;

  let store = Arc::new(S3Store::new(publish).context("Failed to open bucket")?);
  let rt = runtime()?;

  if dry_run {
    let plan = rt
      .block_on(plan_publish(store, &build, publish))
      .context("Failed to compare with bucket")?;
    if output.is_json() {
      emit_json(&plan)?;
    } else {
      note("Dry run - no changes made");
      println!();
      print_plan(&plan, verbose)?;
    }
    return Ok(());
  }

  let report = rt
    .block_on(publish_site(store, &build, publish))
    .context("Publish failed")?;

  if output.is_json() {
    emit_json(&report)?;
  } else {
    headline(&format!("Published to {}", report.location));
    stage_counts(|class| report.manifest.count(class));
    field("Marked for deletion", report.reconcile.tagged.len());
    field("Already marked", report.reconcile.already_tagged.len());
    if verbose {
      for key in &report.reconcile.tagged {
        change(Change::Stale, key);
      }
    }
    field("Duration", format_elapsed(start.elapsed()));
  }

  Ok(())
}
