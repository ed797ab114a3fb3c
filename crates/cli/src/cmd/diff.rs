//! Diff command implementation.
//!
//! Compares the local build with the bucket and shows what a publish would
//! upload and which remote objects it would mark for deletion.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use sitepub_lib::publish::plan_publish;
use sitepub_lib::storage::S3Store;

use crate::output::{OutputFormat, emit_json, print_plan};

use super::{load_config, local_output, runtime};

pub fn cmd_diff(config: &Path, skip_build: bool, verbose: bool, output: OutputFormat) -> Result<()> {
  let site = load_config(config)?;
  let publish = site.publish_config()?;
  let build = local_output(&site, skip_build)?;

  let store = S3Store::new(publish).context("Failed to open bucket")?;
  let rt = runtime()?;
  let plan = rt
    .block_on(plan_publish(Arc::new(store), &build, publish))
    .context("Failed to compare with bucket")?;

  if output.is_json() {
    emit_json(&plan)?;
  } else {
    print_plan(&plan, verbose)?;
  }

  Ok(())
}
