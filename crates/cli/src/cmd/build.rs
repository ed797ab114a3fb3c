//! Implementation of the `sitepub build` command.

use std::path::Path;
use std::time::Instant;

use anyhow::Result;

use crate::output::{OutputFormat, emit_json, field, format_elapsed, headline, stage_counts};

use super::{load_config, local_output};

pub fn cmd_build(config: &Path, output: OutputFormat) -> Result<()> {
  let start = Instant::now();
  let site = load_config(config)?;
  let result = local_output(&site, false)?;

  if output.is_json() {
    let json_output = serde_json::json!({
      "out_dir": result.out_dir,
      "posts": result.post_count,
      "assets": result.asset_map.len(),
      "files": result.files,
    });
    emit_json(&json_output)?;
  } else {
    headline(&format!("Built {}", site.site.name));
    field("Output", result.out_dir.display());
    field("Posts", result.post_count);
    field("Assets", result.asset_map.len());
    stage_counts(|class| result.files_of(class).count());
    field("Duration", format_elapsed(start.elapsed()));
  }

  Ok(())
}
