mod build;
mod diff;
mod fetch;
mod publish;

use std::path::Path;

use anyhow::{Context, Result, bail};

use sitepub_lib::build::{BuildOutput, build_site};
use sitepub_lib::config::SiteConfig;

pub use build::cmd_build;
pub use diff::cmd_diff;
pub use fetch::cmd_fetch;
pub use publish::cmd_publish;

fn load_config(path: &Path) -> Result<SiteConfig> {
  SiteConfig::load(path).with_context(|| format!("Failed to load config: {}", path.display()))
}

/// Build the site, or scan the existing output directory when `skip_build` is set.
fn local_output(site: &SiteConfig, skip_build: bool) -> Result<BuildOutput> {
  if skip_build {
    let out_dir = site.output_dir();
    if !out_dir.is_dir() {
      bail!("Output directory not found: {} (run 'sitepub build' first)", out_dir.display());
    }
    BuildOutput::from_dir(&out_dir).context("Failed to scan output directory")
  } else {
    build_site(site).context("Build failed")
  }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
  tokio::runtime::Runtime::new().context("Failed to create async runtime")
}
