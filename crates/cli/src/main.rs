mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sitepub_lib::consts::CONFIG_FILENAME;

use cmd::{cmd_build, cmd_diff, cmd_fetch, cmd_publish};
use output::OutputFormat;

/// sitepub - build a static site and publish it to object storage
#[derive(Parser)]
#[command(name = "sitepub")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Path to the site configuration
  #[arg(short, long, global = true, default_value = CONFIG_FILENAME)]
  config: PathBuf,

  /// Output format
  #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
  output: OutputFormat,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build the site into the output directory
  Build,

  /// Download remote assets into the source directory
  Fetch,

  /// Build the site and publish it to the configured bucket
  Publish {
    /// Publish the existing output directory without rebuilding
    #[arg(long)]
    skip_build: bool,

    /// Show what would be uploaded and marked without changing anything
    #[arg(long)]
    dry_run: bool,
  },

  /// Compare the local build with the bucket
  Diff {
    /// Compare the existing output directory without rebuilding
    #[arg(long)]
    skip_build: bool,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let filter = if cli.verbose {
    EnvFilter::new("sitepub=debug,sitepub_lib=debug")
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
  };

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match cli.command {
    Commands::Build => cmd_build(&cli.config, cli.output),
    Commands::Fetch => cmd_fetch(&cli.config, cli.output),
    Commands::Publish { skip_build, dry_run } => cmd_publish(&cli.config, skip_build, dry_run, cli.verbose, cli.output),
    Commands::Diff { skip_build } => cmd_diff(&cli.config, skip_build, cli.verbose, cli.output),
  }
}
