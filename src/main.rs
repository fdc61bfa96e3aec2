mod cache;
mod commands;
mod config;
mod export;
mod jira;
mod logging;
mod report;
mod timeframe;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "jirascope")]
#[command(about = "Fetch, cache and export Jira project issues")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./jirascope.yaml or $XDG_CONFIG_HOME/jirascope/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Jira project key to use
  #[arg(short, long, global = true)]
  project: Option<String>,

  /// Increase log verbosity (-v info, -vv debug, -vvv trace)
  #[arg(short, long, action = clap::ArgAction::Count, global = true)]
  verbose: u8,

  #[command(subcommand)]
  command: commands::Command,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let mut config = config::Config::load(args.config.as_deref())?;

  // Override project if specified on command line
  if let Some(project) = args.project {
    config.project = Some(project);
  }

  let _guard = logging::init(args.verbose, config.log_file.as_deref())?;

  commands::run(args.command, &config).await
}
