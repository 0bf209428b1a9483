//! Meridian - unified CLI entrypoint.
//!
//! Usage:
//!   meridian start --config config/meridian.toml
//!   meridian config validate --config config/meridian.toml
//!   meridian config show --format json
//!   meridian config generate --output config/meridian.toml

use anyhow::Result;
use clap::Parser;
use meridian::cli::commands::{run_config, run_start};
use meridian::cli::{Cli, Commands};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config/meridian.toml"));

    match cli.command {
        Commands::Start(args) => run_start(args, &config_path, cli.log_level).await,
        Commands::Config(args) => run_config(args, &config_path),
    }
}
