//! Config command implementation.

use crate::core::config::Config;
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};

/// Configuration operations.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Validate the configuration file.
    Validate,
    /// Print the effective configuration with defaults filled in.
    Show {
        /// Output format (toml, json).
        #[arg(long, default_value = "toml")]
        format: String,
    },
    /// Write a configuration file holding every default.
    Generate {
        /// Output file path; stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Run the config command against the file at `config_path`.
pub fn run_config(args: ConfigArgs, config_path: &Path) -> Result<()> {
    match args.command {
        ConfigCommand::Validate => validate_config(config_path),
        ConfigCommand::Show { format } => show_config(config_path, &format),
        ConfigCommand::Generate { output } => generate_config(output.as_deref()),
    }
}

fn validate_config(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("Config file not found: {:?}", path);
    }
    let config = Config::from_file(path)?;

    println!("✓ Config file is valid");
    if !config.web.enable_admin_api {
        println!("  ⚠ Note: admin endpoints are disabled (web.enable_admin_api)");
    }
    if config.remote_read.sample_limit == 0 {
        println!("  ⚠ Warning: remote_read.sample_limit is 0 (unlimited)");
    }
    Ok(())
}

fn render(config: &Config, format: &str) -> Result<String> {
    match format {
        "json" => serde_json::to_string_pretty(config).context("failed to render config as JSON"),
        "toml" => config.render(),
        other => anyhow::bail!("unknown format: {} (expected toml or json)", other),
    }
}

fn show_config(path: &Path, format: &str) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("Config file not found: {:?}", path);
    }
    let config = Config::from_file(path)?;
    println!("{}", render(&config, format)?);
    Ok(())
}

fn generate_config(output: Option<&Path>) -> Result<()> {
    let template = format!("# Meridian configuration\n\n{}", Config::default().render()?);

    match output {
        Some(path) => {
            std::fs::write(path, &template)
                .with_context(|| format!("failed to write {:?}", path))?;
            println!("Generated config template: {:?}", path);
        }
        None => println!("{}", template),
    }
    Ok(())
}
