//! Start command implementation.

use crate::core::config::{Config, ConfigOverrides};
use crate::core::runtime::Runtime;
use anyhow::{Context, Result};
use clap::Args;
use std::path::Path;

/// Start the Meridian server.
#[derive(Args, Debug, Default)]
pub struct StartArgs {
    /// Override `web.listen_address`.
    #[arg(long)]
    pub listen_address: Option<String>,

    /// Override `web.route_prefix`.
    #[arg(long)]
    pub route_prefix: Option<String>,

    /// Override `storage.path`.
    #[arg(long)]
    pub storage_path: Option<String>,

    /// Enable the admin endpoints regardless of the file setting.
    #[arg(long)]
    pub enable_admin_api: bool,
}

impl StartArgs {
    fn overrides(&self, log_level: Option<String>) -> ConfigOverrides {
        ConfigOverrides {
            log_level,
            storage_path: self.storage_path.clone(),
            listen_address: self.listen_address.clone(),
            route_prefix: self.route_prefix.clone(),
            enable_admin_api: self.enable_admin_api,
        }
    }
}

/// Initialize tracing subscriber if the telemetry feature is enabled.
#[cfg(feature = "telemetry")]
fn init_tracing(level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

#[cfg(not(feature = "telemetry"))]
fn init_tracing(_level: &str) {}

/// Load the configuration, apply CLI overrides and run until shutdown.
pub async fn run_start(args: StartArgs, config_path: &Path, log_level: Option<String>) -> Result<()> {
    let mut config = Config::from_file(config_path)
        .with_context(|| format!("failed to load config from {:?}", config_path))?;
    config.apply_overrides(&args.overrides(log_level));

    init_tracing(&config.telemetry.log_level);

    let mut runtime = Runtime::new(config)?;
    runtime.run().await
}
