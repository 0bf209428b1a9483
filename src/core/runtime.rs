//! Main runtime orchestration.
//!
//! The runtime coordinates component lifecycle:
//! - Start order: storage → API → HTTP listener
//! - Shutdown order: HTTP listener → API → storage
//!
//! The API reports ready only once the listener is accepting connections.

use crate::api::{self, Api, ApiOptions, Collaborators};
use crate::core::config::Config;
use crate::engine::SelectorEngine;
use crate::model::labels::Labels;
use crate::ops::observability::ReadinessStatus;
use crate::provider::{EmptyRegistry, ServingConfig, StaticConfig, TsdbSlot};
use crate::storage::MemoryStorage;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Component health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentHealth {
    /// Component is starting.
    Starting,
    /// Component is healthy and operational.
    Healthy,
    /// Component has failed.
    Failed,
    /// Component is stopping.
    Stopping,
    /// Component has stopped.
    Stopped,
}

/// Health status aggregated from all components.
#[derive(Debug, Clone)]
pub struct RuntimeHealth {
    pub storage: ComponentHealth,
    pub api: ComponentHealth,
    pub listener: ComponentHealth,
}

impl Default for RuntimeHealth {
    fn default() -> Self {
        Self {
            storage: ComponentHealth::Starting,
            api: ComponentHealth::Starting,
            listener: ComponentHealth::Starting,
        }
    }
}

impl RuntimeHealth {
    /// Check if the runtime is ready to serve requests.
    pub fn is_ready(&self) -> bool {
        matches!(
            (self.storage, self.api, self.listener),
            (
                ComponentHealth::Healthy,
                ComponentHealth::Healthy,
                ComponentHealth::Healthy
            )
        )
    }

    /// Check if the runtime is alive (not failed).
    pub fn is_alive(&self) -> bool {
        !matches!(
            (self.storage, self.api, self.listener),
            (ComponentHealth::Failed, _, _)
                | (_, ComponentHealth::Failed, _)
                | (_, _, ComponentHealth::Failed)
        )
    }
}

/// Meridian runtime holding all component handles.
pub struct Runtime {
    config: Arc<Config>,

    storage: Option<Arc<MemoryStorage>>,

    storage_dir: PathBuf,

    /// Admin store handle shared with the API; filled once storage is open.
    tsdb: Arc<TsdbSlot>,

    api: Option<Arc<Api>>,

    health: RuntimeHealth,

    running: Arc<AtomicBool>,

    shutdown_tx: watch::Sender<bool>,

    shutdown_rx: watch::Receiver<bool>,

    local_addr: Option<SocketAddr>,

    server_handle: Option<JoinHandle<std::io::Result<()>>>,
}

impl Runtime {
    /// Create a new runtime with the given configuration.
    pub fn new(config: Config) -> Result<Self> {
        config.validate().context("invalid configuration")?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let storage_dir = PathBuf::from(&config.storage.path);

        Ok(Self {
            config: Arc::new(config),
            storage: None,
            storage_dir,
            tsdb: Arc::new(TsdbSlot::new()),
            api: None,
            health: RuntimeHealth::default(),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            shutdown_rx,
            local_addr: None,
            server_handle: None,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage_dir(&self) -> &PathBuf {
        &self.storage_dir
    }

    /// Get the storage layer (if initialized).
    pub fn storage(&self) -> Option<&Arc<MemoryStorage>> {
        self.storage.as_ref()
    }

    /// Get the API state (if initialized).
    pub fn api(&self) -> Option<&Arc<Api>> {
        self.api.as_ref()
    }

    /// Address the HTTP listener is bound to.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn health(&self) -> &RuntimeHealth {
        &self.health
    }

    pub fn is_ready(&self) -> bool {
        self.health.is_ready()
    }

    pub fn is_alive(&self) -> bool {
        self.health.is_alive()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Get a shutdown receiver for graceful shutdown coordination.
    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// Initialize and start all runtime components.
    pub async fn start(&mut self) -> Result<()> {
        tracing::info!(
            storage_dir = %self.storage_dir.display(),
            listen_address = %self.config.web.listen_address,
            "starting Meridian runtime"
        );

        self.init_storage().await?;
        self.init_api().await?;
        self.start_listener().await?;

        if let Some(api) = &self.api {
            api.readiness().update(ReadinessStatus {
                ready: true,
                storage: true,
                listener: true,
            });
        }
        self.running.store(true, Ordering::Release);
        tracing::info!("Meridian runtime started");

        Ok(())
    }

    async fn init_storage(&mut self) -> Result<()> {
        tracing::debug!("initializing storage layer");

        let storage = match MemoryStorage::open(self.storage_dir.clone()) {
            Ok(storage) => Arc::new(storage),
            Err(e) => {
                self.health.storage = ComponentHealth::Failed;
                return Err(anyhow::Error::new(e).context("failed to initialize storage"));
            }
        };
        self.tsdb.set(storage.clone());
        self.storage = Some(storage);
        self.health.storage = ComponentHealth::Healthy;

        tracing::info!(
            storage_dir = %self.storage_dir.display(),
            "storage layer initialized"
        );
        Ok(())
    }

    async fn init_api(&mut self) -> Result<()> {
        tracing::debug!("initializing API");

        let storage = self
            .storage
            .clone()
            .context("storage must be initialized before the API")?;
        let registry = Arc::new(EmptyRegistry);
        let serving = ServingConfig {
            external_labels: Labels::from_pairs(self.config.global.external_labels.clone()),
            rendered: self.config.render()?,
        };

        let collaborators = Collaborators {
            engine: Arc::new(SelectorEngine::new(self.config.lookback_delta()?)),
            queryable: storage,
            targets: registry.clone(),
            alertmanagers: registry.clone(),
            rules: registry,
            config: Arc::new(StaticConfig::new(serving)),
            tsdb: self.tsdb.clone(),
        };

        let mut options = ApiOptions::new(self.config.cors_policy()?);
        options.route_prefix = self.config.web.route_prefix.clone();
        options.enable_admin = self.config.web.enable_admin_api;
        options.status_mapping = self.config.status_mapping()?;
        options.remote_read_sample_limit = self.config.remote_read.sample_limit;
        options.remote_read_concurrency_limit = self.config.remote_read.concurrency_limit;
        options.flags = self.config.flags_map();

        self.api = Some(Arc::new(Api::new(collaborators, options)));
        self.health.api = ComponentHealth::Healthy;

        tracing::info!(
            route_prefix = %self.config.web.route_prefix,
            admin = self.config.web.enable_admin_api,
            "API initialized"
        );
        Ok(())
    }

    async fn start_listener(&mut self) -> Result<()> {
        let api = self
            .api
            .clone()
            .context("API must be initialized before the listener")?;

        let listener = TcpListener::bind(&self.config.web.listen_address)
            .await
            .with_context(|| {
                format!(
                    "failed to bind HTTP listener: {}",
                    self.config.web.listen_address
                )
            })?;
        let local_addr = listener
            .local_addr()
            .context("failed to read listener address")?;

        let mut shutdown_rx = self.shutdown_rx.clone();
        let app = api::router(api);
        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    while !*shutdown_rx.borrow() {
                        if shutdown_rx.changed().await.is_err() {
                            break;
                        }
                    }
                })
                .await
        });

        self.local_addr = Some(local_addr);
        self.server_handle = Some(handle);
        self.health.listener = ComponentHealth::Healthy;
        tracing::info!(bind = %local_addr, "HTTP listener started");
        Ok(())
    }

    /// Trigger graceful shutdown.
    pub fn shutdown(&self) {
        tracing::info!("shutdown requested");
        let _ = self.shutdown_tx.send(true);
    }

    /// Run the runtime until SIGINT, a shutdown request or a listener failure.
    pub async fn run(&mut self) -> Result<()> {
        self.start().await?;

        let mut shutdown_rx = self.shutdown_rx.clone();
        let mut server_exited = false;
        if let Some(handle) = self.server_handle.as_mut() {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::warn!("shutdown signal received (SIGINT)");
                }
                _ = async {
                    while !*shutdown_rx.borrow() {
                        if shutdown_rx.changed().await.is_err() {
                            break;
                        }
                    }
                } => {
                    tracing::info!("shutdown requested by component");
                }
                result = handle => {
                    server_exited = true;
                    match result {
                        Ok(Ok(())) => tracing::info!("HTTP server stopped normally"),
                        Ok(Err(e)) => {
                            self.health.listener = ComponentHealth::Failed;
                            if let Some(api) = &self.api {
                                api.health().set_unhealthy(format!("HTTP server failed: {}", e));
                            }
                            tracing::error!(error = %e, "HTTP server failed");
                        }
                        Err(e) => {
                            self.health.listener = ComponentHealth::Failed;
                            if let Some(api) = &self.api {
                                api.health().set_unhealthy("HTTP server task panicked");
                            }
                            tracing::error!(error = %e, "HTTP server task panicked");
                        }
                    }
                }
            }
        }
        if server_exited {
            self.server_handle = None;
        }

        self.stop().await
    }

    /// Stop all runtime components in reverse start order.
    pub async fn stop(&mut self) -> Result<()> {
        tracing::info!("stopping Meridian runtime");
        self.running.store(false, Ordering::Release);
        if let Some(api) = &self.api {
            api.readiness().update(ReadinessStatus::default());
        }

        let _ = self.shutdown_tx.send(true);

        self.stop_listener().await;

        self.health.api = ComponentHealth::Stopped;
        self.api = None;

        self.health.storage = ComponentHealth::Stopping;
        self.storage = None;
        self.health.storage = ComponentHealth::Stopped;

        tracing::info!("Meridian runtime stopped");
        Ok(())
    }

    async fn stop_listener(&mut self) {
        tracing::debug!("stopping HTTP listener");
        self.health.listener = ComponentHealth::Stopping;

        if let Some(handle) = self.server_handle.take() {
            match tokio::time::timeout(Duration::from_secs(5), handle).await {
                Ok(Ok(Ok(()))) => tracing::info!("HTTP server stopped"),
                Ok(Ok(Err(e))) => tracing::warn!(error = %e, "HTTP server stopped with error"),
                Ok(Err(e)) => tracing::warn!(error = %e, "HTTP server task panicked"),
                Err(_) => tracing::warn!("HTTP server stop timed out"),
            }
        }

        self.local_addr = None;
        self.health.listener = ComponentHealth::Stopped;
    }
}
