//! Meridian - HTTP query and remote-read API of a metrics server.
//!
//! Meridian exposes the `/api/v1` surface of a time-series database: instant
//! and range queries, label and series discovery, targets, alerts and rules,
//! status pages, administrative store operations and the snappy/protobuf
//! remote-read endpoint. Query evaluation, storage, scraping and rule
//! evaluation are collaborators reached through the traits in [`provider`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        HTTP (axum router)                       │
//! │   CORS │ compression │ readiness │ form parsing │ JSON envelope │
//! └─────────────────────────────────────────────────────────────────┘
//!                 │                                  │
//! ┌───────────────────────────────┐  ┌──────────────────────────────┐
//! │         API handlers          │  │          Remote read         │
//! │ query │ series │ targets │ …  │  │ gate │ codec │ label merge   │
//! └───────────────────────────────┘  └──────────────────────────────┘
//!                 │                                  │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Collaborators (provider)                     │
//! │  QueryEngine │ Queryable │ TsdbAdmin │ rule/target registries   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Module Organization
//!
//! ## Core
//! - [`core::config`] - Configuration parsing and validation
//! - [`core::runtime`] - Main runtime orchestration
//! - [`core::time`] - Timestamp and duration parsing
//! - [`core::error`] - Error taxonomy and status mapping
//! - [`core::context`] - Request cancellation context
//!
//! ## API
//! - [`api::dispatch`] - Handler trait and dispatcher
//! - [`api::envelope`] - Response envelope
//! - [`api::query`], [`api::series`], [`api::targets`], [`api::rules`],
//!   [`api::status`], [`api::admin`] - Endpoint handlers
//!
//! ## Remote read
//! - [`remote::read`] - Remote-read handler
//! - [`remote::codec`] - Snappy/protobuf bodies
//!
//! ## Collaborators
//! - [`provider`] - Engine, storage and registry traits
//! - [`storage::memory`] - In-memory series store
//! - [`engine::selector`] - Selector-only query engine
//!
//! ## Networking and operations
//! - [`net::gate`] - Admission gate
//! - [`net::cors`] - CORS policy
//! - [`ops::observability`] - Metrics and health checks
//!
//! ## CLI
//! - [`cli::commands`] - CLI command implementations

// Core infrastructure
pub mod core;

// Shared data model
pub mod model;

// Collaborator interfaces
pub mod provider;

// HTTP API
pub mod api;

// Remote read protocol
pub mod remote;

// Reference collaborators
pub mod engine;
pub mod storage;

// Networking
pub mod net;

// Operations and observability
pub mod ops;

// CLI
pub mod cli;

// Re-exports for convenience
pub use self::core::{config, context, error, runtime, time};
pub use api::{router, Api, ApiOptions, Collaborators};
pub use net::{cors, gate};
pub use ops::observability;
