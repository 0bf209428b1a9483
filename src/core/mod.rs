//! Core runtime infrastructure.
//!
//! This module contains the essential components for running Meridian:
//! - [`config`] - Configuration parsing and validation
//! - [`context`] - Per-request cancellation and deadlines
//! - [`error`] - API error taxonomy and status mapping
//! - [`runtime`] - Main runtime orchestration
//! - [`time`] - Timestamp and duration parsing

pub mod config;
pub mod context;
pub mod error;
pub mod runtime;
pub mod time;
