//! Operations and observability.
//!
//! - [`observability`] - Metrics registry, readiness and health checks

pub mod observability;
