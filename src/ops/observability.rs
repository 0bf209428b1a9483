//! Metrics and health checks.
//!
//! Metric namespaces:
//! - api.requests_total.*
//! - api.errors_total.*
//! - api.remote_read_queries
//!
//! Names are dotted internally and exported with underscores.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Readiness status for the /-/ready endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadinessStatus {
    /// Overall ready state.
    pub ready: bool,
    /// Storage opened and published.
    pub storage: bool,
    /// Listener bound.
    pub listener: bool,
}

/// Health check result for /-/healthy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Overall healthy state.
    pub healthy: bool,
    /// Status message.
    pub message: String,
}

impl HealthStatus {
    /// Create a healthy status.
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            message: "OK".to_string(),
        }
    }

    /// Create an unhealthy status.
    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            healthy: false,
            message: message.into(),
        }
    }
}

/// Metric names.
pub mod metrics {
    /// Remote-read requests currently admitted.
    pub const REMOTE_READ_QUERIES: &str = "api.remote_read_queries";
    /// Remote-read sub-queries processed.
    pub const REMOTE_READ_SUBQUERIES_TOTAL: &str = "api.remote_read.subqueries_total";
}

/// Metrics registry.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Counter metrics.
    counters: RwLock<BTreeMap<String, AtomicU64>>,
    /// Gauge metrics.
    gauges: RwLock<BTreeMap<String, AtomicU64>>,
    /// Histogram observations (simplified: just count and sum).
    histograms: RwLock<BTreeMap<String, HistogramData>>,
}

impl MetricsRegistry {
    /// Create a new metrics registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment a counter.
    pub fn counter_inc(&self, name: &str) {
        self.counter_add(name, 1);
    }

    /// Add to a counter.
    pub fn counter_add(&self, name: &str, value: u64) {
        if let Some(counter) = self.counters.read().get(name) {
            counter.fetch_add(value, Ordering::Relaxed);
            return;
        }
        self.counters
            .write()
            .entry(name.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(value, Ordering::Relaxed);
    }

    /// Get counter value.
    pub fn counter_get(&self, name: &str) -> u64 {
        self.counters
            .read()
            .get(name)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Set a gauge value.
    pub fn gauge_set(&self, name: &str, value: u64) {
        if let Some(gauge) = self.gauges.read().get(name) {
            gauge.store(value, Ordering::Relaxed);
            return;
        }
        self.gauges
            .write()
            .entry(name.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .store(value, Ordering::Relaxed);
    }

    /// Increment a gauge.
    pub fn gauge_inc(&self, name: &str) {
        if let Some(gauge) = self.gauges.read().get(name) {
            gauge.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.gauges
            .write()
            .entry(name.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement a gauge, stopping at zero.
    pub fn gauge_dec(&self, name: &str) {
        if let Some(gauge) = self.gauges.read().get(name) {
            let _ = gauge.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(1))
            });
        }
    }

    /// Get gauge value.
    pub fn gauge_get(&self, name: &str) -> u64 {
        self.gauges
            .read()
            .get(name)
            .map(|g| g.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Record a histogram observation.
    pub fn histogram_observe(&self, name: &str, value: f64) {
        if let Some(data) = self.histograms.read().get(name) {
            data.observe(value);
            return;
        }
        self.histograms
            .write()
            .entry(name.to_string())
            .or_insert_with(HistogramData::new)
            .observe(value);
    }

    /// Get histogram data.
    pub fn histogram_get(&self, name: &str) -> Option<HistogramSnapshot> {
        self.histograms.read().get(name).map(|h| h.snapshot())
    }

    /// Export metrics in Prometheus text format.
    pub fn export_prometheus(&self) -> String {
        let mut output = String::new();

        for (name, value) in self.counters.read().iter() {
            let prometheus_name = name.replace('.', "_");
            output.push_str(&format!(
                "# TYPE {} counter\n{} {}\n",
                prometheus_name,
                prometheus_name,
                value.load(Ordering::Relaxed)
            ));
        }

        for (name, value) in self.gauges.read().iter() {
            let prometheus_name = name.replace('.', "_");
            output.push_str(&format!(
                "# TYPE {} gauge\n{} {}\n",
                prometheus_name,
                prometheus_name,
                value.load(Ordering::Relaxed)
            ));
        }

        for (name, data) in self.histograms.read().iter() {
            let prometheus_name = name.replace('.', "_");
            let snapshot = data.snapshot();
            output.push_str(&format!(
                "# TYPE {} summary\n{}_count {}\n{}_sum {}\n",
                prometheus_name, prometheus_name, snapshot.count, prometheus_name, snapshot.sum
            ));
        }

        output
    }
}

/// Histogram data storage.
#[derive(Debug)]
struct HistogramData {
    count: AtomicU64,
    sum: Mutex<f64>,
}

impl HistogramData {
    fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
            sum: Mutex::new(0.0),
        }
    }

    fn observe(&self, value: f64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        *self.sum.lock() += value;
    }

    fn snapshot(&self) -> HistogramSnapshot {
        HistogramSnapshot {
            count: self.count.load(Ordering::Relaxed),
            sum: *self.sum.lock(),
        }
    }
}

/// Histogram snapshot.
#[derive(Debug, Clone)]
pub struct HistogramSnapshot {
    /// Number of observations.
    pub count: u64,
    /// Sum of all observations.
    pub sum: f64,
}

impl HistogramSnapshot {
    /// Calculate mean.
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// API-level metrics collector.
#[derive(Debug, Default)]
pub struct ApiMetrics {
    registry: MetricsRegistry,
}

impl ApiMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the underlying registry.
    pub fn registry(&self) -> &MetricsRegistry {
        &self.registry
    }

    /// Record a dispatched request.
    pub fn record_request(&self, endpoint: &str) {
        let metric = format!("api.requests_total.{}", endpoint);
        self.registry.counter_inc(&metric);
    }

    /// Record an error by wire tag.
    pub fn record_error(&self, error_type: &str) {
        let metric = format!("api.errors_total.{}", error_type);
        self.registry.counter_inc(&metric);
    }

    /// Record request latency.
    pub fn record_latency(&self, endpoint: &str, latency_ms: f64) {
        let metric = format!("api.request_latency_ms.{}", endpoint);
        self.registry.histogram_observe(&metric, latency_ms);
    }

    /// Record processed remote-read sub-queries.
    pub fn record_remote_read_subqueries(&self, count: u64) {
        self.registry
            .counter_add(metrics::REMOTE_READ_SUBQUERIES_TOTAL, count);
    }

    /// Publish the number of admitted remote-read requests.
    pub fn set_remote_read_queries(&self, in_flight: u64) {
        self.registry
            .gauge_set(metrics::REMOTE_READ_QUERIES, in_flight);
    }

    /// A remote-read request was admitted.
    pub fn remote_read_query_started(&self) {
        self.registry.gauge_inc(metrics::REMOTE_READ_QUERIES);
    }

    /// An admitted remote-read request finished.
    pub fn remote_read_query_finished(&self) {
        self.registry.gauge_dec(metrics::REMOTE_READ_QUERIES);
    }

    /// Current number of admitted remote-read requests.
    pub fn remote_read_queries(&self) -> u64 {
        self.registry.gauge_get(metrics::REMOTE_READ_QUERIES)
    }

    /// Export all metrics.
    pub fn export(&self) -> String {
        self.registry.export_prometheus()
    }
}

/// Readiness state for /-/ready.
#[derive(Debug, Default)]
pub struct ReadinessCheck {
    status: RwLock<ReadinessStatus>,
}

impl ReadinessCheck {
    /// Create a new readiness check; not ready until marked.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current readiness status.
    pub fn status(&self) -> ReadinessStatus {
        self.status.read().clone()
    }

    /// Update readiness status.
    pub fn update(&self, status: ReadinessStatus) {
        *self.status.write() = status;
    }

    /// Mark as ready.
    pub fn set_ready(&self, ready: bool) {
        self.status.write().ready = ready;
    }

    /// Check if ready.
    pub fn is_ready(&self) -> bool {
        self.status.read().ready
    }
}

/// Health state for /-/healthy.
#[derive(Debug)]
pub struct HealthCheck {
    status: RwLock<HealthStatus>,
}

impl HealthCheck {
    pub fn new() -> Self {
        Self {
            status: RwLock::new(HealthStatus::healthy()),
        }
    }

    pub fn status(&self) -> HealthStatus {
        self.status.read().clone()
    }

    pub fn set_unhealthy(&self, message: impl Into<String>) {
        *self.status.write() = HealthStatus::unhealthy(message);
    }

    pub fn is_healthy(&self) -> bool {
        self.status.read().healthy
    }
}

impl Default for HealthCheck {
    fn default() -> Self {
        Self::new()
    }
}
