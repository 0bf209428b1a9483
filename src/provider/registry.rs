//! Rule, target, alertmanager and configuration registries.

use crate::model::labels::Labels;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

// ============================================================================
// Rules
// ============================================================================

/// Last evaluation outcome of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleHealth {
    Unknown,
    Ok,
    Err,
}

/// Alert lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertState {
    Inactive,
    Pending,
    Firing,
}

/// One alert instance produced by an alerting rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub labels: Labels,
    pub annotations: Labels,
    pub state: AlertState,
    pub active_at: DateTime<Utc>,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertingRule {
    pub name: String,
    pub query: String,
    /// `for` duration before an alert fires.
    pub duration: TimeDelta,
    pub labels: Labels,
    pub annotations: Labels,
    pub alerts: Vec<Alert>,
    pub health: RuleHealth,
    pub last_error: Option<String>,
}

impl AlertingRule {
    /// Alerts that are pending or firing.
    pub fn active_alerts(&self) -> impl Iterator<Item = &Alert> {
        self.alerts
            .iter()
            .filter(|a| a.state != AlertState::Inactive)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordingRule {
    pub name: String,
    pub query: String,
    pub labels: Labels,
    pub health: RuleHealth,
    pub last_error: Option<String>,
}

/// A rule is either alerting or recording.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Alerting(AlertingRule),
    Recording(RecordingRule),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleGroup {
    pub name: String,
    pub file: String,
    pub interval: TimeDelta,
    pub rules: Vec<Rule>,
}

pub trait RulesRetriever: Send + Sync {
    fn rule_groups(&self) -> Vec<RuleGroup>;
    fn alerting_rules(&self) -> Vec<AlertingRule>;
}

// ============================================================================
// Targets
// ============================================================================

/// Scrape health of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetHealth {
    Unknown,
    Up,
    Down,
}

/// Metadata a target reported for one metric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricMetadata {
    pub metric: String,
    pub metric_type: String,
    pub help: String,
    pub unit: String,
}

/// Snapshot of one scrape target.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeTarget {
    pub discovered_labels: Labels,
    pub labels: Labels,
    pub scrape_url: String,
    pub health: TargetHealth,
    pub last_error: Option<String>,
    pub last_scrape: Option<DateTime<Utc>>,
    pub metadata: Vec<MetricMetadata>,
}

impl ScrapeTarget {
    /// Metadata for a single metric.
    pub fn metadata_for(&self, metric: &str) -> Option<&MetricMetadata> {
        self.metadata.iter().find(|m| m.metric == metric)
    }
}

/// Targets grouped by discovery job; map order is the output order.
pub type TargetGroups = BTreeMap<String, Vec<ScrapeTarget>>;

pub trait TargetRetriever: Send + Sync {
    fn targets_active(&self) -> TargetGroups;
    fn targets_dropped(&self) -> TargetGroups;
}

pub trait AlertmanagerRetriever: Send + Sync {
    fn alertmanagers(&self) -> Vec<String>;
    fn dropped_alertmanagers(&self) -> Vec<String>;
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration view used while serving requests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServingConfig {
    /// Labels attached to every series leaving this server.
    pub external_labels: Labels,
    /// Rendered configuration text.
    pub rendered: String,
}

pub trait ConfigRetriever: Send + Sync {
    /// Snapshot valid for the duration of one request.
    fn current(&self) -> Arc<ServingConfig>;
}

/// Swappable configuration snapshot.
#[derive(Debug, Default)]
pub struct StaticConfig {
    inner: parking_lot::RwLock<Arc<ServingConfig>>,
}

impl StaticConfig {
    pub fn new(config: ServingConfig) -> Self {
        Self {
            inner: parking_lot::RwLock::new(Arc::new(config)),
        }
    }

    /// Replace the snapshot; in-flight requests keep the old one.
    pub fn update(&self, config: ServingConfig) {
        *self.inner.write() = Arc::new(config);
    }
}

impl ConfigRetriever for StaticConfig {
    fn current(&self) -> Arc<ServingConfig> {
        self.inner.read().clone()
    }
}

/// Registry with no rules, targets or alertmanagers.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyRegistry;

impl RulesRetriever for EmptyRegistry {
    fn rule_groups(&self) -> Vec<RuleGroup> {
        Vec::new()
    }

    fn alerting_rules(&self) -> Vec<AlertingRule> {
        Vec::new()
    }
}

impl TargetRetriever for EmptyRegistry {
    fn targets_active(&self) -> TargetGroups {
        TargetGroups::new()
    }

    fn targets_dropped(&self) -> TargetGroups {
        TargetGroups::new()
    }
}

impl AlertmanagerRetriever for EmptyRegistry {
    fn alertmanagers(&self) -> Vec<String> {
        Vec::new()
    }

    fn dropped_alertmanagers(&self) -> Vec<String> {
        Vec::new()
    }
}
