//! Common test utilities.
//!
//! This module contains shared helpers for integration tests.
//! Import with `mod common;` in test files.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use chrono::{TimeDelta, TimeZone, Utc};
use meridian::api::{Api, ApiOptions, Collaborators};
use meridian::core::context::RequestContext;
use meridian::core::time::Timestamp;
use meridian::engine::SelectorEngine;
use meridian::model::labels::Labels;
use meridian::net::cors::CorsPolicy;
use meridian::provider::engine::QueryFuture;
use meridian::provider::registry::{
    Alert, AlertState, AlertingRule, MetricMetadata, RecordingRule, Rule, RuleGroup, RuleHealth,
    ScrapeTarget, TargetGroups, TargetHealth,
};
use meridian::provider::{
    AlertmanagerRetriever, EngineError, Query, QueryEngine, QueryResult, Queryable,
    RulesRetriever, ServingConfig, StaticConfig, TargetRetriever, TsdbSlot,
};
use meridian::storage::MemoryStorage;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tower::ServiceExt;

// ============================================================================
// Config files
// ============================================================================

/// Create a configuration file holding `content`.
pub fn create_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write config");
    file
}

/// Create a minimal valid configuration file.
pub fn create_minimal_config() -> NamedTempFile {
    create_config(
        r#"
[web]
listen_address = "127.0.0.1:0"
"#,
    )
}

/// Create a configuration file rooted at `storage_path` with admin enabled.
pub fn create_config_with_storage(storage_path: &Path) -> NamedTempFile {
    create_config(&format!(
        r#"
[web]
listen_address = "127.0.0.1:0"
enable_admin_api = true

[global.external_labels]
region = "eu"

[storage]
path = "{}"
"#,
        storage_path.display()
    ))
}

// ============================================================================
// Fixture data
// ============================================================================

/// Evaluation time used by fixtures: 2024-01-01T00:00:00Z.
pub const FIXTURE_TIME_MS: i64 = 1_704_067_200_000;

pub fn labels(pairs: &[(&str, &str)]) -> Labels {
    Labels::from_pairs(pairs.iter().copied())
}

/// Store with `up` for two api instances and one db instance, one sample
/// per minute over the ten minutes before [`FIXTURE_TIME_MS`].
pub fn fixture_storage(dir: &Path) -> Arc<MemoryStorage> {
    let storage = Arc::new(MemoryStorage::new(dir));
    for (job, instance) in [("api", "a:9100"), ("api", "b:9100"), ("db", "c:9100")] {
        let series = labels(&[("__name__", "up"), ("job", job), ("instance", instance)]);
        for minute in 0..10 {
            storage
                .append(series.clone(), FIXTURE_TIME_MS - (10 - minute) * 60_000, 1.0)
                .unwrap();
        }
    }
    storage
        .append(
            labels(&[("__name__", "http_requests_total"), ("job", "api")]),
            FIXTURE_TIME_MS - 60_000,
            42.0,
        )
        .unwrap();
    storage
}

/// Registry with fixed targets, alertmanagers and rules.
#[derive(Debug, Default)]
pub struct FixtureRegistry;

fn fixture_target(job: &str, instance: &str, health: TargetHealth) -> ScrapeTarget {
    ScrapeTarget {
        discovered_labels: labels(&[("__address__", instance), ("job", job)]),
        labels: labels(&[("instance", instance), ("job", job)]),
        scrape_url: format!("http://{}/metrics", instance),
        health,
        last_error: match health {
            TargetHealth::Down => Some("connection refused".to_string()),
            _ => None,
        },
        last_scrape: match health {
            TargetHealth::Unknown => None,
            _ => Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
        },
        metadata: vec![
            MetricMetadata {
                metric: "up".to_string(),
                metric_type: "gauge".to_string(),
                help: "Target is up.".to_string(),
                unit: String::new(),
            },
            MetricMetadata {
                metric: "http_requests_total".to_string(),
                metric_type: "counter".to_string(),
                help: "Requests served.".to_string(),
                unit: String::new(),
            },
        ],
    }
}

impl TargetRetriever for FixtureRegistry {
    fn targets_active(&self) -> TargetGroups {
        let mut groups = TargetGroups::new();
        groups.insert(
            "api".to_string(),
            vec![
                fixture_target("api", "a:9100", TargetHealth::Up),
                fixture_target("api", "b:9100", TargetHealth::Down),
            ],
        );
        groups.insert(
            "db".to_string(),
            vec![fixture_target("db", "c:9100", TargetHealth::Unknown)],
        );
        groups
    }

    fn targets_dropped(&self) -> TargetGroups {
        let mut dropped = fixture_target("api", "d:9100", TargetHealth::Unknown);
        dropped.labels = Labels::empty();
        let mut groups = TargetGroups::new();
        groups.insert("api".to_string(), vec![dropped]);
        groups
    }
}

impl AlertmanagerRetriever for FixtureRegistry {
    fn alertmanagers(&self) -> Vec<String> {
        vec!["http://alertmanager:9093/api/v1/alerts".to_string()]
    }

    fn dropped_alertmanagers(&self) -> Vec<String> {
        vec!["http://dropped:9093/api/v1/alerts".to_string()]
    }
}

fn fixture_alerting_rule() -> AlertingRule {
    let firing = Alert {
        labels: labels(&[("alertname", "InstanceDown"), ("instance", "b:9100")]),
        annotations: labels(&[("summary", "instance down")]),
        state: AlertState::Firing,
        active_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        value: 0.0,
    };
    let mut inactive = firing.clone();
    inactive.state = AlertState::Inactive;
    inactive.labels = labels(&[("alertname", "InstanceDown"), ("instance", "a:9100")]);

    AlertingRule {
        name: "InstanceDown".to_string(),
        query: "up == 0".to_string(),
        duration: TimeDelta::minutes(5),
        labels: labels(&[("severity", "page")]),
        annotations: labels(&[("summary", "instance down")]),
        alerts: vec![firing, inactive],
        health: RuleHealth::Ok,
        last_error: None,
    }
}

impl RulesRetriever for FixtureRegistry {
    fn rule_groups(&self) -> Vec<RuleGroup> {
        vec![RuleGroup {
            name: "example".to_string(),
            file: "rules/example.yml".to_string(),
            interval: TimeDelta::seconds(60),
            rules: vec![
                Rule::Alerting(fixture_alerting_rule()),
                Rule::Recording(RecordingRule {
                    name: "job:up:sum".to_string(),
                    query: "sum by (job) (up)".to_string(),
                    labels: Labels::empty(),
                    health: RuleHealth::Err,
                    last_error: Some("many-to-many matching not allowed".to_string()),
                }),
            ],
        }]
    }

    fn alerting_rules(&self) -> Vec<AlertingRule> {
        vec![fixture_alerting_rule()]
    }
}

// ============================================================================
// Engines
// ============================================================================

/// Engine whose queries block until their context ends.
#[derive(Debug, Default)]
pub struct BlockingEngine {
    pub closed: Arc<AtomicUsize>,
}

struct BlockingQuery {
    closed: Arc<AtomicUsize>,
}

impl Query for BlockingQuery {
    fn exec<'a>(&'a self, ctx: &'a RequestContext) -> QueryFuture<'a> {
        Box::pin(async move {
            let err = ctx.done().await;
            QueryResult::err(EngineError::from_context(err, "query execution"), Vec::new())
        })
    }

    fn stats(&self) -> Option<serde_json::Value> {
        None
    }

    fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

impl QueryEngine for BlockingEngine {
    fn new_instant_query(
        &self,
        _queryable: Arc<dyn Queryable>,
        _expr: &str,
        _ts: Timestamp,
    ) -> Result<Box<dyn Query>, EngineError> {
        Ok(Box::new(BlockingQuery {
            closed: self.closed.clone(),
        }))
    }

    fn new_range_query(
        &self,
        _queryable: Arc<dyn Queryable>,
        _expr: &str,
        _start: Timestamp,
        _end: Timestamp,
        _step: TimeDelta,
    ) -> Result<Box<dyn Query>, EngineError> {
        Ok(Box::new(BlockingQuery {
            closed: self.closed.clone(),
        }))
    }
}

// ============================================================================
// API construction
// ============================================================================

/// Knobs for [`TestApi::build`].
pub struct TestApiBuilder {
    pub options: ApiOptions,
    pub engine: Option<Arc<dyn QueryEngine>>,
    pub external_labels: Labels,
    pub open_tsdb: bool,
    pub ready: bool,
}

impl Default for TestApiBuilder {
    fn default() -> Self {
        Self {
            options: ApiOptions::new(CorsPolicy::new(".*").unwrap()),
            engine: None,
            external_labels: Labels::empty(),
            open_tsdb: true,
            ready: true,
        }
    }
}

/// API over fixture collaborators.
pub struct TestApi {
    pub api: Arc<Api>,
    pub storage: Arc<MemoryStorage>,
    pub dir: tempfile::TempDir,
}

impl TestApiBuilder {
    pub fn admin(mut self) -> Self {
        self.options.enable_admin = true;
        self
    }

    pub fn engine(mut self, engine: Arc<dyn QueryEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn external_labels(mut self, pairs: &[(&str, &str)]) -> Self {
        self.external_labels = labels(pairs);
        self
    }

    pub fn build(self) -> TestApi {
        let dir = tempfile::TempDir::new().unwrap();
        let storage = fixture_storage(dir.path());
        let registry = Arc::new(FixtureRegistry);
        let tsdb = Arc::new(TsdbSlot::new());
        if self.open_tsdb {
            tsdb.set(storage.clone());
        }

        let collaborators = Collaborators {
            engine: self
                .engine
                .unwrap_or_else(|| Arc::new(SelectorEngine::default()) as Arc<dyn QueryEngine>),
            queryable: storage.clone(),
            targets: registry.clone(),
            alertmanagers: registry.clone(),
            rules: registry,
            config: Arc::new(StaticConfig::new(ServingConfig {
                external_labels: self.external_labels,
                rendered: "[web]\nlisten_address = \"127.0.0.1:0\"\n".to_string(),
            })),
            tsdb,
        };

        let api = Api::new(collaborators, self.options)
            .with_clock(|| Timestamp::from_millis(FIXTURE_TIME_MS));
        api.readiness().set_ready(self.ready);

        TestApi {
            api: Arc::new(api),
            storage,
            dir,
        }
    }
}

impl TestApi {
    pub fn router(&self) -> Router {
        meridian::api::router(self.api.clone())
    }
}

// ============================================================================
// HTTP helpers
// ============================================================================

/// Response status, headers and collected body.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap_or_else(|e| {
            panic!(
                "invalid JSON body ({}): {}",
                e,
                String::from_utf8_lossy(&self.body)
            )
        })
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub async fn send(router: Router, request: Request<Body>) -> TestResponse {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    TestResponse {
        status,
        headers,
        body,
    }
}

pub async fn get(router: Router, uri: &str) -> TestResponse {
    send(
        router,
        Request::get(uri).body(Body::empty()).unwrap(),
    )
    .await
}

pub async fn post_form(router: Router, uri: &str, form: &str) -> TestResponse {
    send(
        router,
        Request::post(uri)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(form.to_string()))
            .unwrap(),
    )
    .await
}
