//! HTTP API.
//!
//! - [`envelope`] - JSON envelope and handler results
//! - [`request`] - Form parsing and parameter helpers
//! - [`dispatch`] - Handler trait and the wrapping dispatcher
//! - [`query`] - Instant and range queries
//! - [`series`] - Labels, label values and series
//! - [`targets`] - Targets, target metadata and alertmanagers
//! - [`rules`] - Alerts and rules
//! - [`status`] - Configuration and flags
//! - [`admin`] - Administrative store operations
//!
//! Every route under the prefix except `/read` goes through the
//! dispatcher; `/read` is answered by the remote-read handler directly.

pub mod admin;
pub mod dispatch;
pub mod envelope;
pub mod query;
pub mod request;
pub mod rules;
pub mod series;
pub mod status;
pub mod targets;

use crate::core::context::RequestContext;
use crate::core::error::StatusMapping;
use crate::core::time::Timestamp;
use crate::net::cors::CorsPolicy;
use crate::ops::observability::{ApiMetrics, HealthCheck, ReadinessCheck};
use crate::provider::{
    AlertmanagerRetriever, ConfigRetriever, QueryEngine, Queryable, RulesRetriever,
    TargetRetriever, TsdbSlot,
};
use crate::remote::RemoteReadHandler;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, options, post, MethodRouter};
use axum::Router;
use bytes::Bytes;
use dispatch::{endpoint, Options};
use envelope::plain_text;
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;

/// Default route prefix of the API.
pub const DEFAULT_ROUTE_PREFIX: &str = "/api/v1";

/// Components the API reads from.
#[derive(Clone)]
pub struct Collaborators {
    pub engine: Arc<dyn QueryEngine>,
    pub queryable: Arc<dyn Queryable>,
    pub targets: Arc<dyn TargetRetriever>,
    pub alertmanagers: Arc<dyn AlertmanagerRetriever>,
    pub rules: Arc<dyn RulesRetriever>,
    pub config: Arc<dyn ConfigRetriever>,
    pub tsdb: Arc<TsdbSlot>,
}

/// Behavioural switches of the API.
#[derive(Debug, Clone)]
pub struct ApiOptions {
    pub route_prefix: String,
    pub enable_admin: bool,
    pub cors: CorsPolicy,
    pub status_mapping: StatusMapping,
    /// Samples per remote-read sub-query; 0 disables the limit.
    pub remote_read_sample_limit: usize,
    /// Remote-read requests processed at once.
    pub remote_read_concurrency_limit: usize,
    /// Effective flags served by `/status/flags`.
    pub flags: BTreeMap<String, String>,
}

impl ApiOptions {
    /// Options matching the configuration defaults.
    pub fn new(cors: CorsPolicy) -> Self {
        Self {
            route_prefix: DEFAULT_ROUTE_PREFIX.to_string(),
            enable_admin: false,
            cors,
            status_mapping: StatusMapping::default(),
            remote_read_sample_limit: 50_000_000,
            remote_read_concurrency_limit: 10,
            flags: BTreeMap::new(),
        }
    }
}

type Clock = Box<dyn Fn() -> Timestamp + Send + Sync>;

/// Shared API state.
pub struct Api {
    collaborators: Collaborators,
    options: ApiOptions,
    remote_read: RemoteReadHandler,
    readiness: Arc<ReadinessCheck>,
    health: Arc<HealthCheck>,
    metrics: Arc<ApiMetrics>,
    now: Clock,
}

impl Api {
    /// Build the API; it reports not-ready until [`ReadinessCheck::set_ready`].
    pub fn new(collaborators: Collaborators, options: ApiOptions) -> Self {
        let metrics = Arc::new(ApiMetrics::new());
        let remote_read = RemoteReadHandler::new(
            collaborators.queryable.clone(),
            collaborators.config.clone(),
            options.remote_read_concurrency_limit,
            options.remote_read_sample_limit,
            metrics.clone(),
        );
        Self {
            collaborators,
            options,
            remote_read,
            readiness: Arc::new(ReadinessCheck::new()),
            health: Arc::new(HealthCheck::new()),
            metrics,
            now: Box::new(Timestamp::now),
        }
    }

    /// Replace the clock used for default query times.
    pub fn with_clock(mut self, now: impl Fn() -> Timestamp + Send + Sync + 'static) -> Self {
        self.now = Box::new(now);
        self
    }

    pub fn now(&self) -> Timestamp {
        (self.now)()
    }

    pub fn engine(&self) -> &dyn QueryEngine {
        self.collaborators.engine.as_ref()
    }

    pub fn queryable(&self) -> Arc<dyn Queryable> {
        self.collaborators.queryable.clone()
    }

    pub fn targets(&self) -> &dyn TargetRetriever {
        self.collaborators.targets.as_ref()
    }

    pub fn alertmanagers(&self) -> &dyn AlertmanagerRetriever {
        self.collaborators.alertmanagers.as_ref()
    }

    pub fn rules(&self) -> &dyn RulesRetriever {
        self.collaborators.rules.as_ref()
    }

    pub fn config(&self) -> &dyn ConfigRetriever {
        self.collaborators.config.as_ref()
    }

    pub fn tsdb(&self) -> &TsdbSlot {
        &self.collaborators.tsdb
    }

    pub fn flags(&self) -> &BTreeMap<String, String> {
        &self.options.flags
    }

    pub fn admin_enabled(&self) -> bool {
        self.options.enable_admin
    }

    pub fn cors(&self) -> &CorsPolicy {
        &self.options.cors
    }

    pub fn status_mapping(&self) -> &StatusMapping {
        &self.options.status_mapping
    }

    pub fn route_prefix(&self) -> &str {
        &self.options.route_prefix
    }

    pub fn remote_read(&self) -> &RemoteReadHandler {
        &self.remote_read
    }

    pub fn readiness(&self) -> &Arc<ReadinessCheck> {
        &self.readiness
    }

    pub fn health(&self) -> &Arc<HealthCheck> {
        &self.health
    }

    pub fn metrics(&self) -> &Arc<ApiMetrics> {
        &self.metrics
    }
}

// ============================================================================
// Routing
// ============================================================================

fn with_options(route: MethodRouter<Arc<Api>>) -> MethodRouter<Arc<Api>> {
    route.options(endpoint::<Options>)
}

/// Build the full HTTP router: API routes under the prefix plus the
/// operational endpoints at the root.
pub fn router(api: Arc<Api>) -> Router {
    use admin::{CleanTombstones, DeleteSeries, Snapshot};
    use query::{InstantQuery, RangeQuery};
    use rules::{Alerts, Rules};
    use series::{DropSeries, LabelNames, LabelValues, Series};
    use status::{ServeConfig, ServeFlags};
    use targets::{Alertmanagers, TargetMetadata, Targets};

    let routes = Router::new()
        .route(
            "/query",
            with_options(get(endpoint::<InstantQuery>).post(endpoint::<InstantQuery>)),
        )
        .route(
            "/query_range",
            with_options(get(endpoint::<RangeQuery>).post(endpoint::<RangeQuery>)),
        )
        .route(
            "/labels",
            with_options(get(endpoint::<LabelNames>).post(endpoint::<LabelNames>)),
        )
        .route(
            "/label/:name/values",
            with_options(get(endpoint::<LabelValues>)),
        )
        .route(
            "/series",
            with_options(
                get(endpoint::<Series>)
                    .post(endpoint::<Series>)
                    .delete(endpoint::<DropSeries>),
            ),
        )
        .route("/targets", with_options(get(endpoint::<Targets>)))
        .route(
            "/targets/metadata",
            with_options(get(endpoint::<TargetMetadata>)),
        )
        .route("/alertmanagers", with_options(get(endpoint::<Alertmanagers>)))
        .route("/status/config", with_options(get(endpoint::<ServeConfig>)))
        .route("/status/flags", with_options(get(endpoint::<ServeFlags>)))
        .route("/alerts", with_options(get(endpoint::<Alerts>)))
        .route("/rules", with_options(get(endpoint::<Rules>)))
        .route(
            "/admin/tsdb/delete_series",
            with_options(post(endpoint::<DeleteSeries>).put(endpoint::<DeleteSeries>)),
        )
        .route(
            "/admin/tsdb/clean_tombstones",
            with_options(post(endpoint::<CleanTombstones>).put(endpoint::<CleanTombstones>)),
        )
        .route(
            "/admin/tsdb/snapshot",
            with_options(post(endpoint::<Snapshot>).put(endpoint::<Snapshot>)),
        )
        .route("/*path", options(endpoint::<Options>).fallback(not_found))
        .layer(CompressionLayer::new())
        .route("/read", with_options(post(remote_read)));

    let prefix = api.route_prefix().trim_end_matches('/');
    let root = if prefix.is_empty() {
        Router::new().merge(routes)
    } else {
        Router::new().nest(prefix, routes)
    };

    root.route("/metrics", get(serve_metrics))
        .route("/-/healthy", get(serve_healthy))
        .route("/-/ready", get(serve_ready))
        .with_state(api)
}

/// `POST /read`: snappy-compressed protobuf, no JSON envelope.
async fn remote_read(State(api): State<Arc<Api>>, body: Bytes) -> Response {
    let ctx = RequestContext::new();
    let _cancel_on_drop = ctx.drop_guard();
    api.metrics().record_request("read");
    api.remote_read().serve(&ctx, &body).await
}

/// Unknown API path for any method but `OPTIONS`.
async fn not_found() -> Response {
    plain_text(StatusCode::NOT_FOUND, "404 page not found")
}

async fn serve_metrics(State(api): State<Arc<Api>>) -> Response {
    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4")],
        api.metrics().export(),
    )
        .into_response()
}

async fn serve_healthy(State(api): State<Arc<Api>>) -> Response {
    let status = api.health().status();
    if status.healthy {
        plain_text(StatusCode::OK, "Healthy.")
    } else {
        plain_text(StatusCode::SERVICE_UNAVAILABLE, &status.message)
    }
}

async fn serve_ready(State(api): State<Arc<Api>>) -> Response {
    if api.readiness().is_ready() {
        plain_text(StatusCode::OK, "Ready.")
    } else {
        plain_text(StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable")
    }
}
