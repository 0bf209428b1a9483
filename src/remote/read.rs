//! Remote-read request handling.
//!
//! Per request: admission → decode → for each sub-query (rewrite matchers,
//! select, bounded encode, re-attach external labels) → encode batch. Any
//! failure answers the whole request with a plain-text transport error; the
//! gate permit is scoped, so it is released on every exit path.

use crate::api::envelope::plain_text;
use crate::core::context::{ContextError, RequestContext};
use crate::model::matcher::{MatchType, Matcher, MatcherError};
use crate::net::gate::{AdmissionGate, GateError};
use crate::ops::observability::ApiMetrics;
use crate::provider::{ConfigRetriever, QuerierGuard, Queryable, SelectHints, SeriesSet, StorageError};
use crate::remote::codec::{self, CodecError, CONTENT_ENCODING, CONTENT_TYPE};
use crate::remote::labels::{merge_labels, rewrite_matchers, sorted_external_labels};
use crate::remote::proto;
use axum::body::Body;
use axum::http::header::{CONTENT_ENCODING as CONTENT_ENCODING_HEADER, CONTENT_TYPE as CONTENT_TYPE_HEADER};
use axum::http::{HeaderValue, StatusCode};
use axum::response::Response;
use std::sync::Arc;
use thiserror::Error;

/// Remote-read failure.
#[derive(Debug, Error)]
pub enum RemoteReadError {
    #[error(transparent)]
    Gate(#[from] GateError),

    #[error("{0}")]
    Decode(CodecError),

    #[error("{0}")]
    InvalidQuery(String),

    #[error(transparent)]
    Storage(StorageError),

    #[error("exceeded sample limit ({0})")]
    SampleLimit(usize),

    #[error("{0}")]
    Encode(CodecError),

    #[error(transparent)]
    Context(#[from] ContextError),
}

impl From<MatcherError> for RemoteReadError {
    fn from(err: MatcherError) -> Self {
        Self::InvalidQuery(err.to_string())
    }
}

impl RemoteReadError {
    /// Transport status for this failure.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Decode(_) | Self::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            Self::Storage(err) => err
                .status()
                .and_then(|s| StatusCode::from_u16(s).ok())
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Self::Gate(_) | Self::SampleLimit(_) | Self::Encode(_) | Self::Context(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Serves remote-read requests under an admission gate.
pub struct RemoteReadHandler {
    gate: AdmissionGate,
    queryable: Arc<dyn Queryable>,
    config: Arc<dyn ConfigRetriever>,
    sample_limit: usize,
    metrics: Arc<ApiMetrics>,
}

impl RemoteReadHandler {
    /// `sample_limit` of 0 disables the limit.
    pub fn new(
        queryable: Arc<dyn Queryable>,
        config: Arc<dyn ConfigRetriever>,
        concurrency_limit: usize,
        sample_limit: usize,
        metrics: Arc<ApiMetrics>,
    ) -> Self {
        Self {
            gate: AdmissionGate::new(concurrency_limit, metrics.clone()),
            queryable,
            config,
            sample_limit,
            metrics,
        }
    }

    /// The admission gate guarding this handler.
    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    /// Answer one request body.
    pub async fn serve(&self, ctx: &RequestContext, body: &[u8]) -> Response {
        match self.read(ctx, body).await {
            Ok(encoded) => {
                let mut response = Response::new(Body::from(encoded));
                let headers = response.headers_mut();
                headers.insert(CONTENT_TYPE_HEADER, HeaderValue::from_static(CONTENT_TYPE));
                headers.insert(
                    CONTENT_ENCODING_HEADER,
                    HeaderValue::from_static(CONTENT_ENCODING),
                );
                response
            }
            Err(err) => {
                let status = err.status_code();
                tracing::warn!(error = %err, status = status.as_u16(), "remote read failed");
                plain_text(status, &err.to_string())
            }
        }
    }

    /// Process a compressed request body into a compressed response body.
    pub async fn read(&self, ctx: &RequestContext, body: &[u8]) -> Result<Vec<u8>, RemoteReadError> {
        let _permit = self.gate.acquire(ctx).await?;

        let request = codec::decode_read_request(body).map_err(RemoteReadError::Decode)?;
        let response = self.execute(ctx, &request)?;
        ctx.check()?;
        codec::encode_read_response(&response).map_err(RemoteReadError::Encode)
    }

    /// Run every sub-query of a decoded request, in order.
    pub fn execute(
        &self,
        ctx: &RequestContext,
        request: &proto::ReadRequest,
    ) -> Result<proto::ReadResponse, RemoteReadError> {
        let config = self.config.current();
        let external = sorted_external_labels(&config.external_labels);

        let mut results = Vec::with_capacity(request.queries.len());
        for query in &request.queries {
            ctx.check()?;
            let (mint, maxt, matchers, hints) = from_query(query)?;
            let matchers = rewrite_matchers(matchers, &config.external_labels);

            let querier = QuerierGuard::new(
                self.queryable
                    .querier(ctx, mint, maxt)
                    .map_err(RemoteReadError::Storage)?,
            );
            let (set, warnings) = querier
                .select(hints.as_ref(), &matchers)
                .map_err(RemoteReadError::Storage)?;
            if !warnings.is_empty() {
                tracing::debug!(count = warnings.len(), "remote read select returned warnings");
            }

            let mut result = to_query_result(set, self.sample_limit)?;
            for series in &mut result.timeseries {
                series.labels = merge_labels(&series.labels, &external);
            }
            results.push(result);
        }

        self.metrics
            .record_remote_read_subqueries(request.queries.len() as u64);
        Ok(proto::ReadResponse { results })
    }
}

/// Convert a wire sub-query into a time range, matchers and select hints.
pub fn from_query(
    query: &proto::Query,
) -> Result<(i64, i64, Vec<Matcher>, Option<SelectHints>), RemoteReadError> {
    let matchers = query
        .matchers
        .iter()
        .map(from_label_matcher)
        .collect::<Result<Vec<_>, _>>()?;

    let hints = query.hints.as_ref().map(|h| SelectHints {
        start_ms: h.start_ms,
        end_ms: h.end_ms,
        step_ms: h.step_ms,
        func: h.func.clone(),
    });

    Ok((query.start_timestamp_ms, query.end_timestamp_ms, matchers, hints))
}

fn from_label_matcher(matcher: &proto::LabelMatcher) -> Result<Matcher, RemoteReadError> {
    let match_type = match proto::MatcherType::from_i32(matcher.r#type) {
        Some(proto::MatcherType::Eq) => MatchType::Equal,
        Some(proto::MatcherType::Neq) => MatchType::NotEqual,
        Some(proto::MatcherType::Re) => MatchType::Regex,
        Some(proto::MatcherType::Nre) => MatchType::NotRegex,
        None => {
            return Err(RemoteReadError::InvalidQuery(format!(
                "invalid matcher type {}",
                matcher.r#type
            )))
        }
    };
    Ok(Matcher::new(match_type, matcher.name.clone(), matcher.value.clone())?)
}

/// Materialize a series set, failing once more than `sample_limit` samples
/// are accumulated (0 means unlimited).
pub fn to_query_result(
    set: SeriesSet,
    sample_limit: usize,
) -> Result<proto::QueryResult, RemoteReadError> {
    let mut num_samples = 0usize;
    let mut timeseries = Vec::new();

    for item in set {
        let series = item.map_err(RemoteReadError::Storage)?;
        num_samples += series.samples.len();
        if sample_limit > 0 && num_samples > sample_limit {
            return Err(RemoteReadError::SampleLimit(sample_limit));
        }
        timeseries.push(proto::TimeSeries {
            labels: series
                .labels
                .iter()
                .map(|l| proto::Label::new(l.name.clone(), l.value.clone()))
                .collect(),
            samples: series
                .samples
                .iter()
                .map(|p| proto::Sample {
                    value: p.v,
                    timestamp: p.t,
                })
                .collect(),
        });
    }

    Ok(proto::QueryResult { timeseries })
}
