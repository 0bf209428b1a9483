//! Instant and range query endpoints.

use crate::api::dispatch::{ApiHandler, HandlerFuture};
use crate::api::envelope::HandlerResult;
use crate::api::request::ApiRequest;
use crate::api::Api;
use crate::core::context::RequestContext;
use crate::core::error::{ApiError, ErrorKind};
use crate::core::time::{parse_duration, parse_time};
use crate::model::value::{Value, ValueType};
use crate::provider::{EngineError, Query};
use serde::Serialize;
use std::sync::Arc;

/// Most points a range query may return per series.
pub const MAX_POINTS_PER_SERIES: i128 = 11_000;

/// Query result payload.
#[derive(Debug, Serialize)]
pub struct QueryData {
    #[serde(rename = "resultType")]
    pub result_type: ValueType,
    pub result: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<serde_json::Value>,
}

/// Classify an engine failure raised while executing a query.
pub fn engine_error(err: &EngineError) -> ApiError {
    ApiError::new(err.classify(), err.to_string())
}

/// `GET|POST /query`
#[derive(Debug, Default)]
pub struct InstantQuery;

impl ApiHandler for InstantQuery {
    type Payload = QueryData;
    const NAME: &'static str = "query";

    fn handle<'a>(&'a self, api: &'a Api, req: &'a ApiRequest) -> HandlerFuture<'a, QueryData> {
        Box::pin(async move {
            let ts = match req.form_value("time") {
                Some(text) => match parse_time(text) {
                    Ok(ts) => ts,
                    Err(e) => return ApiError::invalid_parameter("time", e).into(),
                },
                None => api.now(),
            };

            let ctx = match query_context(req) {
                Ok(ctx) => ctx,
                Err(e) => return e.into(),
            };

            let expr = req.form_value("query").unwrap_or_default();
            let query = match api.engine().new_instant_query(api.queryable(), expr, ts) {
                Ok(query) => query,
                Err(e) => {
                    return ApiError::invalid_parameter("query", ApiError::bad_data(e.to_string()))
                        .into()
                }
            };

            execute(Arc::from(query), &ctx, req.form_value("stats").is_some()).await
        })
    }
}

/// `GET|POST /query_range`
#[derive(Debug, Default)]
pub struct RangeQuery;

impl ApiHandler for RangeQuery {
    type Payload = QueryData;
    const NAME: &'static str = "query_range";

    fn handle<'a>(&'a self, api: &'a Api, req: &'a ApiRequest) -> HandlerFuture<'a, QueryData> {
        Box::pin(async move {
            let start = match parse_time(req.form_value("start").unwrap_or_default()) {
                Ok(ts) => ts,
                Err(e) => return ApiError::invalid_parameter("start", e).into(),
            };
            let end = match parse_time(req.form_value("end").unwrap_or_default()) {
                Ok(ts) => ts,
                Err(e) => return ApiError::invalid_parameter("end", e).into(),
            };
            if end < start {
                return ApiError::bad_data("end timestamp must not be before start time").into();
            }

            let step = match parse_duration(req.form_value("step").unwrap_or_default()) {
                Ok(step) => step,
                Err(e) => return ApiError::invalid_parameter("step", e).into(),
            };
            let step_nanos = step
                .num_nanoseconds()
                .map(i128::from)
                .unwrap_or(i128::from(i64::MAX));
            if step_nanos <= 0 {
                return ApiError::bad_data(
                    "zero or negative query resolution step widths are not accepted. Try a positive integer",
                )
                .into();
            }

            let range_nanos = end.nanos_since(&start).min(i128::from(i64::MAX));
            if range_nanos / step_nanos > MAX_POINTS_PER_SERIES {
                return ApiError::bad_data(
                    "exceeded maximum resolution of 11,000 points per timeseries. Try decreasing the query resolution (?step=XX)",
                )
                .into();
            }

            let ctx = match query_context(req) {
                Ok(ctx) => ctx,
                Err(e) => return e.into(),
            };

            let expr = req.form_value("query").unwrap_or_default();
            let query = match api
                .engine()
                .new_range_query(api.queryable(), expr, start, end, step)
            {
                Ok(query) => query,
                Err(e) => return ApiError::bad_data(e.to_string()).into(),
            };

            execute(Arc::from(query), &ctx, req.form_value("stats").is_some()).await
        })
    }
}

/// Request context, narrowed by the optional `timeout` parameter.
fn query_context(req: &ApiRequest) -> Result<RequestContext, ApiError> {
    match req.duration("timeout") {
        Ok(Some(timeout)) => {
            let timeout = timeout.to_std().unwrap_or_default();
            Ok(req.ctx().with_timeout(timeout))
        }
        Ok(None) => Ok(req.ctx().clone()),
        Err(e) => Err(ApiError::invalid_parameter("timeout", e)),
    }
}

/// Execute a prepared query; the query is closed by the finalizer once
/// the response has been written, on success and on failure alike.
async fn execute(
    query: Arc<dyn Query>,
    ctx: &RequestContext,
    with_stats: bool,
) -> HandlerResult<QueryData> {
    let outcome = query.exec(ctx).await;
    let closer = query.clone();
    let finalize = move || closer.close();

    match outcome.value {
        Ok(value) => {
            let stats = if with_stats { query.stats() } else { None };
            HandlerResult::ok(QueryData {
                result_type: value.value_type(),
                result: value,
                stats,
            })
            .with_warnings(outcome.warnings)
            .with_finalizer(finalize)
        }
        Err(err) => {
            let api_err = engine_error(&err);
            if api_err.kind() == ErrorKind::Internal {
                tracing::warn!(error = %err, "query failed in storage");
            }
            HandlerResult::err(api_err)
                .with_warnings(outcome.warnings)
                .with_finalizer(finalize)
        }
    }
}
