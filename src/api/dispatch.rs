//! Dispatcher wrapping every JSON API handler.
//!
//! For each request: readiness check, form parsing, exactly one handler
//! invocation, envelope serialization with the mapped status, then the
//! handler's finalizer (also on serialization failure) and CORS headers.
//! The request context is cancelled when the request future is dropped.

use crate::api::envelope::{json_response, plain_text, Envelope, HandlerResult};
use crate::api::request::ApiRequest;
use crate::api::Api;
use crate::core::context::RequestContext;
use crate::core::error::ApiError;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

/// Largest accepted form body.
pub const MAX_FORM_BYTES: usize = 16 * 1024 * 1024;

/// Boxed future returned by [`ApiHandler::handle`].
pub type HandlerFuture<'a, T> = Pin<Box<dyn Future<Output = HandlerResult<T>> + Send + 'a>>;

/// One API endpoint.
pub trait ApiHandler: Send + Sync + 'static {
    /// Successful response payload.
    type Payload: Serialize + Send + 'static;

    /// Endpoint name used in metrics.
    const NAME: &'static str;

    fn handle<'a>(&'a self, api: &'a Api, req: &'a ApiRequest) -> HandlerFuture<'a, Self::Payload>;
}

/// axum entry point for a handler type.
pub async fn endpoint<H: ApiHandler + Default>(
    State(api): State<Arc<Api>>,
    path: Option<Path<BTreeMap<String, String>>>,
    request: Request<Body>,
) -> Response {
    let path_params = path.map(|Path(p)| p).unwrap_or_default();
    dispatch(&api, &H::default(), path_params, request).await
}

/// Run `handler` for `request` and render the response.
pub async fn dispatch<H: ApiHandler>(
    api: &Api,
    handler: &H,
    path_params: BTreeMap<String, String>,
    request: Request<Body>,
) -> Response {
    if !api.readiness().is_ready() {
        return plain_text(StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable");
    }

    let started = Instant::now();
    let ctx = RequestContext::new();
    let _cancel_on_drop = ctx.drop_guard();

    let (parts, body) = request.into_parts();
    let mut result = match axum::body::to_bytes(body, MAX_FORM_BYTES).await {
        Ok(body) => match ApiRequest::from_parts(
            parts.method.clone(),
            parts.headers.clone(),
            parts.uri.query(),
            &body,
            path_params,
            ctx,
        ) {
            Ok(req) => handler.handle(api, &req).await,
            Err(err) => HandlerResult::err(err),
        },
        Err(err) => HandlerResult::err(ApiError::bad_data(format!(
            "error parsing form values: {}",
            err
        ))),
    };

    let finalizer = result.take_finalizer();
    let mut response = api.render(&result);
    if let Some(finalizer) = finalizer {
        finalizer();
    }
    api.cors().apply(&parts.headers, response.headers_mut());

    let metrics = api.metrics();
    metrics.record_request(H::NAME);
    if let Some(err) = &result.error {
        metrics.record_error(err.kind().as_str());
        tracing::debug!(
            endpoint = H::NAME,
            error_type = %err.kind(),
            error = %err.message(),
            "api request failed"
        );
    }
    metrics.record_latency(H::NAME, started.elapsed().as_secs_f64() * 1000.0);

    response
}

impl Api {
    /// Envelope for a handler result: error, data or 204.
    pub(crate) fn render<T: Serialize>(&self, result: &HandlerResult<T>) -> Response {
        if let Some(err) = &result.error {
            let status = self.status_mapping().to_status_code(err.kind());
            return json_response(status, &Envelope::error(err, result.data.as_ref()));
        }
        match &result.data {
            Some(data) => json_response(StatusCode::OK, &Envelope::success(data, &result.warnings)),
            None => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

/// `OPTIONS` on any API path: empty 204 with CORS headers.
#[derive(Debug, Default)]
pub struct Options;

impl ApiHandler for Options {
    type Payload = ();
    const NAME: &'static str = "options";

    fn handle<'a>(&'a self, _api: &'a Api, _req: &'a ApiRequest) -> HandlerFuture<'a, ()> {
        Box::pin(async { HandlerResult::empty() })
    }
}
