//! JSON response envelope and handler results.

use crate::core::error::{ApiError, ErrorKind};
use crate::provider::Warnings;
use axum::http::header::{CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Action run once after the response body has been produced.
pub type Finalizer = Box<dyn FnOnce() + Send>;

/// What a handler hands back to the dispatcher.
///
/// An error wins over data when both are present; data is then still
/// included in the error envelope.
pub struct HandlerResult<T> {
    pub data: Option<T>,
    pub error: Option<ApiError>,
    pub warnings: Warnings,
    pub finalizer: Option<Finalizer>,
}

impl<T> HandlerResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
            warnings: Vec::new(),
            finalizer: None,
        }
    }

    /// Neither data nor error; answered with 204.
    pub fn empty() -> Self {
        Self {
            data: None,
            error: None,
            warnings: Vec::new(),
            finalizer: None,
        }
    }

    pub fn err(error: ApiError) -> Self {
        Self {
            data: None,
            error: Some(error),
            warnings: Vec::new(),
            finalizer: None,
        }
    }

    pub fn with_warnings(mut self, warnings: Warnings) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn with_finalizer(mut self, finalizer: impl FnOnce() + Send + 'static) -> Self {
        self.finalizer = Some(Box::new(finalizer));
        self
    }

    /// Detach the finalizer so the caller can run it.
    pub fn take_finalizer(&mut self) -> Option<Finalizer> {
        self.finalizer.take()
    }
}

impl<T> From<ApiError> for HandlerResult<T> {
    fn from(error: ApiError) -> Self {
        Self::err(error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// Wire shape of every JSON response.
#[derive(Debug, Serialize)]
pub struct Envelope<'a, T: Serialize> {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<&'a T>,
    #[serde(rename = "errorType", skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    pub warnings: &'a [String],
}

impl<'a, T: Serialize> Envelope<'a, T> {
    pub fn success(data: &'a T, warnings: &'a [String]) -> Self {
        Self {
            status: Status::Success,
            data: Some(data),
            error_type: None,
            error: None,
            warnings,
        }
    }

    pub fn error(error: &'a ApiError, data: Option<&'a T>) -> Self {
        Self {
            status: Status::Error,
            data,
            error_type: Some(error.kind()),
            error: Some(error.message()),
            warnings: &[],
        }
    }
}

// ============================================================================
// Response helpers
// ============================================================================

/// Plain-text response: `<message>\n`, no sniffing.
pub fn plain_text(status: StatusCode, message: &str) -> Response {
    (
        status,
        [
            (CONTENT_TYPE, "text/plain; charset=utf-8"),
            (X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        format!("{}\n", message),
    )
        .into_response()
}

/// Serialize `body` as JSON with `status`; a serialization failure is
/// logged and answered with a plain-text 500.
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response {
    match serde_json::to_vec(body) {
        Ok(bytes) => (status, [(CONTENT_TYPE, "application/json")], bytes).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "error marshaling json response");
            plain_text(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
        }
    }
}
