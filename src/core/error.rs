//! Error taxonomy and transport status mapping.
//!
//! Every failure that crosses the API boundary is classified into one
//! [`ErrorKind`]. The kind's wire tag appears in the response envelope as
//! `errorType`, and [`StatusMapping`] is the single place that turns a kind
//! into an HTTP status code.

use axum::http::StatusCode;
use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Closed set of API error classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No error.
    None,
    /// The request deadline expired.
    Timeout,
    /// The request was cancelled.
    Canceled,
    /// Query evaluation failed.
    Execution,
    /// A request parameter was malformed or inconsistent.
    BadData,
    /// An internal component failed.
    Internal,
    /// The requested facility is not available.
    Unavailable,
    /// The requested resource does not exist.
    NotFound,
}

impl ErrorKind {
    /// Wire tag used in the `errorType` envelope field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Timeout => "timeout",
            Self::Canceled => "canceled",
            Self::Execution => "execution",
            Self::BadData => "bad_data",
            Self::Internal => "internal",
            Self::Unavailable => "unavailable",
            Self::NotFound => "not_found",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A classified API failure: kind plus human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
}

impl ApiError {
    /// Create an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn bad_data(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadData, message)
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Execution, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn canceled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Canceled, message)
    }

    /// Wrap a parameter failure, preserving its kind:
    /// `invalid parameter 'time': <cause>`.
    pub fn invalid_parameter(name: &str, cause: ApiError) -> Self {
        Self::new(
            cause.kind,
            format!("invalid parameter '{}': {}", name, cause.message),
        )
    }

    /// Error class.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Result type using ApiError.
pub type ApiResult<T> = Result<T, ApiError>;

// ============================================================================
// Status mapping
// ============================================================================

/// Maps error kinds onto HTTP status codes.
#[derive(Debug, Clone, Copy)]
pub struct StatusMapping {
    /// Status used for [`ErrorKind::Unavailable`].
    unavailable: StatusCode,
}

impl StatusMapping {
    /// Create a mapping with a configured status for `unavailable`.
    pub fn new(unavailable: StatusCode) -> Self {
        Self { unavailable }
    }

    /// HTTP status for an error kind.
    pub fn to_status_code(&self, kind: ErrorKind) -> StatusCode {
        match kind {
            ErrorKind::None => StatusCode::OK,
            ErrorKind::BadData => StatusCode::BAD_REQUEST,
            ErrorKind::Execution => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Canceled | ErrorKind::Timeout => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unavailable => self.unavailable,
        }
    }
}

impl Default for StatusMapping {
    fn default() -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE)
    }
}
