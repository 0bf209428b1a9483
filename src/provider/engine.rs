//! Query engine interface.

use crate::core::context::{ContextError, RequestContext};
use crate::core::error::ErrorKind;
use crate::core::time::Timestamp;
use crate::model::value::Value;
use crate::provider::storage::{Queryable, StorageError, Warnings};
use chrono::TimeDelta;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Engine failure.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Expression could not be parsed.
    #[error("{0}")]
    Parse(String),

    #[error("query was canceled in {0}")]
    Canceled(String),

    #[error("query timed out in {0}")]
    Timeout(String),

    #[error(transparent)]
    Storage(StorageError),

    #[error("{0}")]
    Execution(String),
}

impl EngineError {
    /// Error class used when a query fails during execution.
    pub fn classify(&self) -> ErrorKind {
        match self {
            Self::Canceled(_) => ErrorKind::Canceled,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Storage(_) => ErrorKind::Internal,
            Self::Parse(_) | Self::Execution(_) => ErrorKind::Execution,
        }
    }

    /// Translate a finished context into the matching engine error.
    pub fn from_context(err: ContextError, stage: &str) -> Self {
        match err {
            ContextError::Canceled => Self::Canceled(stage.to_string()),
            ContextError::DeadlineExceeded => Self::Timeout(stage.to_string()),
        }
    }
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Context(ctx) => Self::from_context(ctx, "storage"),
            other => Self::Storage(other),
        }
    }
}

/// Outcome of executing a query; warnings accompany success and failure.
#[derive(Debug)]
pub struct QueryResult {
    pub value: Result<Value, EngineError>,
    pub warnings: Warnings,
}

impl QueryResult {
    pub fn ok(value: Value, warnings: Warnings) -> Self {
        Self {
            value: Ok(value),
            warnings,
        }
    }

    pub fn err(err: EngineError, warnings: Warnings) -> Self {
        Self {
            value: Err(err),
            warnings,
        }
    }
}

/// Boxed future returned by [`Query::exec`].
pub type QueryFuture<'a> = Pin<Box<dyn Future<Output = QueryResult> + Send + 'a>>;

/// A prepared query.
pub trait Query: Send + Sync {
    /// Evaluate under the given context.
    fn exec<'a>(&'a self, ctx: &'a RequestContext) -> QueryFuture<'a>;

    /// Execution statistics, if the engine collects them.
    fn stats(&self) -> Option<serde_json::Value>;

    /// Release resources; called exactly once after the response is written.
    fn close(&self);
}

/// Prepares queries against a queryable.
pub trait QueryEngine: Send + Sync {
    fn new_instant_query(
        &self,
        queryable: Arc<dyn Queryable>,
        expr: &str,
        ts: Timestamp,
    ) -> Result<Box<dyn Query>, EngineError>;

    fn new_range_query(
        &self,
        queryable: Arc<dyn Queryable>,
        expr: &str,
        start: Timestamp,
        end: Timestamp,
        step: TimeDelta,
    ) -> Result<Box<dyn Query>, EngineError>;
}
