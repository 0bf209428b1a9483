//! Storage interface consumed by the API.

use crate::core::context::{ContextError, RequestContext};
use crate::model::labels::Labels;
use crate::model::matcher::Matcher;
use crate::model::value::Point;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Non-fatal messages returned alongside results.
pub type Warnings = Vec<String>;

/// Storage failure.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Failure that declares the HTTP status it should surface with.
    #[error("{message}")]
    Status { status: u16, message: String },

    /// Generic failure.
    #[error("{0}")]
    Failed(String),

    /// The request context ended while storage was working.
    #[error(transparent)]
    Context(#[from] ContextError),
}

impl StorageError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Declared status, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Optional planning hints passed with a select.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectHints {
    pub start_ms: i64,
    pub end_ms: i64,
    pub step_ms: i64,
    pub func: String,
}

/// One series produced by a select.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesData {
    pub labels: Labels,
    pub samples: Vec<Point>,
}

/// Iterator over selected series; iteration errors surface as items.
pub type SeriesSet = Box<dyn Iterator<Item = Result<SeriesData, StorageError>> + Send>;

/// Read access over a time range.
pub trait Querier: Send + Sync {
    /// Series matching all matchers, sorted by label set.
    fn select(
        &self,
        hints: Option<&SelectHints>,
        matchers: &[Matcher],
    ) -> Result<(SeriesSet, Warnings), StorageError>;

    /// Sorted distinct values of a label.
    fn label_values(&self, name: &str) -> Result<(Vec<String>, Warnings), StorageError>;

    /// Sorted distinct label names.
    fn label_names(&self) -> Result<(Vec<String>, Warnings), StorageError>;

    /// Release resources held by this querier.
    fn close(&self) -> Result<(), StorageError>;
}

/// Factory for queriers.
pub trait Queryable: Send + Sync {
    /// Open a querier over `[mint, maxt]` milliseconds.
    fn querier(
        &self,
        ctx: &RequestContext,
        mint: i64,
        maxt: i64,
    ) -> Result<Box<dyn Querier>, StorageError>;
}

/// Closes the wrapped querier when dropped.
pub struct QuerierGuard(Box<dyn Querier>);

impl QuerierGuard {
    pub fn new(querier: Box<dyn Querier>) -> Self {
        Self(querier)
    }
}

impl std::ops::Deref for QuerierGuard {
    type Target = dyn Querier;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl Drop for QuerierGuard {
    fn drop(&mut self) {
        if let Err(e) = self.0.close() {
            tracing::warn!(error = %e, "failed to close querier");
        }
    }
}

/// Administrative store operations.
pub trait TsdbAdmin: Send + Sync {
    /// Tombstone samples in `[mint, maxt]` of series matching all matchers.
    fn delete(&self, mint: i64, maxt: i64, matchers: &[Matcher]) -> Result<(), StorageError>;

    /// Physically drop tombstoned data.
    fn clean_tombstones(&self) -> Result<(), StorageError>;

    /// Write a snapshot into `dir`, optionally including in-memory data.
    fn snapshot(&self, dir: &Path, with_head: bool) -> Result<(), StorageError>;

    /// Base data directory.
    fn dir(&self) -> PathBuf;
}

/// Holds the administrative store once it is open.
#[derive(Default)]
pub struct TsdbSlot {
    inner: parking_lot::RwLock<Option<Arc<dyn TsdbAdmin>>>,
}

impl TsdbSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish an opened store.
    pub fn set(&self, db: Arc<dyn TsdbAdmin>) {
        *self.inner.write() = Some(db);
    }

    /// Current store, `None` until one is published.
    pub fn get(&self) -> Option<Arc<dyn TsdbAdmin>> {
        self.inner.read().clone()
    }
}
