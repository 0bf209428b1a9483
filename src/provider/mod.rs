//! Collaborator interfaces consumed by the API:
//! - [`engine`] - Query engine and prepared queries
//! - [`storage`] - Queryable/querier, administrative store
//! - [`registry`] - Rules, targets, alertmanagers, configuration

pub mod engine;
pub mod registry;
pub mod storage;

pub use engine::{EngineError, Query, QueryEngine, QueryResult};
pub use registry::{
    AlertmanagerRetriever, ConfigRetriever, EmptyRegistry, RulesRetriever, ServingConfig,
    StaticConfig, TargetRetriever,
};
pub use storage::{
    Querier, QuerierGuard, Queryable, SelectHints, SeriesData, SeriesSet, StorageError,
    TsdbAdmin, TsdbSlot, Warnings,
};
