//! Administrative store endpoints.
//!
//! All three answer `unavailable` while admin APIs are disabled or the
//! store has not been opened yet.

use crate::api::dispatch::{ApiHandler, HandlerFuture};
use crate::api::envelope::HandlerResult;
use crate::api::request::ApiRequest;
use crate::api::Api;
use crate::core::error::{ApiError, ApiResult};
use crate::core::time::Timestamp;
use crate::provider::TsdbAdmin;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

/// Snapshot name timestamp layout.
const SNAPSHOT_TIME_FORMAT: &str = "%Y%m%dT%H%M%SZ";

fn admin_store(api: &Api) -> ApiResult<Arc<dyn TsdbAdmin>> {
    if !api.admin_enabled() {
        return Err(ApiError::unavailable("admin APIs disabled"));
    }
    tsdb_store(api)
}

fn tsdb_store(api: &Api) -> ApiResult<Arc<dyn TsdbAdmin>> {
    api.tsdb()
        .get()
        .ok_or_else(|| ApiError::unavailable("TSDB not ready"))
}

/// Boolean literals accepted for flag parameters.
pub fn parse_bool(text: &str) -> Option<bool> {
    match text {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// `POST|PUT /admin/tsdb/delete_series`
#[derive(Debug, Default)]
pub struct DeleteSeries;

impl ApiHandler for DeleteSeries {
    type Payload = ();
    const NAME: &'static str = "delete_series";

    fn handle<'a>(&'a self, api: &'a Api, req: &'a ApiRequest) -> HandlerFuture<'a, ()> {
        Box::pin(async move {
            let store = match admin_store(api) {
                Ok(store) => store,
                Err(e) => return e.into(),
            };
            let matcher_sets = match req.matcher_sets() {
                Ok(sets) => sets,
                Err(e) => return e.into(),
            };
            let start = match req.time_or("start", Timestamp::MIN) {
                Ok(ts) => ts,
                Err(e) => return e.into(),
            };
            let end = match req.time_or("end", Timestamp::MAX) {
                Ok(ts) => ts,
                Err(e) => return e.into(),
            };

            for matchers in &matcher_sets {
                if let Err(e) = store.delete(start.to_millis(), end.to_millis(), matchers) {
                    return ApiError::internal(e.to_string()).into();
                }
            }
            tracing::info!(selectors = matcher_sets.len(), "deleted series");
            HandlerResult::empty()
        })
    }
}

/// `POST|PUT /admin/tsdb/clean_tombstones`
#[derive(Debug, Default)]
pub struct CleanTombstones;

impl ApiHandler for CleanTombstones {
    type Payload = ();
    const NAME: &'static str = "clean_tombstones";

    fn handle<'a>(&'a self, api: &'a Api, _req: &'a ApiRequest) -> HandlerFuture<'a, ()> {
        Box::pin(async move {
            let store = match admin_store(api) {
                Ok(store) => store,
                Err(e) => return e.into(),
            };
            match store.clean_tombstones() {
                Ok(()) => HandlerResult::empty(),
                Err(e) => ApiError::internal(e.to_string()).into(),
            }
        })
    }
}

#[derive(Debug, Serialize)]
pub struct SnapshotView {
    pub name: String,
}

/// `POST|PUT /admin/tsdb/snapshot`
#[derive(Debug, Default)]
pub struct Snapshot;

impl ApiHandler for Snapshot {
    type Payload = SnapshotView;
    const NAME: &'static str = "snapshot";

    fn handle<'a>(&'a self, api: &'a Api, req: &'a ApiRequest) -> HandlerFuture<'a, SnapshotView> {
        Box::pin(async move {
            if !api.admin_enabled() {
                return ApiError::unavailable("admin APIs disabled").into();
            }
            let skip_head = match req.form_value("skip_head") {
                Some(text) => match parse_bool(text) {
                    Some(skip) => skip,
                    None => {
                        return ApiError::bad_data(format!(
                            "unable to parse boolean 'skip_head' argument: invalid syntax {:?}",
                            text
                        ))
                        .into()
                    }
                },
                None => false,
            };
            let store = match tsdb_store(api) {
                Ok(store) => store,
                Err(e) => return e.into(),
            };

            let name = format!(
                "{}-{:x}",
                Utc::now().format(SNAPSHOT_TIME_FORMAT),
                rand::random::<u64>()
            );
            let dir = store.dir().join("snapshots").join(&name);
            if let Err(e) = std::fs::create_dir_all(&dir) {
                return ApiError::internal(format!("create snapshot directory: {}", e)).into();
            }
            if let Err(e) = store.snapshot(&dir, !skip_head) {
                return ApiError::internal(format!("create snapshot: {}", e)).into();
            }

            tracing::info!(name = %name, with_head = !skip_head, "created snapshot");
            HandlerResult::ok(SnapshotView { name })
        })
    }
}
