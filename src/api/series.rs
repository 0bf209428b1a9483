//! Label and series discovery endpoints.

use crate::api::dispatch::{ApiHandler, HandlerFuture};
use crate::api::envelope::HandlerResult;
use crate::api::request::ApiRequest;
use crate::api::Api;
use crate::core::error::ApiError;
use crate::core::time::Timestamp;
use crate::model::labels::{is_valid_label_name, Labels};
use crate::provider::QuerierGuard;
use std::collections::BTreeSet;

/// `GET|POST /labels`
#[derive(Debug, Default)]
pub struct LabelNames;

impl ApiHandler for LabelNames {
    type Payload = Vec<String>;
    const NAME: &'static str = "labels";

    fn handle<'a>(&'a self, api: &'a Api, req: &'a ApiRequest) -> HandlerFuture<'a, Vec<String>> {
        Box::pin(async move {
            let querier = match api.queryable().querier(req.ctx(), i64::MIN, i64::MAX) {
                Ok(q) => QuerierGuard::new(q),
                Err(e) => return ApiError::execution(e.to_string()).into(),
            };
            match querier.label_names() {
                Ok((names, warnings)) => HandlerResult::ok(names).with_warnings(warnings),
                Err(e) => ApiError::execution(e.to_string()).into(),
            }
        })
    }
}

/// `GET /label/:name/values`
#[derive(Debug, Default)]
pub struct LabelValues;

impl ApiHandler for LabelValues {
    type Payload = Vec<String>;
    const NAME: &'static str = "label_values";

    fn handle<'a>(&'a self, api: &'a Api, req: &'a ApiRequest) -> HandlerFuture<'a, Vec<String>> {
        Box::pin(async move {
            let name = req.path_param("name").unwrap_or_default();
            if !is_valid_label_name(name) {
                return ApiError::bad_data(format!("invalid label name: {:?}", name)).into();
            }

            let querier = match api.queryable().querier(req.ctx(), i64::MIN, i64::MAX) {
                Ok(q) => QuerierGuard::new(q),
                Err(e) => return ApiError::execution(e.to_string()).into(),
            };
            match querier.label_values(name) {
                Ok((values, warnings)) => HandlerResult::ok(values).with_warnings(warnings),
                Err(e) => ApiError::execution(e.to_string()).into(),
            }
        })
    }
}

/// `GET|POST /series`
#[derive(Debug, Default)]
pub struct Series;

impl ApiHandler for Series {
    type Payload = Vec<Labels>;
    const NAME: &'static str = "series";

    fn handle<'a>(&'a self, api: &'a Api, req: &'a ApiRequest) -> HandlerFuture<'a, Vec<Labels>> {
        Box::pin(async move {
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

            let querier = match api
                .queryable()
                .querier(req.ctx(), start.to_millis(), end.to_millis())
            {
                Ok(q) => QuerierGuard::new(q),
                Err(e) => return ApiError::execution(e.to_string()).into(),
            };

            let mut warnings = Vec::new();
            let mut metrics = BTreeSet::new();
            for matchers in &matcher_sets {
                let (set, wrn) = match querier.select(None, matchers) {
                    Ok(selected) => selected,
                    Err(e) => {
                        return HandlerResult::err(ApiError::execution(e.to_string()))
                            .with_warnings(warnings)
                    }
                };
                warnings.extend(wrn);
                for series in set {
                    match series {
                        Ok(series) => {
                            metrics.insert(series.labels);
                        }
                        Err(e) => {
                            return HandlerResult::err(ApiError::execution(e.to_string()))
                                .with_warnings(warnings)
                        }
                    }
                }
            }

            HandlerResult::ok(metrics.into_iter().collect()).with_warnings(warnings)
        })
    }
}

/// `DELETE /series`
#[derive(Debug, Default)]
pub struct DropSeries;

impl ApiHandler for DropSeries {
    type Payload = ();
    const NAME: &'static str = "drop_series";

    fn handle<'a>(&'a self, _api: &'a Api, _req: &'a ApiRequest) -> HandlerFuture<'a, ()> {
        Box::pin(async { ApiError::internal("not implemented").into() })
    }
}
