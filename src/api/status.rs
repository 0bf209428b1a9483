//! Runtime status endpoints.

use crate::api::dispatch::{ApiHandler, HandlerFuture};
use crate::api::envelope::HandlerResult;
use crate::api::request::ApiRequest;
use crate::api::Api;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Serialize)]
pub struct ConfigView {
    pub yaml: String,
}

/// `GET /status/config`
#[derive(Debug, Default)]
pub struct ServeConfig;

impl ApiHandler for ServeConfig {
    type Payload = ConfigView;
    const NAME: &'static str = "status_config";

    fn handle<'a>(&'a self, api: &'a Api, _req: &'a ApiRequest) -> HandlerFuture<'a, ConfigView> {
        Box::pin(async move {
            HandlerResult::ok(ConfigView {
                yaml: api.config().current().rendered.clone(),
            })
        })
    }
}

/// `GET /status/flags`
#[derive(Debug, Default)]
pub struct ServeFlags;

impl ApiHandler for ServeFlags {
    type Payload = BTreeMap<String, String>;
    const NAME: &'static str = "status_flags";

    fn handle<'a>(
        &'a self,
        api: &'a Api,
        _req: &'a ApiRequest,
    ) -> HandlerFuture<'a, BTreeMap<String, String>> {
        Box::pin(async move { HandlerResult::ok(api.flags().clone()) })
    }
}
