//! Parsed request handed to API handlers.
//!
//! Form values merge the url-encoded body of `POST`/`PUT` requests (first)
//! with the URL query string. A value that is present but empty is treated
//! the same as an absent one.

use crate::core::context::RequestContext;
use crate::core::error::{ApiError, ApiResult};
use crate::core::time::{parse_duration, parse_time, Timestamp};
use crate::model::matcher::Matcher;
use crate::model::selector::parse_metric_selector;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, Method};
use chrono::TimeDelta;
use std::collections::BTreeMap;

/// Content type whose body carries form values.
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// An API request after routing and form parsing.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    headers: HeaderMap,
    path_params: BTreeMap<String, String>,
    form: Vec<(String, String)>,
    ctx: RequestContext,
}

impl ApiRequest {
    pub fn new(method: Method, ctx: RequestContext) -> Self {
        Self {
            method,
            headers: HeaderMap::new(),
            path_params: BTreeMap::new(),
            form: Vec::new(),
            ctx,
        }
    }

    /// Build from transport parts, parsing the query string and body.
    pub fn from_parts(
        method: Method,
        headers: HeaderMap,
        query: Option<&str>,
        body: &[u8],
        path_params: BTreeMap<String, String>,
        ctx: RequestContext,
    ) -> ApiResult<Self> {
        let mut form = Vec::new();
        if carries_form_body(&method, &headers) {
            form.extend(parse_form(body)?);
        }
        if let Some(query) = query {
            form.extend(parse_form(query.as_bytes())?);
        }
        Ok(Self {
            method,
            headers,
            path_params,
            form,
            ctx,
        })
    }

    pub fn with_form_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push((key.into(), value.into()));
        self
    }

    pub fn with_path_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(key.into(), value.into());
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn ctx(&self) -> &RequestContext {
        &self.ctx
    }

    pub fn path_param(&self, key: &str) -> Option<&str> {
        self.path_params.get(key).map(String::as_str)
    }

    /// First non-empty value for `key`.
    pub fn form_value(&self, key: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }

    /// Every value for `key`, in order.
    pub fn form_values(&self, key: &str) -> Vec<&str> {
        self.form
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Timestamp parameter, `default` when absent. Parse errors are
    /// reported as-is.
    pub fn time_or(&self, key: &str, default: Timestamp) -> ApiResult<Timestamp> {
        match self.form_value(key) {
            Some(text) => parse_time(text),
            None => Ok(default),
        }
    }

    /// Optional duration parameter.
    pub fn duration(&self, key: &str) -> ApiResult<Option<TimeDelta>> {
        self.form_value(key).map(parse_duration).transpose()
    }

    /// Selector sets from every `match[]` value; at least one is required.
    pub fn matcher_sets(&self) -> ApiResult<Vec<Vec<Matcher>>> {
        let selectors = self.form_values("match[]");
        if selectors.is_empty() {
            return Err(ApiError::bad_data("no match[] parameter provided"));
        }
        selectors
            .into_iter()
            .map(|s| parse_metric_selector(s).map_err(|e| ApiError::bad_data(e.to_string())))
            .collect()
    }
}

fn carries_form_body(method: &Method, headers: &HeaderMap) -> bool {
    if method != Method::POST && method != Method::PUT {
        return false;
    }
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE))
}

fn parse_form(raw: &[u8]) -> ApiResult<Vec<(String, String)>> {
    serde_urlencoded::from_bytes(raw)
        .map_err(|e| ApiError::bad_data(format!("error parsing form values: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn form_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded; charset=utf-8"),
        );
        headers
    }

    #[test]
    fn test_body_values_come_first() {
        let req = ApiRequest::from_parts(
            Method::POST,
            form_headers(),
            Some("query=from_url&match%5B%5D=b"),
            b"query=from_body&match[]=a",
            BTreeMap::new(),
            RequestContext::new(),
        )
        .unwrap();
        assert_eq!(req.form_value("query"), Some("from_body"));
        assert_eq!(req.form_values("match[]"), vec!["a", "b"]);
    }

    #[test]
    fn test_get_ignores_body() {
        let req = ApiRequest::from_parts(
            Method::GET,
            form_headers(),
            Some("time=10"),
            b"time=20",
            BTreeMap::new(),
            RequestContext::new(),
        )
        .unwrap();
        assert_eq!(req.form_value("time"), Some("10"));
    }

    #[test]
    fn test_empty_value_is_absent() {
        let req = ApiRequest::new(Method::GET, RequestContext::new()).with_form_value("time", "");
        assert_eq!(req.form_value("time"), None);
        assert_eq!(
            req.time_or("time", Timestamp::EPOCH).unwrap(),
            Timestamp::EPOCH
        );
    }

    #[test]
    fn test_matcher_sets_required() {
        let req = ApiRequest::new(Method::GET, RequestContext::new());
        let err = req.matcher_sets().unwrap_err();
        assert_eq!(err.message(), "no match[] parameter provided");

        let req = req.with_form_value("match[]", "up{job=\"api\"}");
        assert_eq!(req.matcher_sets().unwrap()[0].len(), 2);
    }

    #[test]
    fn test_duration_param() {
        let req = ApiRequest::new(Method::GET, RequestContext::new()).with_form_value("step", "15s");
        assert_eq!(req.duration("step").unwrap(), Some(TimeDelta::seconds(15)));
        assert_eq!(req.duration("timeout").unwrap(), None);
    }
}
