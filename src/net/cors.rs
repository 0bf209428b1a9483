//! Cross-origin response headers.

use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_EXPOSE_HEADERS, ORIGIN, VARY,
};
use axum::http::{HeaderMap, HeaderValue};
use regex::Regex;

const ALLOW_HEADERS: &str = "Accept, Authorization, Content-Type, Origin";
const ALLOW_METHODS: &str = "GET, POST, DELETE, OPTIONS";
const EXPOSE_HEADERS: &str = "Date";

/// Pattern accepted for the allow-everything policy.
const MATCH_ALL: &str = ".*";

/// Origin policy compiled from the configured pattern.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    origin: Regex,
    allow_all: bool,
}

impl CorsPolicy {
    /// Compile `pattern`; the match is anchored at both ends.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            origin: Regex::new(&format!("^(?:{})$", pattern))?,
            allow_all: pattern == MATCH_ALL,
        })
    }

    /// Set CORS headers on `response` for a request carrying `request` headers.
    /// Requests without an `Origin` header are left alone.
    pub fn apply(&self, request: &HeaderMap, response: &mut HeaderMap) {
        let Some(origin) = request.get(ORIGIN) else {
            return;
        };

        response.insert(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        );
        response.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        );
        response.insert(
            ACCESS_CONTROL_EXPOSE_HEADERS,
            HeaderValue::from_static(EXPOSE_HEADERS),
        );
        response.insert(VARY, HeaderValue::from_static("Origin"));

        if self.allow_all {
            response.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
            return;
        }
        if let Ok(text) = origin.to_str() {
            if self.origin.is_match(text) {
                response.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
            }
        }
    }
}
