//! HTTP API tests driven through the router.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{get, post_form, send, BlockingEngine, TestApiBuilder, FIXTURE_TIME_MS};
use meridian::core::error::StatusMapping;
use meridian::net::cors::CorsPolicy;
use meridian::storage::SNAPSHOT_FILE;
use flate2::read::GzDecoder;
use std::io::Read;
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn qs(pairs: &[(&str, &str)]) -> String {
    serde_urlencoded::to_string(pairs).unwrap()
}

// ============================================================================
// Queries
// ============================================================================

#[tokio::test]
async fn instant_query_returns_vector() {
    let test = TestApiBuilder::default().build();
    let uri = format!("/api/v1/query?{}", qs(&[("query", "up{job=\"api\"}")]));
    let res = get(test.router(), &uri).await;

    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    assert_eq!(body["status"], "success");
    assert!(body.get("warnings").is_none());
    assert_eq!(body["data"]["resultType"], "vector");

    let result = body["data"]["result"].as_array().unwrap();
    assert_eq!(result.len(), 2);
    assert_eq!(result[0]["metric"]["instance"], "a:9100");
    assert_eq!(result[0]["value"][0], FIXTURE_TIME_MS / 1000);
    assert_eq!(result[0]["value"][1], "1");
}

#[tokio::test]
async fn instant_query_by_post_form() {
    let test = TestApiBuilder::default().build();
    let res = post_form(test.router(), "/api/v1/query", "query=2&stats=all").await;

    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    assert_eq!(body["data"]["resultType"], "scalar");
    assert_eq!(body["data"]["result"][1], "2");
    assert!(body["data"]["stats"].is_object());
}

#[tokio::test]
async fn instant_query_rejects_bad_time() {
    let test = TestApiBuilder::default().build();
    let res = get(test.router(), "/api/v1/query?query=up&time=yesterday").await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    let body = res.json();
    assert_eq!(body["status"], "error");
    assert_eq!(body["errorType"], "bad_data");
    assert_eq!(
        body["error"],
        "invalid parameter 'time': cannot parse \"yesterday\" to a valid timestamp"
    );
}

#[tokio::test]
async fn instant_query_rejects_unparsable_expression() {
    let test = TestApiBuilder::default().build();
    let uri = format!("/api/v1/query?{}", qs(&[("query", "up{")]));
    let res = get(test.router(), &uri).await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    let body = res.json();
    assert_eq!(body["errorType"], "bad_data");
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("invalid parameter 'query': "));
}

#[tokio::test]
async fn instant_query_timeout_runs_finalizer_once() {
    let engine = Arc::new(BlockingEngine::default());
    let closed = engine.closed.clone();
    let test = TestApiBuilder::default().engine(engine).build();

    let res = get(test.router(), "/api/v1/query?query=up&timeout=10ms").await;

    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
    let body = res.json();
    assert_eq!(body["errorType"], "timeout");
    assert_eq!(body["error"], "query timed out in query execution");
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn range_query_point_limit_boundary() {
    let test = TestApiBuilder::default().build();

    let res = get(
        test.router(),
        "/api/v1/query_range?query=up&start=0&end=11000&step=1",
    )
    .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["data"]["resultType"], "matrix");

    let res = get(
        test.router(),
        "/api/v1/query_range?query=up&start=0&end=11001&step=1",
    )
    .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        res.json()["error"],
        "exceeded maximum resolution of 11,000 points per timeseries. Try decreasing the query resolution (?step=XX)"
    );
}

#[tokio::test]
async fn range_query_rejects_bad_ranges() {
    let test = TestApiBuilder::default().build();

    let res = get(
        test.router(),
        "/api/v1/query_range?query=up&start=10&end=5&step=1",
    )
    .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        res.json()["error"],
        "end timestamp must not be before start time"
    );

    for step in ["0", "-5"] {
        let uri = format!("/api/v1/query_range?query=up&start=0&end=5&step={}", step);
        let res = get(test.router(), &uri).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
        assert_eq!(res.json()["errorType"], "bad_data");
    }

    let res = get(
        test.router(),
        "/api/v1/query_range?query=up&start=0&end=5&step=fast",
    )
    .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(res.json()["error"]
        .as_str()
        .unwrap()
        .starts_with("invalid parameter 'step': "));
}

#[tokio::test]
async fn range_query_returns_matrix() {
    let test = TestApiBuilder::default().build();
    let uri = format!(
        "/api/v1/query_range?{}",
        qs(&[
            ("query", "up"),
            ("start", &((FIXTURE_TIME_MS - 300_000) / 1000).to_string()),
            ("end", &(FIXTURE_TIME_MS / 1000).to_string()),
            ("step", "1m"),
        ])
    );
    let res = get(test.router(), &uri).await;

    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    let result = body["data"]["result"].as_array().unwrap();
    assert_eq!(result.len(), 3);
    assert_eq!(result[0]["values"].as_array().unwrap().len(), 6);
}

// ============================================================================
// Labels and series
// ============================================================================

#[tokio::test]
async fn label_names_and_values() {
    let test = TestApiBuilder::default().build();

    let res = get(test.router(), "/api/v1/labels").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(
        res.json()["data"],
        serde_json::json!(["__name__", "instance", "job"])
    );

    let res = get(test.router(), "/api/v1/label/job/values").await;
    assert_eq!(res.json()["data"], serde_json::json!(["api", "db"]));

    let res = get(test.router(), "/api/v1/label/1job/values").await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["error"], "invalid label name: \"1job\"");
}

#[tokio::test]
async fn labels_response_is_gzip_compressed() {
    let test = TestApiBuilder::default().build();
    let res = send(
        test.router(),
        Request::get("/api/v1/labels")
            .header("accept-encoding", "gzip")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.headers["content-encoding"], "gzip");
    assert_eq!(res.headers["content-type"], "application/json");

    let mut decoded = Vec::new();
    GzDecoder::new(&res.body[..])
        .read_to_end(&mut decoded)
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&decoded).unwrap();
    assert_eq!(
        body,
        serde_json::json!({
            "status": "success",
            "data": ["__name__", "instance", "job"],
        })
    );
}

#[tokio::test]
async fn series_union_is_sorted_and_deduplicated() {
    let test = TestApiBuilder::default().build();
    let uri = format!(
        "/api/v1/series?{}",
        qs(&[
            ("match[]", "up{job=\"db\"}"),
            ("match[]", "http_requests_total"),
            ("match[]", "{instance=\"c:9100\"}"),
        ])
    );
    let res = get(test.router(), &uri).await;

    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["__name__"], "http_requests_total");
    assert_eq!(data[1]["instance"], "c:9100");
}

#[tokio::test]
async fn series_requires_match() {
    let test = TestApiBuilder::default().build();
    let res = get(test.router(), "/api/v1/series").await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["error"], "no match[] parameter provided");
}

#[tokio::test]
async fn drop_series_not_implemented() {
    let test = TestApiBuilder::default().build();
    let res = send(
        test.router(),
        Request::delete("/api/v1/series?match[]=up")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.json()["errorType"], "internal");
}

// ============================================================================
// Targets, alerts, rules, status
// ============================================================================

#[tokio::test]
async fn targets_listing() {
    let test = TestApiBuilder::default().build();
    let res = get(test.router(), "/api/v1/targets").await;

    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    let active = body["data"]["activeTargets"].as_array().unwrap();
    assert_eq!(active.len(), 3);
    assert_eq!(active[0]["health"], "up");
    assert_eq!(active[0]["lastScrape"], "2024-01-01T00:00:00Z");
    assert_eq!(active[1]["lastError"], "connection refused");
    assert_eq!(active[2]["lastScrape"], "0001-01-01T00:00:00Z");
    assert_eq!(active[2]["lastError"], "");

    let dropped = body["data"]["droppedTargets"].as_array().unwrap();
    assert_eq!(dropped.len(), 1);
    assert_eq!(dropped[0]["discoveredLabels"]["__address__"], "d:9100");
}

#[tokio::test]
async fn target_metadata_filters() {
    let test = TestApiBuilder::default().build();

    let res = get(test.router(), "/api/v1/targets/metadata?metric=up").await;
    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 3);
    assert!(data[0].get("metric").is_none());
    assert_eq!(data[0]["type"], "gauge");

    let uri = format!(
        "/api/v1/targets/metadata?{}",
        qs(&[("match_target", "{job=\"db\"}")])
    );
    let res = get(test.router(), &uri).await;
    let body = res.json();
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["target"]["instance"], "c:9100");
    assert_eq!(data[0]["metric"], "up");
}

#[tokio::test]
async fn target_metadata_limit_is_checked_per_target() {
    let test = TestApiBuilder::default().build();

    let res = get(test.router(), "/api/v1/targets/metadata?limit=1").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["data"].as_array().unwrap().len(), 2);

    let res = get(test.router(), "/api/v1/targets/metadata?limit=some").await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["error"], "limit must be a number");
}

#[tokio::test]
async fn target_metadata_not_found() {
    let test = TestApiBuilder::default().build();
    let res = get(test.router(), "/api/v1/targets/metadata?metric=missing").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    let body = res.json();
    assert_eq!(body["errorType"], "not_found");
    assert_eq!(body["error"], "specified metadata not found");
}

#[tokio::test]
async fn alertmanagers_listing() {
    let test = TestApiBuilder::default().build();
    let res = get(test.router(), "/api/v1/alertmanagers").await;
    let body = res.json();
    assert_eq!(
        body["data"]["activeAlertmanagers"][0]["url"],
        "http://alertmanager:9093/api/v1/alerts"
    );
    assert_eq!(
        body["data"]["droppedAlertmanagers"][0]["url"],
        "http://dropped:9093/api/v1/alerts"
    );
}

#[tokio::test]
async fn alerts_only_active() {
    let test = TestApiBuilder::default().build();
    let res = get(test.router(), "/api/v1/alerts").await;
    let body = res.json();
    let alerts = body["data"]["alerts"].as_array().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["state"], "firing");
    assert_eq!(alerts[0]["value"], "0e+00");
    assert_eq!(alerts[0]["activeAt"], "2024-01-01T00:00:00Z");
}

#[tokio::test]
async fn rules_are_tagged_by_kind() {
    let test = TestApiBuilder::default().build();
    let res = get(test.router(), "/api/v1/rules").await;
    let body = res.json();

    let group = &body["data"]["groups"][0];
    assert_eq!(group["name"], "example");
    assert_eq!(group["interval"], 60.0);

    let alerting = &group["rules"][0];
    assert_eq!(alerting["type"], "alerting");
    assert_eq!(alerting["duration"], 300.0);
    assert_eq!(alerting["health"], "ok");
    assert_eq!(alerting["alerts"].as_array().unwrap().len(), 1);
    assert!(alerting.get("lastError").is_none());

    let recording = &group["rules"][1];
    assert_eq!(recording["type"], "recording");
    assert!(recording.get("labels").is_none());
    assert_eq!(recording["health"], "err");
    assert_eq!(recording["lastError"], "many-to-many matching not allowed");
}

#[tokio::test]
async fn status_config_and_flags() {
    let mut builder = TestApiBuilder::default();
    builder
        .options
        .flags
        .insert("web.enable-admin-api".to_string(), "false".to_string());
    let test = builder.build();

    let res = get(test.router(), "/api/v1/status/config").await;
    assert!(res.json()["data"]["yaml"]
        .as_str()
        .unwrap()
        .contains("listen_address"));

    let res = get(test.router(), "/api/v1/status/flags").await;
    assert_eq!(res.json()["data"]["web.enable-admin-api"], "false");
}

// ============================================================================
// Admin
// ============================================================================

#[tokio::test]
async fn admin_disabled_is_unavailable() {
    let test = TestApiBuilder::default().build();
    for path in ["delete_series?match[]=up", "clean_tombstones", "snapshot"] {
        let uri = format!("/api/v1/admin/tsdb/{}", path);
        let res = send(
            test.router(),
            Request::post(uri.as_str()).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE, "{}", path);
        let body = res.json();
        assert_eq!(body["errorType"], "unavailable");
        assert_eq!(body["error"], "admin APIs disabled");
    }
}

#[tokio::test]
async fn unavailable_status_is_configurable() {
    let mut builder = TestApiBuilder::default();
    builder.options.status_mapping = StatusMapping::new(StatusCode::INTERNAL_SERVER_ERROR);
    let test = builder.build();

    let res = send(
        test.router(),
        Request::post("/api/v1/admin/tsdb/clean_tombstones")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.json()["errorType"], "unavailable");
}

#[tokio::test]
async fn admin_tsdb_not_ready() {
    let mut builder = TestApiBuilder::default().admin();
    builder.open_tsdb = false;
    let test = builder.build();

    let res = send(
        test.router(),
        Request::post("/api/v1/admin/tsdb/clean_tombstones")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.json()["error"], "TSDB not ready");
}

#[tokio::test]
async fn delete_series_then_clean_tombstones() {
    let test = TestApiBuilder::default().admin().build();
    assert_eq!(test.storage.series_count(), 4);

    let form = qs(&[("match[]", "up{job=\"db\"}")]);
    let res = post_form(test.router(), "/api/v1/admin/tsdb/delete_series", &form).await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);
    assert!(res.body.is_empty());

    let uri = format!("/api/v1/series?{}", qs(&[("match[]", "up")]));
    let res = get(test.router(), &uri).await;
    assert_eq!(res.json()["data"].as_array().unwrap().len(), 2);

    let res = send(
        test.router(),
        Request::put("/api/v1/admin/tsdb/clean_tombstones")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);
    assert_eq!(test.storage.series_count(), 3);
}

#[tokio::test]
async fn delete_series_rejects_bad_selector_without_deleting() {
    let test = TestApiBuilder::default().admin().build();
    let form = qs(&[("match[]", "up{job=\"db\"}"), ("match[]", "up{")]);
    let res = post_form(test.router(), "/api/v1/admin/tsdb/delete_series", &form).await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    let uri = format!("/api/v1/series?{}", qs(&[("match[]", "up")]));
    let res = get(test.router(), &uri).await;
    assert_eq!(res.json()["data"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn snapshot_creates_directory() {
    let test = TestApiBuilder::default().admin().build();
    let res = send(
        test.router(),
        Request::post("/api/v1/admin/tsdb/snapshot")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    let name = body["data"]["name"].as_str().unwrap().to_string();
    let pattern = regex::Regex::new(r"^\d{8}T\d{6}Z-[0-9a-f]+$").unwrap();
    assert!(pattern.is_match(&name), "unexpected snapshot name {}", name);

    let snapshot = test.dir.path().join("snapshots").join(&name);
    assert!(snapshot.join(SNAPSHOT_FILE).exists());
}

#[tokio::test]
async fn snapshot_rejects_bad_skip_head() {
    let test = TestApiBuilder::default().admin().build();
    let res = post_form(test.router(), "/api/v1/admin/tsdb/snapshot", "skip_head=maybe").await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["errorType"], "bad_data");

    let res = post_form(test.router(), "/api/v1/admin/tsdb/snapshot", "skip_head=true").await;
    assert_eq!(res.status, StatusCode::OK);
}

// ============================================================================
// Dispatcher behaviour
// ============================================================================

#[tokio::test]
async fn not_ready_answers_plain_503() {
    let mut builder = TestApiBuilder::default();
    builder.ready = false;
    let test = builder.build();

    let res = get(test.router(), "/api/v1/labels").await;
    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.text(), "Service Unavailable\n");

    let res = get(test.router(), "/-/ready").await;
    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);

    let res = get(test.router(), "/-/healthy").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.text(), "Healthy.\n");
}

#[tokio::test]
async fn unknown_api_path_is_not_found() {
    let test = TestApiBuilder::default().build();

    let res = get(test.router(), "/api/v1/does_not_exist").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = post_form(test.router(), "/api/v1/does/not/exist", "a=b").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = send(
        test.router(),
        Request::options("/api/v1/does_not_exist")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);

    let res = send(
        test.router(),
        Request::delete("/api/v1/labels").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn options_sets_cors_headers() {
    let test = TestApiBuilder::default().build();
    let res = send(
        test.router(),
        Request::options("/api/v1/does/not/exist")
            .header("origin", "https://grafana.example.com")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(res.status, StatusCode::NO_CONTENT);
    assert_eq!(res.headers["access-control-allow-origin"], "*");
    assert_eq!(
        res.headers["access-control-allow-methods"],
        "GET, POST, DELETE, OPTIONS"
    );
    assert_eq!(res.headers["access-control-expose-headers"], "Date");
    assert!(res
        .headers
        .get_all("vary")
        .iter()
        .any(|v| v == "Origin"));
}

#[tokio::test]
async fn cors_origin_pattern_is_anchored() {
    let mut builder = TestApiBuilder::default();
    builder.options.cors = CorsPolicy::new(r"https://.*\.example\.com").unwrap();
    let test = builder.build();

    let request = |origin: &str| {
        Request::options("/api/v1/query")
            .header("origin", origin)
            .body(Body::empty())
            .unwrap()
    };

    let res = send(test.router(), request("https://grafana.example.com")).await;
    assert_eq!(
        res.headers["access-control-allow-origin"],
        "https://grafana.example.com"
    );

    let res = send(test.router(), request("https://grafana.example.com.evil")).await;
    assert!(res.headers.get("access-control-allow-origin").is_none());
    assert!(res.headers.get("access-control-allow-headers").is_some());
}

#[tokio::test]
async fn custom_route_prefix() {
    let mut builder = TestApiBuilder::default();
    builder.options.route_prefix = "/prom/api/v1/".to_string();
    let test = builder.build();

    let res = get(test.router(), "/prom/api/v1/labels").await;
    assert_eq!(res.status, StatusCode::OK);

    let res = get(test.router(), "/api/v1/labels").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn metrics_endpoint_counts_requests() {
    let test = TestApiBuilder::default().build();
    get(test.router(), "/api/v1/labels").await;
    get(test.router(), "/api/v1/label/1bad/values").await;

    let res = get(test.router(), "/metrics").await;
    assert_eq!(res.status, StatusCode::OK);
    let text = res.text();
    assert!(text.contains("api_requests_total_labels 1"));
    assert!(text.contains("api_errors_total_bad_data 1"));
}
