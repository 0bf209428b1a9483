//! Remote-read endpoint and admission gate tests.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{send, TestApiBuilder, TestResponse, FIXTURE_TIME_MS};
use meridian::core::context::RequestContext;
use meridian::net::gate::{AdmissionGate, GateError};
use meridian::observability::ApiMetrics;
use meridian::remote::codec::{decode_read_response, encode_read_request};
use meridian::remote::proto::{Label, LabelMatcher, MatcherType, Query, ReadRequest};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn matcher(kind: MatcherType, name: &str, value: &str) -> LabelMatcher {
    LabelMatcher {
        r#type: kind as i32,
        name: name.to_string(),
        value: value.to_string(),
    }
}

fn query(matchers: Vec<LabelMatcher>) -> Query {
    Query {
        start_timestamp_ms: FIXTURE_TIME_MS - 3_600_000,
        end_timestamp_ms: FIXTURE_TIME_MS,
        matchers,
        hints: None,
    }
}

async fn post_read(router: axum::Router, request: &ReadRequest) -> TestResponse {
    let body = encode_read_request(request).unwrap();
    send(
        router,
        Request::post("/api/v1/read")
            .header("content-type", "application/x-protobuf")
            .header("content-encoding", "snappy")
            .body(Body::from(body))
            .unwrap(),
    )
    .await
}

#[tokio::test]
async fn read_returns_series_with_external_labels() {
    let test = TestApiBuilder::default()
        .external_labels(&[("region", "eu")])
        .build();
    let request = ReadRequest {
        queries: vec![
            query(vec![
                matcher(MatcherType::Eq, "__name__", "up"),
                matcher(MatcherType::Eq, "region", "eu"),
            ]),
            query(vec![matcher(MatcherType::Eq, "job", "db")]),
        ],
    };

    let res = post_read(test.router(), &request).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.headers["content-type"], "application/x-protobuf");
    assert_eq!(res.headers["content-encoding"], "snappy");

    let response = decode_read_response(&res.body).unwrap();
    assert_eq!(response.results.len(), 2);

    let first = &response.results[0];
    assert_eq!(first.timeseries.len(), 3);
    assert_eq!(
        first.timeseries[0].labels,
        vec![
            Label::new("__name__", "up"),
            Label::new("instance", "a:9100"),
            Label::new("job", "api"),
            Label::new("region", "eu"),
        ]
    );
    assert_eq!(first.timeseries[0].samples.len(), 10);
    assert_eq!(first.timeseries[0].samples[9].timestamp, FIXTURE_TIME_MS - 60_000);

    let second = &response.results[1];
    assert_eq!(second.timeseries.len(), 1);
    assert_eq!(second.timeseries[0].labels[1], Label::new("instance", "c:9100"));

    let metrics = test.api.metrics().registry();
    assert_eq!(metrics.counter_get("api.remote_read.subqueries_total"), 2);
    assert_eq!(test.api.metrics().remote_read_queries(), 0);
}

#[tokio::test]
async fn read_series_label_wins_over_external_label() {
    let test = TestApiBuilder::default()
        .external_labels(&[("job", "global")])
        .build();
    let request = ReadRequest {
        queries: vec![query(vec![matcher(MatcherType::Eq, "__name__", "http_requests_total")])],
    };

    let res = post_read(test.router(), &request).await;
    let response = decode_read_response(&res.body).unwrap();
    let labels = &response.results[0].timeseries[0].labels;
    assert_eq!(
        labels,
        &vec![
            Label::new("__name__", "http_requests_total"),
            Label::new("job", "api"),
        ]
    );
}

#[tokio::test]
async fn read_invalid_matcher_aborts_whole_batch() {
    let test = TestApiBuilder::default().build();
    let request = ReadRequest {
        queries: vec![
            query(vec![matcher(MatcherType::Eq, "__name__", "up")]),
            query(vec![LabelMatcher {
                r#type: 7,
                name: "job".to_string(),
                value: "api".to_string(),
            }]),
        ],
    };

    let res = post_read(test.router(), &request).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.text(), "invalid matcher type 7\n");

    let gate = test.api.remote_read().gate();
    assert_eq!(gate.in_flight(), 0);
    assert_eq!(gate.available_permits(), gate.capacity());
    assert_eq!(test.api.metrics().remote_read_queries(), 0);
    assert_eq!(
        test.api
            .metrics()
            .registry()
            .counter_get("api.remote_read.subqueries_total"),
        0
    );
}

#[tokio::test]
async fn read_rejects_undecodable_body() {
    let test = TestApiBuilder::default().build();
    let res = send(
        test.router(),
        Request::post("/api/v1/read")
            .body(Body::from("not snappy"))
            .unwrap(),
    )
    .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(test.api.remote_read().gate().in_flight(), 0);
}

#[tokio::test]
async fn read_sample_limit_is_server_error() {
    let mut builder = TestApiBuilder::default();
    builder.options.remote_read_sample_limit = 15;
    let test = builder.build();
    let request = ReadRequest {
        queries: vec![query(vec![matcher(MatcherType::Eq, "__name__", "up")])],
    };

    let res = post_read(test.router(), &request).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.text(), "exceeded sample limit (15)\n");
    assert_eq!(test.api.remote_read().gate().in_flight(), 0);
}

#[tokio::test]
async fn read_is_not_compressed() {
    let test = TestApiBuilder::default().build();
    let request = ReadRequest {
        queries: vec![query(vec![matcher(MatcherType::Re, "job", "api|db")])],
    };
    let body = encode_read_request(&request).unwrap();
    let res = send(
        test.router(),
        Request::post("/api/v1/read")
            .header("accept-encoding", "gzip")
            .body(Body::from(body))
            .unwrap(),
    )
    .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.headers["content-encoding"], "snappy");
    let response = decode_read_response(&res.body).unwrap();
    assert_eq!(response.results[0].timeseries.len(), 4);
}

// ============================================================================
// Admission gate
// ============================================================================

#[tokio::test]
async fn gate_bounds_concurrency() {
    const CAPACITY: usize = 4;
    let metrics = Arc::new(ApiMetrics::new());
    let gate = Arc::new(AdmissionGate::new(CAPACITY, metrics.clone()));
    let current = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..CAPACITY * 3 {
        let gate = gate.clone();
        let current = current.clone();
        let peak = peak.clone();
        handles.push(tokio::spawn(async move {
            let ctx = RequestContext::new();
            let _permit = gate.acquire(&ctx).await.unwrap();
            let now = current.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            current.fetch_sub(1, Ordering::SeqCst);
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert!(peak.load(Ordering::SeqCst) <= CAPACITY);
    assert_eq!(gate.in_flight(), 0);
    assert_eq!(gate.available_permits(), CAPACITY);
    assert_eq!(metrics.remote_read_queries(), 0);
}

#[tokio::test]
async fn gate_waiter_leaves_on_cancellation() {
    let metrics = Arc::new(ApiMetrics::new());
    let gate = Arc::new(AdmissionGate::new(1, metrics.clone()));

    let holder_ctx = RequestContext::new();
    let permit = gate.acquire(&holder_ctx).await.unwrap();
    assert_eq!(metrics.remote_read_queries(), 1);

    let waiter_ctx = RequestContext::new();
    let waiter = {
        let gate = gate.clone();
        let ctx = waiter_ctx.clone();
        tokio::spawn(async move { gate.acquire(&ctx).await.map(|_| ()) })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    waiter_ctx.cancel();

    assert_eq!(waiter.await.unwrap(), Err(GateError::Canceled));
    assert_eq!(gate.in_flight(), 1);

    drop(permit);
    assert_eq!(gate.in_flight(), 0);
    assert_eq!(metrics.remote_read_queries(), 0);
}

#[tokio::test]
async fn gate_waiter_times_out() {
    let metrics = Arc::new(ApiMetrics::new());
    let gate = AdmissionGate::new(1, metrics);
    let _held = gate.acquire(&RequestContext::new()).await.unwrap();

    let ctx = RequestContext::new().with_timeout(Duration::from_millis(10));
    let err = gate.acquire(&ctx).await.map(|_| ()).unwrap_err();
    assert_eq!(err, GateError::DeadlineExceeded);
    assert_eq!(gate.in_flight(), 1);
}
