//! Integration tests for the jobindex HTTP API.
//!
//! Uses axum-test to drive the push endpoints without starting a real server.

#![allow(clippy::unwrap_used, clippy::panic)]

use axum::http::{HeaderValue, StatusCode, header};
use axum_test::TestServer;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use jobindex::api::{
    AppState, ErrorResponse, HealthResponse, IndexResponse, ListResponse, OBJECT_FINALIZE,
    create_router,
};
use jobindex::config::{AppConfig, ServerConfig};
use jobindex_core::{MemoryStore, ObjectStore, StoredObject};
use serde_json::json;
use std::sync::Arc;

const BUCKET: &str = "b";
const MARKER: &str = "logs/my-job/55/finished.json";
const STATE_ENTRY: &str = "index/job-state/2021-05-03T00:00:00Z/my-job/55";
const DUMP: &str = "logs/release-openshift-origin-installer-e2e-gcp-4.8/901/artifacts/e2e-gcp/metrics/job_metrics.json";
const PUSH_TOKEN: &str = "test-push-token-12345";
const SUBSCRIPTION: &str = "projects/ci/subscriptions/job-artifacts";

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Create a test server over `store` with default settings.
fn create_test_server(store: Arc<MemoryStore>) -> TestServer {
    create_configured_server(store, ServerConfig::default())
}

fn create_configured_server(store: Arc<MemoryStore>, server: ServerConfig) -> TestServer {
    let config = AppConfig {
        server,
        ..AppConfig::default()
    };
    TestServer::new(create_router(AppState::new(store, config))).unwrap()
}

fn token_server(store: Arc<MemoryStore>) -> TestServer {
    create_configured_server(
        store,
        ServerConfig {
            push_token: Some(PUSH_TOKEN.to_string()),
            ..ServerConfig::default()
        },
    )
}

fn bearer(token: &str) -> HeaderValue {
    format!("Bearer {}", token).parse().unwrap()
}

fn seeded_store(objects: &[(&str, &str)]) -> Arc<MemoryStore> {
    let store = MemoryStore::new();
    for (name, body) in objects {
        store
            .create_if_absent(BUCKET, name, StoredObject::new(*body))
            .unwrap();
    }
    Arc::new(store)
}

fn finished_marker() -> (&'static str, &'static str) {
    (MARKER, r#"{"timestamp":1620000000,"passed":true}"#)
}

// =============================================================================
// HEALTH ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let server = create_test_server(Arc::new(MemoryStore::new()));

    let response = server.get("/health").await;

    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

// =============================================================================
// EVENTS ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_event_publishes_job_state() {
    let store = seeded_store(&[finished_marker()]);
    let server = create_test_server(Arc::clone(&store));

    let response = server
        .post("/events")
        .json(&json!({"bucket": BUCKET, "name": MARKER, "contentType": "application/json"}))
        .await;

    response.assert_status_ok();
    let body: IndexResponse = response.json();
    assert_eq!(body.outcome, "indexed");
    assert_eq!(body.entries.len(), 1);
    assert_eq!(body.entries[0].kind, "job-state");
    assert_eq!(body.entries[0].path, STATE_ENTRY);
    assert_eq!(body.entries[0].publication, "created");

    let entry = store.stat(BUCKET, STATE_ENTRY).unwrap().unwrap();
    assert_eq!(entry.metadata.get("state").map(String::as_str), Some("success"));
}

#[tokio::test]
async fn test_redelivered_event_is_noop() {
    let store = seeded_store(&[finished_marker()]);
    let server = create_test_server(Arc::clone(&store));
    let event = json!({"bucket": BUCKET, "name": MARKER});

    server.post("/events").json(&event).await.assert_status_ok();
    let response = server.post("/events").json(&event).await;

    response.assert_status_ok();
    let body: IndexResponse = response.json();
    assert_eq!(body.entries[0].publication, "already-indexed");
    assert_eq!(store.list(BUCKET, "index/").unwrap().len(), 1);
}

#[tokio::test]
async fn test_unrelated_object_is_ignored() {
    let server = create_test_server(Arc::new(MemoryStore::new()));

    let response = server
        .post("/events")
        .json(&json!({"bucket": BUCKET, "name": "logs/my-job/55/build-log.txt"}))
        .await;

    response.assert_status_ok();
    let body: IndexResponse = response.json();
    assert_eq!(body.outcome, "ignored");
    assert!(body.entries.is_empty());
}

#[tokio::test]
async fn test_out_of_scope_dump_is_skipped() {
    let server = create_test_server(Arc::new(MemoryStore::new()));

    let response = server
        .post("/events")
        .json(&json!({"bucket": BUCKET, "name": "logs/pull-ci-foo/1/job_metrics.json"}))
        .await;

    response.assert_status_ok();
    let body: IndexResponse = response.json();
    assert_eq!(body.outcome, "skipped");
    assert_eq!(body.reason.as_deref(), Some("unlisted_job"));
}

#[tokio::test]
async fn test_missing_source_object_is_not_found() {
    let server = create_test_server(Arc::new(MemoryStore::new()));

    let response = server
        .post("/events")
        .json(&json!({"bucket": BUCKET, "name": MARKER}))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
    let body: IndexResponse = response.json();
    assert_eq!(body.outcome, "failed");
    assert!(body.error.is_some());
}

#[tokio::test]
async fn test_dump_without_duration_is_unprocessable() {
    let store = seeded_store(&[(
        DUMP,
        r#"{"cluster:cpu":{"status":"success","data":{"resultType":"vector","result":[{"metric":{},"value":[1620000000,"3"]}]}}}"#,
    )]);
    let server = create_test_server(Arc::clone(&store));

    let response = server
        .post("/events")
        .json(&json!({"bucket": BUCKET, "name": DUMP}))
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: IndexResponse = response.json();
    assert!(body.error.unwrap().contains("job:duration:total:seconds"));
    assert!(store.list(BUCKET, "index/").unwrap().is_empty());
}

#[tokio::test]
async fn test_conflicting_entry_is_unprocessable() {
    let store = seeded_store(&[finished_marker(), (STATE_ENTRY, "{}")]);
    let server = create_test_server(Arc::clone(&store));

    let response = server
        .post("/events")
        .json(&json!({"bucket": BUCKET, "name": MARKER}))
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(store.get(BUCKET, STATE_ENTRY).unwrap(), b"{}".to_vec());
}

#[tokio::test]
async fn test_invalid_json_body() {
    let server = create_test_server(Arc::new(MemoryStore::new()));

    let response = server
        .post("/events")
        .bytes(bytes::Bytes::from("not valid json"))
        .content_type("application/json")
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: IndexResponse = response.json();
    assert_eq!(body.outcome, "failed");
}

// =============================================================================
// PUB/SUB ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_pubsub_data_payload() {
    let store = seeded_store(&[finished_marker()]);
    let server = create_test_server(Arc::clone(&store));
    let data = STANDARD.encode(json!({"bucket": BUCKET, "name": MARKER}).to_string());

    let response = server
        .post("/pubsub")
        .json(&json!({
            "message": {
                "data": data,
                "attributes": {"eventType": OBJECT_FINALIZE},
                "messageId": "1"
            },
            "subscription": "projects/p/subscriptions/s"
        }))
        .await;

    response.assert_status_ok();
    let body: IndexResponse = response.json();
    assert_eq!(body.outcome, "indexed");
    assert!(store.stat(BUCKET, STATE_ENTRY).unwrap().is_some());
}

#[tokio::test]
async fn test_pubsub_attributes_only() {
    let store = seeded_store(&[finished_marker()]);
    let server = create_test_server(Arc::clone(&store));

    let response = server
        .post("/pubsub")
        .json(&json!({
            "message": {"attributes": {"bucketId": BUCKET, "objectId": MARKER}}
        }))
        .await;

    response.assert_status_ok();
    assert!(store.stat(BUCKET, STATE_ENTRY).unwrap().is_some());
}

#[tokio::test]
async fn test_pubsub_delete_notification_is_ignored() {
    let store = seeded_store(&[finished_marker()]);
    let server = create_test_server(Arc::clone(&store));

    let response = server
        .post("/pubsub")
        .json(&json!({
            "message": {
                "attributes": {"eventType": "OBJECT_DELETE", "bucketId": BUCKET, "objectId": MARKER}
            }
        }))
        .await;

    response.assert_status_ok();
    let body: IndexResponse = response.json();
    assert_eq!(body.outcome, "ignored");
    assert!(store.stat(BUCKET, STATE_ENTRY).unwrap().is_none());
}

#[tokio::test]
async fn test_pubsub_without_object_is_rejected() {
    let server = create_test_server(Arc::new(MemoryStore::new()));

    let response = server
        .post("/pubsub")
        .json(&json!({"message": {"attributes": {}}}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

// =============================================================================
// OBJECTS ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_objects_listing() {
    let store = seeded_store(&[finished_marker(), ("logs/other/1/finished.json", "{}")]);
    let server = create_test_server(store);

    let response = server
        .get("/objects")
        .add_query_param("bucket", BUCKET)
        .add_query_param("prefix", "logs/my-job/")
        .await;

    response.assert_status_ok();
    let listing: ListResponse = response.json();
    assert_eq!(listing.names, vec![MARKER.to_string()]);
}

#[tokio::test]
async fn test_objects_requires_bucket() {
    let server = create_test_server(Arc::new(MemoryStore::new()));

    let response = server.get("/objects").await;

    assert!(response.status_code().is_client_error());
}

// =============================================================================
// PUSH TOKEN TESTS
// =============================================================================

#[tokio::test]
async fn test_auth_valid_bearer_token() {
    let server = token_server(seeded_store(&[finished_marker()]));

    let response = server
        .get("/objects")
        .add_query_param("bucket", BUCKET)
        .add_header(header::AUTHORIZATION, bearer(PUSH_TOKEN))
        .await;

    response.assert_status_ok();
}

#[tokio::test]
async fn test_auth_query_token() {
    let store = seeded_store(&[finished_marker()]);
    let server = token_server(Arc::clone(&store));

    let response = server
        .post("/events")
        .add_query_param("token", PUSH_TOKEN)
        .json(&json!({"bucket": BUCKET, "name": MARKER}))
        .await;

    response.assert_status_ok();
    assert!(store.stat(BUCKET, STATE_ENTRY).unwrap().is_some());
}

#[tokio::test]
async fn test_auth_invalid_token_rejected() {
    let store = seeded_store(&[finished_marker()]);
    let server = token_server(Arc::clone(&store));

    let response = server
        .post("/events")
        .add_header(header::AUTHORIZATION, bearer("wrong-token"))
        .json(&json!({"bucket": BUCKET, "name": MARKER}))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: ErrorResponse = response.json();
    assert!(body.error.contains("push token"));
    assert!(store.stat(BUCKET, STATE_ENTRY).unwrap().is_none());

    let response = server
        .post("/events")
        .add_query_param("token", "wrong-token")
        .json(&json!({"bucket": BUCKET, "name": MARKER}))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_missing_token_rejected() {
    let server = token_server(seeded_store(&[finished_marker()]));

    let response = server
        .post("/pubsub")
        .json(&json!({"message": {"attributes": {"bucketId": BUCKET, "objectId": MARKER}}}))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_health_endpoint_bypasses_auth() {
    let server = token_server(Arc::new(MemoryStore::new()));

    let response = server.get("/health").await;

    response.assert_status_ok();
}

// =============================================================================
// SUBSCRIPTION ALLOWLIST TESTS
// =============================================================================

fn allowlist_server(store: Arc<MemoryStore>) -> TestServer {
    create_configured_server(
        store,
        ServerConfig {
            subscriptions: vec![SUBSCRIPTION.to_string()],
            ..ServerConfig::default()
        },
    )
}

#[tokio::test]
async fn test_allowlisted_subscription_is_indexed() {
    let store = seeded_store(&[finished_marker()]);
    let server = allowlist_server(Arc::clone(&store));

    let response = server
        .post("/pubsub")
        .json(&json!({
            "message": {"attributes": {"bucketId": BUCKET, "objectId": MARKER}},
            "subscription": SUBSCRIPTION
        }))
        .await;

    response.assert_status_ok();
    assert!(store.stat(BUCKET, STATE_ENTRY).unwrap().is_some());
}

#[tokio::test]
async fn test_unlisted_subscription_is_forbidden() {
    let store = seeded_store(&[finished_marker()]);
    let server = allowlist_server(Arc::clone(&store));

    for subscription in [json!("projects/ci/subscriptions/other"), json!(null)] {
        let response = server
            .post("/pubsub")
            .json(&json!({
                "message": {"attributes": {"bucketId": BUCKET, "objectId": MARKER}},
                "subscription": subscription
            }))
            .await;

        response.assert_status(StatusCode::FORBIDDEN);
        let body: IndexResponse = response.json();
        assert_eq!(body.outcome, "failed");
    }
    assert!(store.stat(BUCKET, STATE_ENTRY).unwrap().is_none());
}

// =============================================================================
// RATE LIMIT TESTS
// =============================================================================

#[tokio::test]
async fn test_rate_limit_answers_retry_after() {
    let server = create_configured_server(
        seeded_store(&[finished_marker()]),
        ServerConfig {
            rate_limit: 1,
            ..ServerConfig::default()
        },
    );

    server
        .get("/objects")
        .add_query_param("bucket", BUCKET)
        .await
        .assert_status_ok();

    let response = server.get("/objects").add_query_param("bucket", BUCKET).await;
    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response
        .header(header::RETRY_AFTER)
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after >= 1);

    server.get("/health").await.assert_status_ok();
}

#[tokio::test]
async fn test_rate_limit_disabled() {
    let server = create_configured_server(
        Arc::new(MemoryStore::new()),
        ServerConfig {
            rate_limit: 0,
            ..ServerConfig::default()
        },
    );

    for _ in 0..5 {
        server
            .get("/objects")
            .add_query_param("bucket", BUCKET)
            .await
            .assert_status_ok();
    }
}
