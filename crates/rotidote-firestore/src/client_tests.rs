//! Tests for Firestore client functionality.

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::client::{FirestoreClient, FirestoreConfig};
use crate::error::FirestoreError;
use crate::retry::RetryConfig;
use crate::token_cache::{ScriptedTokens, TokenSource};
use crate::types::{StructuredQuery, ToFirestoreValue, Value};

// =============================================================================
// Test Helpers
// =============================================================================

const DOCS: &str = "/v1/projects/test-project/databases/(default)/documents";

fn test_config() -> FirestoreConfig {
    FirestoreConfig {
        project_id: "test-project".to_string(),
        database_id: "(default)".to_string(),
        timeout: Duration::from_secs(5),
        connect_timeout: Duration::from_secs(2),
        retry: RetryConfig {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 5,
        },
        emulator_host: None,
    }
}

fn client_for(server: &MockServer) -> FirestoreClient {
    FirestoreClient::with_origin(
        test_config(),
        &server.uri(),
        TokenSource::Static("test-token".to_string()),
    )
    .unwrap()
}

fn video_doc(id: &str) -> serde_json::Value {
    json!({
        "name": format!("projects/test-project/databases/(default)/documents/videos/{}", id),
        "fields": {
            "title": {"stringValue": "Fractions"},
            "likes": {"integerValue": "3"}
        },
        "createTime": "2024-01-01T00:00:00.000000Z",
        "updateTime": "2024-01-01T00:00:01.000000Z"
    })
}

// =============================================================================
// Error Type Tests
// =============================================================================

#[test]
fn test_error_from_http_status_429() {
    let err = FirestoreError::from_http_status(429, "rate limited");
    assert!(matches!(err, FirestoreError::RateLimited(_)));
    assert!(err.is_retryable());
}

#[test]
fn test_error_from_http_status_503() {
    let err = FirestoreError::from_http_status(503, "service unavailable");
    assert!(matches!(err, FirestoreError::ServerError(503, _)));
    assert!(err.is_retryable());
}

#[test]
fn test_error_from_http_status_400() {
    let err = FirestoreError::from_http_status(400, "bad request");
    assert!(matches!(err, FirestoreError::RequestFailed(_)));
    assert!(!err.is_retryable());
}

#[test]
fn test_error_from_http_status_412() {
    let err = FirestoreError::from_http_status(412, "stale");
    assert!(err.is_precondition_failed());
    assert!(!err.is_retryable());
}

#[test]
fn test_error_http_status_getter() {
    assert_eq!(FirestoreError::RateLimited(1000).http_status(), Some(429));
    assert_eq!(
        FirestoreError::ServerError(502, "bad gateway".into()).http_status(),
        Some(502)
    );
    assert_eq!(FirestoreError::InvalidResponse("x".into()).http_status(), None);
}

#[test]
fn test_failed_precondition_text_is_recognized() {
    let err = FirestoreError::request_failed("400: FAILED_PRECONDITION");
    assert!(err.is_precondition_failed());
}

// =============================================================================
// HTTP Tests
// =============================================================================

#[tokio::test]
async fn test_get_document_sends_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/videos/abc", DOCS)))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(video_doc("abc")))
        .expect(1)
        .mount(&server)
        .await;

    let doc = client_for(&server)
        .get_document("videos", "abc")
        .await
        .unwrap()
        .expect("document");

    assert_eq!(doc.id(), Some("abc"));
    assert_eq!(doc.field::<String>("title").as_deref(), Some("Fractions"));
    assert_eq!(doc.field::<u32>("likes"), Some(3));
}

#[tokio::test]
async fn test_get_missing_document_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/videos/nope", DOCS)))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": {"status": "NOT_FOUND"}})))
        .mount(&server)
        .await;

    let doc = client_for(&server).get_document("videos", "nope").await.unwrap();
    assert!(doc.is_none());
}

#[tokio::test]
async fn test_get_document_retries_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/videos/abc", DOCS)))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/videos/abc", DOCS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(video_doc("abc")))
        .mount(&server)
        .await;

    let doc = client_for(&server).get_document("videos", "abc").await.unwrap();
    assert!(doc.is_some());
}

#[tokio::test]
async fn test_create_document_uses_document_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{}/videos", DOCS)))
        .and(query_param("documentId", "abc"))
        .and(body_partial_json(json!({"fields": {"title": {"stringValue": "Fractions"}}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(video_doc("abc")))
        .expect(1)
        .mount(&server)
        .await;

    let mut fields = HashMap::new();
    fields.insert("title".to_string(), "Fractions".to_firestore_value());
    let doc = client_for(&server)
        .create_document("videos", "abc", fields)
        .await
        .unwrap();
    assert_eq!(doc.id(), Some("abc"));
}

#[tokio::test]
async fn test_create_existing_document_conflicts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{}/videos", DOCS)))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .create_document("videos", "abc", HashMap::new())
        .await
        .unwrap_err();
    assert!(matches!(err, FirestoreError::AlreadyExists(_)));
}

#[tokio::test]
async fn test_update_with_stale_update_time_is_precondition_failure() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(format!("{}/videos/abc", DOCS)))
        .and(query_param("updateMask.fieldPaths", "likes"))
        .and(query_param("currentDocument.updateTime", "2024-01-01T00:00:01.000000Z"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": 400, "status": "FAILED_PRECONDITION", "message": "the stored version does not match"}
        })))
        .mount(&server)
        .await;

    let mut fields = HashMap::new();
    fields.insert("likes".to_string(), Value::IntegerValue("4".to_string()));
    let err = client_for(&server)
        .update_document_with_precondition(
            "videos",
            "abc",
            fields,
            &["likes"],
            "2024-01-01T00:00:01.000000Z",
        )
        .await
        .unwrap_err();
    assert!(err.is_precondition_failed());
}

#[tokio::test]
async fn test_update_without_precondition_requires_existence() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(format!("{}/videos/abc", DOCS)))
        .and(query_param("currentDocument.exists", "true"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .update_document("videos", "abc", HashMap::new(), &["status"])
        .await
        .unwrap_err();
    assert!(matches!(err, FirestoreError::NotFound(_)));
}

#[tokio::test]
async fn test_run_query_skips_read_time_only_rows() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{}:runQuery", DOCS)))
        .and(body_partial_json(json!({
            "structuredQuery": {"from": [{"collectionId": "videos"}], "limit": 2}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"document": video_doc("a"), "readTime": "2024-01-02T00:00:00Z"},
            {"document": video_doc("b"), "readTime": "2024-01-02T00:00:00Z"},
            {"readTime": "2024-01-02T00:00:00Z"}
        ])))
        .mount(&server)
        .await;

    let docs = client_for(&server)
        .run_query(None, StructuredQuery::collection("videos").limit(2))
        .await
        .unwrap();
    let ids: Vec<_> = docs.iter().filter_map(|d| d.id()).collect();
    assert_eq!(ids, vec!["a", "b"]);
}

#[tokio::test]
async fn test_expired_token_is_refreshed_and_request_retried_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/users/u1", DOCS)))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"code": 401, "status": "UNAUTHENTICATED", "details": [{"reason": "ACCESS_TOKEN_EXPIRED"}]}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/users/u1", DOCS)))
        .and(header("authorization", "Bearer renewed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/test-project/databases/(default)/documents/users/u1",
            "fields": {"name": {"stringValue": "Asha"}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = Arc::new(ScriptedTokens::new(vec![Some(("stale", 3600)), Some(("renewed", 3600))]));
    let client = FirestoreClient::with_origin(
        test_config(),
        &server.uri(),
        TokenSource::ServiceAccount(tokens.clone()),
    )
    .unwrap();

    let doc = client.get_document("users", "u1").await.unwrap().expect("document");
    assert_eq!(doc.field::<String>("name").as_deref(), Some("Asha"));
    assert_eq!(tokens.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_run_query_garbage_body_is_invalid_response() {
    let server = MockServer::start().await;
    // A two-byte character straddles the 200-byte prefix cut
    let body = format!("[{}", "é".repeat(150));
    Mock::given(method("POST"))
        .and(path(format!("{}:runQuery", DOCS)))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .run_query(None, StructuredQuery::collection("videos"))
        .await
        .unwrap_err();
    assert!(matches!(err, FirestoreError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_unauthorized_without_expiry_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/users/u1", DOCS)))
        .respond_with(ResponseTemplate::new(401).set_body_string("missing credentials"))
        .mount(&server)
        .await;

    let err = client_for(&server).get_document("users", "u1").await.unwrap_err();
    assert!(matches!(err, FirestoreError::AuthError(_)));
}

#[tokio::test]
async fn test_delete_missing_document_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(format!("{}/videos/gone", DOCS)))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server).delete_document("videos", "gone").await.unwrap();
}
