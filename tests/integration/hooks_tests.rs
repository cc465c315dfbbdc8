//! Invalidation hook and health tests.

use axum::http::StatusCode;
use serde_json::json;

use lexgate::{BucketClass, SharedStore};

use super::test_utils::*;

const ADMIN_TOKEN: &str = "hook-admin-token-0123456789";

fn hooks_gateway() -> TestGateway {
    TestGateway::with_config(test_config().with_admin_token(ADMIN_TOKEN))
}

// =============================================================================
// Hook Authentication
// =============================================================================

#[tokio::test]
async fn test_hooks_absent_without_admin_token() {
    let gateway = TestGateway::new();

    let response = gateway
        .send(issue_request(
            "/hooks/entitlement-updated",
            Some("anything"),
            json!({ "subject": ALICE }),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_hooks_require_admin_token() {
    let gateway = hooks_gateway();

    let response = gateway
        .send(issue_request(
            "/hooks/entitlement-updated",
            None,
            json!({ "subject": ALICE }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = gateway
        .send(issue_request(
            "/hooks/content-updated",
            Some(ALICE_BEARER),
            json!({ "bucket_class": "document", "key": HANDBOOK_KEY }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_hook_rejects_missing_fields() {
    let gateway = hooks_gateway();

    let response = gateway
        .send(issue_request(
            "/hooks/entitlement-updated",
            Some(ADMIN_TOKEN),
            json!({ "subject": "" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = gateway
        .send(issue_request(
            "/hooks/content-updated",
            Some(ADMIN_TOKEN),
            json!({ "bucket_class": "archive", "key": HANDBOOK_KEY }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Invalidation
// =============================================================================

#[tokio::test]
async fn test_content_updated_drops_metadata() {
    let gateway = hooks_gateway();
    let cache_key = format!("meta:document:{}", HANDBOOK_KEY);
    let token = gateway
        .codec
        .mint(
            &lexgate::Grant::new(ALICE, HANDBOOK_KEY, BucketClass::Document),
            std::time::Duration::from_secs(300),
        )
        .token;
    let uri = format!("/media/document?token={}", token);

    let response = gateway.send(get_request(&uri, &[])).await;
    assert_eq!(response.status(), StatusCode::OK);
    gateway.wait_for_cache_entry(&cache_key).await;

    let response = gateway
        .send(issue_request(
            "/hooks/content-updated",
            Some(ADMIN_TOKEN),
            json!({ "bucket_class": "document", "key": HANDBOOK_KEY }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(gateway.store.get(&cache_key).await.unwrap().is_none());

    let response = gateway.send(get_request(&uri, &[])).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(gateway.blobs.head_calls(), 2);
}

#[tokio::test]
async fn test_entitlement_updated_drops_decision() {
    let gateway = hooks_gateway();
    let cache_key = format!("entitlement:{}", ALICE);

    let response = gateway
        .send(issue_request(
            "/access/document",
            Some(ALICE_BEARER),
            json!({ "resource_id": HANDBOOK_ID }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    gateway.wait_for_cache_entry(&cache_key).await;

    let response = gateway
        .send(issue_request(
            "/hooks/entitlement-updated",
            Some(ADMIN_TOKEN),
            json!({ "subject": ALICE }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(gateway.store.get(&cache_key).await.unwrap().is_none());

    let response = gateway
        .send(issue_request(
            "/access/document",
            Some(ALICE_BEARER),
            json!({ "resource_id": HANDBOOK_ID }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(gateway.directory.entitlement_calls(), 2);
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_reports_store_mode() {
    let gateway = TestGateway::new();

    let response = gateway.send(get_request("/health", &[])).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-ratelimit-limit").is_none());

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"], "local");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}
