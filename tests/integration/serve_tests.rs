//! Streaming endpoint tests.

use std::time::Duration;

use axum::http::{header, StatusCode};

use lexgate::{BucketClass, ByteRange, Grant, ObjectMetadata, SharedStore, TokenCodec};

use super::test_utils::*;

fn document_token(gateway: &TestGateway, key: &str) -> String {
    gateway
        .codec
        .mint(
            &Grant::new(ALICE, key, BucketClass::Document),
            Duration::from_secs(300),
        )
        .token
}

fn video_cookie_header(gateway: &TestGateway) -> String {
    let token = gateway
        .codec
        .mint(
            &Grant::new(ALICE, LECTURE_KEY, BucketClass::Video),
            Duration::from_secs(10_800),
        )
        .token;
    format!("lexgate_video={}", token)
}

// =============================================================================
// Document Serving
// =============================================================================

#[tokio::test]
async fn test_serve_full_document() {
    let gateway = TestGateway::new();
    let token = document_token(&gateway, HANDBOOK_KEY);

    let response = gateway
        .send(get_request(&format!("/media/document?token={}", token), &[]))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "application/pdf");
    assert_eq!(headers.get(header::CONTENT_LENGTH).unwrap(), "5000");
    assert_eq!(headers.get(header::ACCEPT_RANGES).unwrap(), "bytes");
    assert_eq!(
        headers.get(header::CACHE_CONTROL).unwrap(),
        "private, max-age=300"
    );
    assert_eq!(
        headers.get(header::CONTENT_DISPOSITION).unwrap(),
        "inline; filename=\"handbook.pdf\"; filename*=UTF-8''handbook.pdf"
    );
    assert_eq!(headers.get(header::X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff");
    assert_eq!(headers.get(header::ETAG).unwrap(), "\"etag-5000\"");
    assert!(headers.get(header::LAST_MODIFIED).is_some());
    assert!(headers.get(header::CONTENT_RANGE).is_none());

    let body = body_bytes(response).await;
    assert_eq!(body.as_ref(), patterned_bytes(HANDBOOK_SIZE).as_slice());
    assert_eq!(gateway.blobs.last_range(), None);
}

#[tokio::test]
async fn test_serve_document_range() {
    let gateway = TestGateway::new();
    let token = document_token(&gateway, HANDBOOK_KEY);

    let response = gateway
        .send(get_request(
            &format!("/media/document?token={}", token),
            &[("range", "bytes=100-199")],
        ))
        .await;

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        response.headers().get(header::CONTENT_RANGE).unwrap(),
        "bytes 100-199/5000"
    );
    assert_eq!(response.headers().get(header::CONTENT_LENGTH).unwrap(), "100");
    assert_eq!(gateway.blobs.last_range(), Some(ByteRange::new(100, 199)));

    let body = body_bytes(response).await;
    assert_eq!(body.as_ref(), &patterned_bytes(HANDBOOK_SIZE)[100..200]);
}

#[tokio::test]
async fn test_serve_document_suffix_range() {
    let gateway = TestGateway::new();
    let token = document_token(&gateway, HANDBOOK_KEY);

    let response = gateway
        .send(get_request(
            &format!("/media/document?token={}", token),
            &[("range", "bytes=-500")],
        ))
        .await;

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        response.headers().get(header::CONTENT_RANGE).unwrap(),
        "bytes 4500-4999/5000"
    );
    let body = body_bytes(response).await;
    assert_eq!(body.len(), 500);
}

#[tokio::test]
async fn test_serve_document_as_attachment() {
    let gateway = TestGateway::new();
    let token = document_token(&gateway, HANDBOOK_KEY);

    let response = gateway
        .send(get_request(
            &format!(
                "/media/document?token={}&download=1&filename=Contracts%20%C3%A9d.pdf",
                token
            ),
            &[],
        ))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
        "attachment; filename=\"Contracts _d.pdf\"; filename*=UTF-8''Contracts%20%C3%A9d.pdf"
    );
}

#[tokio::test]
async fn test_serve_document_filename_cannot_inject() {
    let gateway = TestGateway::new();
    let token = document_token(&gateway, HANDBOOK_KEY);

    let response = gateway
        .send(get_request(
            &format!(
                "/media/document?token={}&filename=..%2F..%2Fevil%22%3B%20x%3Dy.pdf",
                token
            ),
            &[],
        ))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(disposition.starts_with("inline; filename=\"evil x=y.pdf\""));
}

#[tokio::test]
async fn test_serve_falls_back_to_inferred_content_type() {
    let gateway = TestGateway::new();
    let token = document_token(&gateway, SAMPLE_KEY);

    let response = gateway
        .send(get_request(&format!("/media/document?token={}", token), &[]))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/pdf"
    );
}

// =============================================================================
// Token Rejection
// =============================================================================

#[tokio::test]
async fn test_serve_without_token() {
    let gateway = TestGateway::new();

    let response = gateway.send(get_request("/media/document", &[])).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = gateway.send(get_request("/media/document?token=", &[])).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(gateway.blobs.head_calls(), 0);
}

#[tokio::test]
async fn test_serve_rejects_foreign_signature() {
    let gateway = TestGateway::new();
    let forged = TokenCodec::new("another-secret-that-is-also-32-bytes-long")
        .mint(
            &Grant::new(ALICE, HANDBOOK_KEY, BucketClass::Document),
            Duration::from_secs(300),
        )
        .token;

    let response = gateway
        .send(get_request(&format!("/media/document?token={}", forged), &[]))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "unauthorized");
    assert_eq!(gateway.blobs.head_calls(), 0);
    assert_eq!(gateway.blobs.get_calls(), 0);
}

#[tokio::test]
async fn test_serve_rejects_expired_token() {
    let gateway = TestGateway::new();
    let expired = gateway
        .codec
        .mint_at(
            &Grant::new(ALICE, HANDBOOK_KEY, BucketClass::Document),
            Duration::from_secs(300),
            1_000_000_000,
        )
        .token;

    let response = gateway
        .send(get_request(&format!("/media/document?token={}", expired), &[]))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_serve_rejects_garbage_token() {
    let gateway = TestGateway::new();

    let response = gateway
        .send(get_request("/media/document?token=not.a.token", &[]))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_video_token_rejected_on_document_route() {
    let gateway = TestGateway::new();
    let token = gateway
        .codec
        .mint(
            &Grant::new(ALICE, LECTURE_KEY, BucketClass::Video),
            Duration::from_secs(300),
        )
        .token;

    let response = gateway
        .send(get_request(&format!("/media/document?token={}", token), &[]))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(gateway.blobs.head_calls(), 0);
}

#[tokio::test]
async fn test_signed_traversal_key_is_refused() {
    let gateway = TestGateway::new();
    let token = document_token(&gateway, "docs/../../etc/passwd");

    let response = gateway
        .send(get_request(&format!("/media/document?token={}", token), &[]))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(gateway.blobs.head_calls(), 0);
}

// =============================================================================
// Backend Errors
// =============================================================================

#[tokio::test]
async fn test_serve_missing_object_is_not_found() {
    let gateway = TestGateway::new();
    let token = document_token(&gateway, "docs/removed.pdf");

    let response = gateway
        .send(get_request(&format!("/media/document?token={}", token), &[]))
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_backend_failure_is_generic() {
    let gateway = TestGateway::with(
        default_blobs().failing(),
        default_directory(),
        test_config(),
    );
    let token = document_token(&gateway, HANDBOOK_KEY);

    let response = gateway
        .send(get_request(&format!("/media/document?token={}", token), &[]))
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let text = String::from_utf8(body_bytes(response).await.to_vec()).unwrap();
    assert!(text.contains("internal_error"));
    assert!(!text.contains("AccessDenied"));
    assert!(!text.contains("s3://"));
}

// =============================================================================
// Metadata Cache
// =============================================================================

#[tokio::test]
async fn test_metadata_cached_across_requests() {
    let gateway = TestGateway::new();
    let token = document_token(&gateway, HANDBOOK_KEY);
    let uri = format!("/media/document?token={}", token);

    let first = gateway.send(get_request(&uri, &[])).await;
    assert_eq!(first.status(), StatusCode::OK);
    body_bytes(first).await;
    gateway
        .wait_for_cache_entry(&format!("meta:document:{}", HANDBOOK_KEY))
        .await;

    let second = gateway
        .send(get_request(&uri, &[("range", "bytes=0-9")]))
        .await;
    assert_eq!(second.status(), StatusCode::PARTIAL_CONTENT);

    assert_eq!(gateway.blobs.head_calls(), 1);
    assert_eq!(gateway.blobs.get_calls(), 2);
}

#[tokio::test]
async fn test_stale_metadata_refuses_short_range_body() {
    let gateway = TestGateway::new();
    let cache_key = format!("meta:document:{}", HANDBOOK_KEY);

    // The object has since shrunk from 10000 to 5000 bytes
    let stale = ObjectMetadata {
        size: 10_000,
        content_type: Some("application/pdf".to_string()),
        etag: Some("\"etag-10000\"".to_string()),
        last_modified: None,
        cached_at: 1_700_000_000,
    };
    gateway
        .store
        .set(
            &cache_key,
            serde_json::to_vec(&stale).unwrap(),
            Duration::from_secs(3600),
        )
        .await
        .unwrap();

    let token = document_token(&gateway, HANDBOOK_KEY);
    let uri = format!("/media/document?token={}", token);

    let response = gateway
        .send(get_request(&uri, &[("range", "bytes=4950-5049")]))
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.headers().get(header::CONTENT_RANGE).is_none());
    assert_eq!(gateway.blobs.head_calls(), 0);
    assert!(gateway.store.get(&cache_key).await.unwrap().is_none());

    // The next request re-reads the real size
    let response = gateway
        .send(get_request(&uri, &[("range", "bytes=4950-5049")]))
        .await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        response.headers().get(header::CONTENT_RANGE).unwrap(),
        "bytes 4950-4999/5000"
    );
    assert_eq!(body_bytes(response).await.len(), 50);
    assert_eq!(gateway.blobs.head_calls(), 1);
}

// =============================================================================
// Video Serving
// =============================================================================

#[tokio::test]
async fn test_serve_video_with_cookie() {
    let gateway = TestGateway::new();
    let cookie = video_cookie_header(&gateway);

    let response = gateway
        .send(get_request(
            "/media/video",
            &[("cookie", &cookie), ("range", "bytes=0-1023")],
        ))
        .await;

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "video/mp4"
    );
    assert_eq!(
        response.headers().get(header::CONTENT_RANGE).unwrap(),
        "bytes 0-1023/1000000"
    );
    let body = body_bytes(response).await;
    assert_eq!(body.len(), 1024);
}

#[tokio::test]
async fn test_serve_video_ignores_query_token() {
    let gateway = TestGateway::new();
    let token = gateway
        .codec
        .mint(
            &Grant::new(ALICE, LECTURE_KEY, BucketClass::Video),
            Duration::from_secs(300),
        )
        .token;

    let response = gateway
        .send(get_request(&format!("/media/video?token={}", token), &[]))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_document_token_rejected_on_video_route() {
    let gateway = TestGateway::new();
    let token = document_token(&gateway, HANDBOOK_KEY);

    let response = gateway
        .send(get_request(
            "/media/video",
            &[("cookie", &format!("lexgate_video={}", token))],
        ))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
