//! End-to-end delivery scenarios.
//!
//! Each test walks a client through issue and serve against the full router.

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::ConnectInfo;
use axum::http::{header, StatusCode};
use http_body_util::BodyExt;
use serde_json::json;

use lexgate::{BucketClass, Grant, RateLimitPolicy, SharedStore};

use super::test_utils::*;

// =============================================================================
// Issue Then Serve
// =============================================================================

#[tokio::test]
async fn test_unentitled_client_never_gets_a_token() {
    let gateway = TestGateway::new();

    for path in ["/access/document", "/access/video"] {
        let resource = if path.ends_with("video") {
            LECTURE_ID
        } else {
            HANDBOOK_ID
        };
        let response = gateway
            .send(issue_request(
                path,
                Some(BOB_BEARER),
                json!({ "resource_id": resource }),
            ))
            .await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        let body = body_json(response).await;
        assert!(body.get("token").is_none());
    }
}

#[tokio::test]
async fn test_video_issue_then_ranged_serve() {
    let gateway = TestGateway::new();

    let issued = gateway
        .send(issue_request(
            "/access/video",
            Some(ALICE_BEARER),
            json!({ "resource_id": LECTURE_ID }),
        ))
        .await;
    assert_eq!(issued.status(), StatusCode::OK);
    let cookie = cookie_pair(&issued);

    let response = gateway
        .send(get_request(
            "/media/video",
            &[("cookie", &cookie), ("range", "bytes=0-99")],
        ))
        .await;

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        response.headers().get(header::CONTENT_RANGE).unwrap(),
        "bytes 0-99/1000000"
    );
    assert_eq!(response.headers().get(header::CONTENT_LENGTH).unwrap(), "100");

    let body = body_bytes(response).await;
    assert_eq!(body.len(), 100);
    assert_eq!(body.as_ref(), &patterned_bytes(100)[..]);
}

#[tokio::test]
async fn test_document_issue_then_serve() {
    let gateway = TestGateway::new();

    let issued = gateway
        .send(issue_request(
            "/access/document",
            Some(ALICE_BEARER),
            json!({ "resource_id": HANDBOOK_ID }),
        ))
        .await;
    assert_eq!(issued.status(), StatusCode::OK);
    let body = body_json(issued).await;
    let token = body["token"].as_str().unwrap();

    let response = gateway
        .send(get_request(&format!("/media/document?token={}", token), &[]))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_bytes(response).await;
    assert_eq!(body.len(), HANDBOOK_SIZE);
}

#[tokio::test]
async fn test_signed_traversal_never_reaches_backend() {
    let gateway = TestGateway::new();
    let token = gateway
        .codec
        .mint(
            &Grant::new(ALICE, "videos/../../etc/passwd", BucketClass::Video),
            Duration::from_secs(300),
        )
        .token;

    let response = gateway
        .send(get_request(
            "/media/video",
            &[("cookie", &format!("lexgate_video={}", token))],
        ))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(gateway.blobs.head_calls(), 0);
    assert_eq!(gateway.blobs.get_calls(), 0);
}

#[tokio::test]
async fn test_missing_object_is_not_cached() {
    let gateway = TestGateway::new();
    let key = "docs/never-uploaded.pdf";
    let token = gateway
        .codec
        .mint(
            &Grant::new(ALICE, key, BucketClass::Document),
            Duration::from_secs(300),
        )
        .token;

    let response = gateway
        .send(get_request(&format!("/media/document?token={}", token), &[]))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
    assert!(gateway
        .store
        .get(&format!("meta:document:{}", key))
        .await
        .unwrap()
        .is_none());
    assert_eq!(gateway.blobs.get_calls(), 0);
}

// =============================================================================
// Range Edge Cases
// =============================================================================

#[tokio::test]
async fn test_range_past_end_is_unsatisfiable() {
    let gateway = TestGateway::new();
    let token = gateway
        .codec
        .mint(
            &Grant::new(ALICE, HANDBOOK_KEY, BucketClass::Document),
            Duration::from_secs(300),
        )
        .token;

    let response = gateway
        .send(get_request(
            &format!("/media/document?token={}", token),
            &[("range", "bytes=5000-")],
        ))
        .await;

    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(
        response.headers().get(header::CONTENT_RANGE).unwrap(),
        "bytes */5000"
    );
    assert_eq!(gateway.blobs.get_calls(), 0);
}

#[tokio::test]
async fn test_malformed_range_serves_full_object() {
    let gateway = TestGateway::new();
    let token = gateway
        .codec
        .mint(
            &Grant::new(ALICE, HANDBOOK_KEY, BucketClass::Document),
            Duration::from_secs(300),
        )
        .token;

    for range in ["pages=1-2", "bytes=abc-def", "bytes"] {
        let response = gateway
            .send(get_request(
                &format!("/media/document?token={}", token),
                &[("range", range)],
            ))
            .await;

        assert_eq!(response.status(), StatusCode::OK, "range {:?}", range);
        assert!(response.headers().get(header::CONTENT_RANGE).is_none());
        assert_eq!(body_bytes(response).await.len(), HANDBOOK_SIZE);
    }
}

#[tokio::test]
async fn test_open_ended_range_clamps_to_object() {
    let gateway = TestGateway::new();
    let token = gateway
        .codec
        .mint(
            &Grant::new(ALICE, HANDBOOK_KEY, BucketClass::Document),
            Duration::from_secs(300),
        )
        .token;

    let response = gateway
        .send(get_request(
            &format!("/media/document?token={}", token),
            &[("range", "bytes=4990-999999")],
        ))
        .await;

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        response.headers().get(header::CONTENT_RANGE).unwrap(),
        "bytes 4990-4999/5000"
    );
    assert_eq!(body_bytes(response).await.len(), 10);
}

// =============================================================================
// Rate Limiting
// =============================================================================

fn tight_issue_limits() -> lexgate::RouterConfig {
    test_config().with_rate_limits(
        RateLimitPolicy::STRICT.with_limits(3600, 2),
        RateLimitPolicy::RELAXED,
    )
}

#[tokio::test]
async fn test_issue_rate_limit() {
    let gateway = TestGateway::with_config(tight_issue_limits());
    let issue = || {
        issue_request(
            "/access/document",
            Some(ALICE_BEARER),
            json!({ "resource_id": HANDBOOK_ID }),
        )
    };

    let first = gateway.send(issue()).await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(first.headers().get("x-ratelimit-limit").unwrap(), "2");
    assert_eq!(first.headers().get("x-ratelimit-remaining").unwrap(), "1");

    let second = gateway.send(issue()).await;
    assert_eq!(second.status(), StatusCode::OK);

    let third = gateway.send(issue()).await;
    assert_eq!(third.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(third.headers().get("x-ratelimit-remaining").unwrap(), "0");
    assert!(third.headers().get(header::RETRY_AFTER).is_some());
    let body = body_json(third).await;
    assert_eq!(body["error"], "rate_limited");

    // Throttled requests never reach the directory
    assert_eq!(gateway.directory.authenticate_calls(), 2);
}

#[tokio::test]
async fn test_rate_limit_groups_are_independent() {
    let gateway = TestGateway::with_config(tight_issue_limits());

    for _ in 0..3 {
        gateway
            .send(issue_request(
                "/access/document",
                Some(ALICE_BEARER),
                json!({ "resource_id": HANDBOOK_ID }),
            ))
            .await;
    }

    let token = gateway
        .codec
        .mint(
            &Grant::new(ALICE, HANDBOOK_KEY, BucketClass::Document),
            Duration::from_secs(300),
        )
        .token;
    let response = gateway
        .send(get_request(&format!("/media/document?token={}", token), &[]))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-ratelimit-limit").unwrap(), "120");
}

#[tokio::test]
async fn test_rate_limit_is_per_client() {
    let gateway = TestGateway::with_config(tight_issue_limits());
    let from = |peer: &str| {
        let mut request = issue_request(
            "/access/document",
            Some(ALICE_BEARER),
            json!({ "resource_id": HANDBOOK_ID }),
        );
        let addr: SocketAddr = peer.parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        request
    };

    for _ in 0..2 {
        assert_eq!(
            gateway.send(from("198.51.100.2:40000")).await.status(),
            StatusCode::OK
        );
    }
    assert_eq!(
        gateway.send(from("198.51.100.2:40001")).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(
        gateway.send(from("198.51.100.3:40000")).await.status(),
        StatusCode::OK
    );
}

#[tokio::test]
async fn test_forwarded_for_only_when_trusted() {
    let config = tight_issue_limits().with_trust_forwarded_for(true);
    let gateway = TestGateway::with_config(config);
    let from = |client: &str| {
        let mut request = issue_request(
            "/access/document",
            Some(ALICE_BEARER),
            json!({ "resource_id": HANDBOOK_ID }),
        );
        request
            .headers_mut()
            .insert("x-forwarded-for", client.parse().unwrap());
        request
    };

    for _ in 0..2 {
        assert_eq!(gateway.send(from("203.0.113.7")).await.status(), StatusCode::OK);
    }
    assert_eq!(
        gateway.send(from("203.0.113.7, 10.0.0.1")).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(gateway.send(from("203.0.113.8")).await.status(), StatusCode::OK);
}

// =============================================================================
// Streaming
// =============================================================================

#[tokio::test]
async fn test_client_disconnect_stops_backend_stream() {
    let gateway = TestGateway::new();
    let token = gateway
        .codec
        .mint(
            &Grant::new(ALICE, LECTURE_KEY, BucketClass::Video),
            Duration::from_secs(300),
        )
        .token;

    let response = gateway
        .send(get_request(
            "/media/video",
            &[("cookie", &format!("lexgate_video={}", token))],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_LENGTH).unwrap(),
        "1000000"
    );

    let mut body = response.into_body();
    let frame = body.frame().await.unwrap().unwrap();
    assert_eq!(frame.into_data().unwrap().len(), MOCK_CHUNK_SIZE);
    assert!(!gateway.blobs.stream_dropped());

    drop(body);

    assert!(gateway.blobs.stream_dropped());
    let total_chunks = LECTURE_SIZE.div_ceil(MOCK_CHUNK_SIZE);
    assert!(gateway.blobs.chunks_yielded() < total_chunks);
}
