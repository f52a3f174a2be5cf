//! Error mapping over the HTTP surface.
//!
//! Verifies that typed engine failures reach the transport as stable
//! codes with friendly, non-leaking messages.

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::Value;
use std::time::Duration;

use integration_tests::{fixtures, setup::TestContext};
use relay_core::Error;

#[tokio::test]
async fn rate_limited_returns_429_with_retry_after() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    for i in 0..30 {
        server
            .post("/v1/text")
            .json(&fixtures::text_request(1, 1, &format!("m{}", i)))
            .await
            .assert_status_ok();
    }

    let response = server
        .post("/v1/text")
        .json(&fixtures::text_request(1, 1, "one too many"))
        .await;

    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response
        .headers()
        .get("Retry-After")
        .expect("Retry-After header")
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after > 290, "block should be ~300s, got {}", retry_after);

    let body: Value = response.json();
    assert_eq!(body["code"], "RATE_001");
}

#[tokio::test]
async fn busy_user_returns_409() {
    let ctx = TestContext::new();
    ctx.mock_upstream.set_delay(Duration::from_millis(200));
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let service = ctx.service.clone();
    let first = tokio::spawn(async move {
        service.submit_text(2, 2, "slow question".into(), None).await
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let response = server
        .post("/v1/text")
        .json(&fixtures::text_request(2, 2, "impatient"))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["code"], "BUSY_001");
    assert!(body["error"].as_str().unwrap().contains("wait"));

    assert!(first.await.unwrap().is_ok());
}

#[tokio::test]
async fn upstream_rejection_maps_to_502_without_leaking_the_body() {
    let ctx = TestContext::new();
    ctx.mock_upstream.push_failure(Error::UpstreamRejected {
        status: 401,
        body: "super secret upstream detail".into(),
    });
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let response = server
        .post("/v1/text")
        .json(&fixtures::text_request(3, 3, "hi"))
        .await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    let body: Value = response.json();
    assert_eq!(body["code"], "UP_002");
    let message = body["error"].as_str().unwrap();
    assert!(!message.contains("secret"), "raw body must never leak");
    assert!(message.contains("not authorized"));
}

#[tokio::test]
async fn empty_upstream_answer_maps_to_502() {
    let ctx = TestContext::new();
    ctx.mock_upstream.push_failure(Error::EmptyResponse);
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let response = server
        .post("/v1/text")
        .json(&fixtures::text_request(4, 4, "hi"))
        .await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    let body: Value = response.json();
    assert_eq!(body["code"], "UP_004");
}

#[tokio::test]
async fn empty_text_is_a_validation_error() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let response = server
        .post("/v1/text")
        .json(&fixtures::text_request(5, 5, ""))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "REQ_001");
}

#[tokio::test]
async fn invalid_base64_is_a_validation_error() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let mut request = fixtures::image_request(6, 6, 60, None);
    request["data_base64"] = Value::String("!!! not base64 !!!".into());

    let response = server.post("/v1/image").json(&request).await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn navigating_an_unknown_message_is_404() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let response = server
        .post("/v1/pages/navigate")
        .json(&fixtures::navigate_request(9, 9, "next"))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["code"], "PAGE_002");
}

#[tokio::test]
async fn navigating_past_the_last_page_is_409() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    server
        .post("/v1/pages/register")
        .json(&serde_json::json!({
            "chat_id": 9,
            "message_id": 90,
            "pages": ["a", "b"],
        }))
        .await
        .assert_status_ok();

    server
        .post("/v1/pages/navigate")
        .json(&fixtures::navigate_request(9, 90, "next"))
        .await
        .assert_status_ok();

    let response = server
        .post("/v1/pages/navigate")
        .json(&fixtures::navigate_request(9, 90, "next"))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["code"], "PAGE_001");
}

#[tokio::test]
async fn admin_routes_reject_unlisted_callers() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    // No header at all.
    let response = server.get("/admin/stats").await;
    response.assert_status(StatusCode::FORBIDDEN);

    // A caller outside the allowlist.
    let response = server
        .get("/admin/stats")
        .add_header("X-Admin-Id", "123")
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["code"], "ADMIN_001");
}
