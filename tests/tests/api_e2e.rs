//! End-to-end tests over the HTTP surface.

use axum_test::TestServer;
use serde_json::Value;

use integration_tests::{fixtures, setup::TestContext};

#[tokio::test]
async fn text_happy_path_returns_the_answer() {
    let ctx = TestContext::new();
    ctx.mock_upstream.set_answer("Hello from the relay!");
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let response = server
        .post("/v1/text")
        .json(&fixtures::text_request(1, 1, "hi"))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["text"], "Hello from the relay!");
    assert_eq!(body["page_count"], 1);
    assert!(body.get("pages").is_none(), "single page has no pages array");
}

#[tokio::test]
async fn requests_carry_the_configured_model() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    server
        .post("/v1/text")
        .json(&fixtures::text_request(1, 1, "hi"))
        .await
        .assert_status_ok();

    let calls = ctx.mock_upstream.captured_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1, "test-model");
}

#[tokio::test]
async fn long_answers_paginate_and_navigate() {
    let ctx = TestContext::builder().max_page_chars(120).build();
    ctx.mock_upstream.set_answer(fixtures::long_answer(6, 10));
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let response = server
        .post("/v1/text")
        .json(&fixtures::text_request(1, 1, "tell me everything"))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    let page_count = body["page_count"].as_u64().expect("page_count");
    assert!(page_count > 1, "answer must span multiple pages");
    let pages = body["pages"].as_array().expect("pages array").clone();

    // The transport delivered message 77; register its pages and page
    // through them.
    let register = server
        .post("/v1/pages/register")
        .json(&serde_json::json!({
            "chat_id": 1,
            "message_id": 77,
            "pages": pages,
        }))
        .await;
    register.assert_status_ok();
    let tracked: Value = register.json();
    assert_eq!(tracked["tracked"], true);

    let nav = server
        .post("/v1/pages/navigate")
        .json(&fixtures::navigate_request(1, 77, "next"))
        .await;
    nav.assert_status_ok();
    let view: Value = nav.json();
    assert_eq!(view["index"], 1);
    assert_eq!(view["count"], page_count);
    assert_eq!(view["text"], pages[1]);
}

#[tokio::test]
async fn image_happy_path_runs_through_the_pipeline() {
    let ctx = TestContext::new();
    ctx.mock_upstream.set_answer("A photo of a red bicycle.");
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let response = server
        .post("/v1/image")
        .json(&fixtures::image_request(2, 2, 20, Some("what is this?")))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["text"], "A photo of a red bicycle.");

    // The pipeline drained and counted the settlement.
    let stats = ctx.service.stats();
    assert_eq!(stats.tracked_jobs, 0);
    assert_eq!(stats.pipeline.succeeded, 1);
}

#[tokio::test]
async fn image_conversation_carries_caption_and_data_url() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    server
        .post("/v1/image")
        .json(&fixtures::image_request(2, 2, 21, Some("what breed?")))
        .await
        .assert_status_ok();

    let calls = ctx.mock_upstream.captured_calls();
    assert_eq!(calls.len(), 1);
    let serialized = serde_json::to_string(&calls[0].0).unwrap();
    assert!(serialized.contains("what breed?"));
    assert!(serialized.contains("data:image/jpeg;base64,"));
}

#[tokio::test]
async fn admin_stats_reports_engine_state() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    server
        .post("/v1/text")
        .json(&fixtures::text_request(1, 1, "hi"))
        .await
        .assert_status_ok();

    let response = server
        .get("/admin/stats")
        .add_header("X-Admin-Id", "999")
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["active_flights"], 0);
    assert_eq!(body["tracked_jobs"], 0);
    assert!(body["metrics"]["requests_received"].as_u64().is_some());
}

#[tokio::test]
async fn admin_vip_flow_exempts_a_user() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let response = server
        .post("/admin/vip")
        .add_header("X-Admin-Id", "999")
        .json(&serde_json::json!({"user_id": 42}))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["changed"], true);

    // 31 rapid texts: without VIP the 31st would be rejected.
    for i in 0..31 {
        server
            .post("/v1/text")
            .json(&fixtures::text_request(42, 42, &format!("m{}", i)))
            .await
            .assert_status_ok();
    }
}

#[tokio::test]
async fn health_endpoints_respond() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert!(body["pipeline_accepting"].as_bool().unwrap());

    server.get("/health/live").await.assert_status_ok();
}

#[tokio::test]
async fn action_check_allows_light_actions() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let response = server
        .post("/v1/actions/check")
        .json(&serde_json::json!({"user_id": 3, "kind": "settings"}))
        .await;
    response.assert_status(axum::http::StatusCode::NO_CONTENT);
}
