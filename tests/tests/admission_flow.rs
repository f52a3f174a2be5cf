//! Service-level admission properties.
//!
//! These drive the relay service directly (no HTTP) to pin down the
//! single-flight and rate-limit guarantees under realistic interleavings.

use std::time::Duration;

use integration_tests::setup::TestContext;
use relay_core::{Error, ImageJob, ImagePayload};

fn test_image_job(user_id: i64, message_id: i64) -> ImageJob {
    ImageJob::new(
        user_id,
        user_id,
        message_id,
        "file-1",
        Some("what is this?".into()),
        ImagePayload::new(vec![0xFF, 0xD8], "image/jpeg"),
    )
}

#[tokio::test]
async fn text_then_image_rejects_the_second_as_busy() {
    let ctx = TestContext::new();
    ctx.mock_upstream.set_delay(Duration::from_millis(200));

    let service = ctx.service.clone();
    let first = tokio::spawn(async move {
        service.submit_text(1, 1, "long question".into(), None).await
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The text request is still in flight: the image must bounce, and the
    // registry must show exactly one active entry for the user.
    let err = ctx
        .service
        .submit_image(test_image_job(1, 10), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyBusy));
    assert_eq!(ctx.service.stats().active_flights, 1);

    assert!(first.await.unwrap().is_ok());
    assert_eq!(ctx.service.stats().active_flights, 0);
}

#[tokio::test]
async fn image_then_text_rejects_the_second_as_busy() {
    let ctx = TestContext::new();
    ctx.mock_upstream.set_delay(Duration::from_millis(200));

    let service = ctx.service.clone();
    let first =
        tokio::spawn(async move { service.submit_image(test_image_job(2, 11), None).await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = ctx
        .service
        .submit_text(2, 2, "hello?".into(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyBusy));

    assert!(first.await.unwrap().is_ok());
}

#[tokio::test]
async fn back_to_back_requests_never_overlap_per_user() {
    let ctx = TestContext::new();
    ctx.mock_upstream.set_delay(Duration::from_millis(100));

    let mut handles = Vec::new();
    for _ in 0..5 {
        let service = ctx.service.clone();
        handles.push(tokio::spawn(async move {
            service.submit_text(7, 7, "spam".into(), None).await
        }));
    }

    let mut ok = 0;
    let mut busy = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(Error::AlreadyBusy) => busy += 1,
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    // Exactly one winner per burst; the gate never held two at once.
    assert_eq!(ok, 1);
    assert_eq!(busy, 4);
    assert_eq!(ctx.service.stats().active_flights, 0);
}

#[tokio::test]
async fn sequential_requests_reuse_the_slot() {
    let ctx = TestContext::new();

    for i in 0..3 {
        let reply = ctx
            .service
            .submit_text(3, 3, format!("question {}", i), None)
            .await
            .unwrap();
        assert_eq!(reply.first_page(), "The answer is 42.");
    }
    assert_eq!(ctx.mock_upstream.call_count(), 3);
}

#[tokio::test]
async fn thirty_first_text_in_a_window_is_rate_limited() {
    let ctx = TestContext::new();

    for i in 0..30 {
        ctx.service
            .submit_text(4, 4, format!("message {}", i), None)
            .await
            .unwrap_or_else(|e| panic!("call {} unexpectedly failed: {:?}", i, e));
    }

    let err = ctx
        .service
        .submit_text(4, 4, "one too many".into(), None)
        .await
        .unwrap_err();
    match err {
        Error::RateLimited {
            retry_after,
            blocked_for,
        } => {
            // Text rule blocks for 300s once exhausted.
            let blocked = blocked_for.expect("text rule defines a block");
            assert!(blocked > Duration::from_secs(295) && blocked <= Duration::from_secs(300));
            assert!(retry_after > Duration::from_secs(295));
        }
        other => panic!("unexpected error: {:?}", other),
    }

    // The rejected call never reached the upstream.
    assert_eq!(ctx.mock_upstream.call_count(), 30);
}

#[tokio::test]
async fn vip_bypasses_rate_limits() {
    let ctx = TestContext::new();
    ctx.service.add_vip(5);

    for i in 0..40 {
        ctx.service
            .submit_text(5, 5, format!("vip message {}", i), None)
            .await
            .unwrap_or_else(|e| panic!("VIP call {} rejected: {:?}", i, e));
    }
}

#[tokio::test]
async fn upstream_failure_frees_the_flight_slot() {
    let ctx = TestContext::new();
    ctx.mock_upstream.push_failure(Error::UpstreamRejected {
        status: 400,
        body: "bad".into(),
    });

    let err = ctx
        .service
        .submit_text(6, 6, "boom".into(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UpstreamRejected { .. }));

    // The slot must be free again immediately.
    let reply = ctx
        .service
        .submit_text(6, 6, "retry".into(), None)
        .await
        .unwrap();
    assert!(!reply.pages.is_empty());
}

#[tokio::test]
async fn admin_release_unsticks_a_user() {
    let ctx = TestContext::new();
    ctx.mock_upstream.set_delay(Duration::from_millis(300));

    let service = ctx.service.clone();
    let stuck = tokio::spawn(async move {
        service.submit_text(8, 8, "slow one".into(), None).await
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(ctx.service.release_flight(8));

    // With the slot force-cleared, a new request is admitted even though
    // the first is still running.
    let reply = ctx
        .service
        .submit_text(8, 8, "second".into(), None)
        .await
        .unwrap();
    assert!(!reply.pages.is_empty());

    let _ = stuck.await.unwrap();
}
