use crate::e2e::helpers;

use helpers::TestContext;
use hyper::StatusCode;
use test_context::test_context;

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_return_ok_for_health_check(ctx: &TestContext) {
    let response = ctx.client.get("/health").await.unwrap();

    response.assert_status(StatusCode::OK);

    // Health endpoint returns plain text
    let body = String::from_utf8(response.body_bytes.clone()).unwrap();
    assert_eq!(body, "OK");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_report_not_ready_when_database_is_unreachable(ctx: &TestContext) {
    let response = ctx.client.get("/health/ready").await.unwrap();

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);

    let body = response.body.as_ref().unwrap();
    assert_eq!(body.get("status").and_then(|v| v.as_str()), Some("not_ready"));
    assert_eq!(
        body.get("database").and_then(|v| v.as_str()),
        Some("disconnected")
    );
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_report_configured_tts_backends(ctx: &TestContext) {
    let response = ctx.client.get("/health/ready").await.unwrap();

    let tts = response.body.as_ref().unwrap().get("tts").unwrap();
    assert_eq!(
        tts.get("default_backend").and_then(|v| v.as_str()),
        Some("runpod")
    );
    assert_eq!(tts.get("runpod").and_then(|v| v.as_str()), Some("configured"));
    assert_eq!(tts.get("gemini").and_then(|v| v.as_str()), Some("configured"));
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_include_request_id_in_health_responses(ctx: &TestContext) {
    let response = ctx.client.get("/health").await.unwrap();
    response.assert_header_exists("x-request-id");

    let response = ctx.client.get("/health/ready").await.unwrap();
    response.assert_header_exists("x-request-id");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_handle_concurrent_health_checks(ctx: &TestContext) {
    let mut futures = Vec::new();
    for _ in 0..10 {
        let client = ctx.client.clone();
        futures.push(async move { client.get("/health").await });
    }

    let results = futures::future::join_all(futures).await;

    for result in results {
        let response = result.unwrap();
        response.assert_status(StatusCode::OK);
    }
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_echo_a_caller_supplied_request_id(ctx: &TestContext) {
    let response = ctx
        .client
        .get_with_request_id("/health", "scheduler-run-7")
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    assert_eq!(response.header("x-request-id"), Some("scheduler-run-7"));
}
