//! Tests for image generation calls against a mock Gemini API.

mod common;

use ankit_gemini::{Error, GenerateRequest, ImagePart};
use common::{TEST_KEY, error_response, setup, text_response};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];
const GENERATE_PATH: &str = "/models/gemini-2.5-flash:generateContent";

#[tokio::test]
async fn test_generate_returns_text() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(header("x-goog-api-key", TEST_KEY))
        .respond_with(text_response("Cells | Question? | A;B | A | note"))
        .expect(1)
        .mount(&server)
        .await;

    let text = client
        .generate(GenerateRequest::new("prompt").image(ImagePart::new(PNG, "image/png")))
        .await
        .unwrap();
    assert_eq!(text, "Cells | Question? | A;B | A | note");
}

#[tokio::test]
async fn test_context_is_sent_before_target_image() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(text_response("ok"))
        .mount(&server)
        .await;

    client
        .generate(
            GenerateRequest::new("prompt")
                .context(Some("Previous subtopic: Cells"))
                .image(ImagePart::new(PNG, "image/png")),
        )
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let parts = body["contents"][0]["parts"].as_array().unwrap();
    assert_eq!(parts.len(), 5);
    assert_eq!(parts[0]["text"], "prompt");
    assert_eq!(parts[1]["text"], "--- CONTEXT ONLY (Previous Page) ---");
    assert_eq!(parts[2]["text"], "Previous subtopic: Cells");
    assert_eq!(parts[3]["text"], "--- TARGET IMAGE (Generate Cards) ---");
    assert_eq!(parts[4]["inlineData"]["mimeType"], "image/png");
}

#[tokio::test]
async fn test_request_model_overrides_default() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash:generateContent"))
        .respond_with(text_response("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let text = client
        .generate(GenerateRequest::new("prompt").model("gemini-2.0-flash"))
        .await
        .unwrap();
    assert_eq!(text, "ok");
}

#[tokio::test]
async fn test_transient_error_is_retried_once() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(error_response(503, "overloaded"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(text_response("recovered"))
        .expect(1)
        .mount(&server)
        .await;

    let text = client.generate(GenerateRequest::new("prompt")).await.unwrap();
    assert_eq!(text, "recovered");
}

#[tokio::test]
async fn test_transient_error_surfaces_after_retry() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(error_response(500, "internal"))
        .expect(2)
        .mount(&server)
        .await;

    let err = client.generate(GenerateRequest::new("prompt")).await.unwrap_err();
    assert!(matches!(err, Error::Server { status: 500, .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_rate_limit_is_retried() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(error_response(429, "quota"))
        .expect(2)
        .mount(&server)
        .await;

    let err = client.generate(GenerateRequest::new("prompt")).await.unwrap_err();
    assert!(matches!(err, Error::RateLimited(ref m) if m == "quota"));
}

#[tokio::test]
async fn test_auth_error_is_not_retried() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(error_response(403, "API key not valid"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.generate(GenerateRequest::new("prompt")).await.unwrap_err();
    assert!(err.is_auth());
    assert!(matches!(err, Error::Auth { status: 403, ref message } if message == "API key not valid"));
}

#[tokio::test]
async fn test_unknown_model_is_bad_request() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(error_response(404, "model not found"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.generate(GenerateRequest::new("prompt")).await.unwrap_err();
    assert!(matches!(err, Error::BadRequest { status: 404, .. }));
}

#[tokio::test]
async fn test_no_candidates_is_empty_response() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"candidates": []})))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.generate(GenerateRequest::new("prompt")).await.unwrap_err();
    assert!(matches!(err, Error::EmptyResponse));
}

#[tokio::test]
async fn test_whitespace_text_is_empty_response() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(text_response("  \n "))
        .mount(&server)
        .await;

    let err = client.generate(GenerateRequest::new("prompt")).await.unwrap_err();
    assert!(matches!(err, Error::EmptyResponse));
}

#[tokio::test]
async fn test_safety_block_is_reported() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "candidates": [{"finishReason": "SAFETY"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.generate(GenerateRequest::new("prompt")).await.unwrap_err();
    assert!(matches!(err, Error::Blocked(ref r) if r == "SAFETY"));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_connection_sends_hello() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(text_response("Hi there"))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(client.test_connection().await.unwrap(), "Hi there");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["contents"][0]["parts"][0]["text"], "Hello");
}
