//! Shared helpers for Gemini mock-server tests.

use std::time::Duration;

use ankit_gemini::{GeminiClient, RetryPolicy};
use wiremock::{MockServer, ResponseTemplate};

pub const TEST_KEY: &str = "AIzaSyTEST0000000000000000000000000000";

/// Start a mock server and a client pointed at it, with a fast retry backoff.
pub async fn setup() -> (MockServer, GeminiClient) {
    let server = MockServer::start().await;
    let client = GeminiClient::builder()
        .base_url(server.uri())
        .api_key(TEST_KEY)
        .retry(RetryPolicy {
            max_retries: 1,
            backoff: Duration::from_millis(5),
        })
        .build();
    (server, client)
}

/// A successful generateContent response carrying `text`.
pub fn text_response(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }]
    }))
}

/// An API error response in Google's error envelope.
pub fn error_response(status: u16, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(serde_json::json!({
        "error": {"code": status, "message": message, "status": "ERROR"}
    }))
}
