//! Test utilities for integration tests
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{Router, body::Body};

use relay::api::AppState;
use relay::api::app;
use relay::core::{AppConfig, RetryPolicy};

pub const SEARCH_RESULTS: &str =
    r#"{"results":[{"title":"Async Rust","url":"https://example.com/async"}]}"#;

/// Configuration pointing both providers at `server_url`, with fake
/// credentials and near-instant retries.
pub fn test_config(server_url: &str) -> AppConfig {
    AppConfig {
        openai_api_hostname: server_url.to_string(),
        openai_api_key: Some(String::from("test-api-key")),
        openai_model: String::from("gpt-4o"),
        search_api_url: format!("{}/search", server_url),
        search_api_key: Some(String::from("test-search-key")),
        system_message: String::from("You are a helpful assistant."),
        expose_error_details: true,
        retry: RetryPolicy {
            max_retries: 1,
            initial_delay: Duration::from_millis(1),
            retry_window: None,
        },
    }
}

/// Creates a test application router for the given configuration
pub fn test_app(config: AppConfig) -> Router {
    app(Arc::new(AppState::new(config)))
}

/// Upstream completion chunk carrying `content` as its delta
pub fn completion_chunk(content: &str) -> String {
    serde_json::json!({
        "id": "chatcmpl-test",
        "object": "chat.completion.chunk",
        "created": 1694268190,
        "model": "gpt-4o",
        "choices": [{"index": 0, "delta": {"content": content}, "finish_reason": null}]
    })
    .to_string()
}

/// Upstream SSE body for the given deltas, terminated by `[DONE]`
pub fn completion_body(deltas: &[&str]) -> String {
    let mut body: String = deltas
        .iter()
        .map(|d| format!("data: {}\n\n", completion_chunk(d)))
        .collect();
    body.push_str("data: [DONE]\n\n");
    body
}

pub async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Failed to read body");
    String::from_utf8(bytes.to_vec()).expect("Body is not UTF-8")
}
