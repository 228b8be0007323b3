//! Router for the chat API

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Router,
    body::{Body, Bytes},
    extract::State,
    http::{StatusCode, header},
    response::Response,
    routing::post,
};

use super::validate::parse_chat_request;
use crate::api::public::ApiError;
use crate::api::state::AppState;
use crate::openai::{completion_stream, latest_user_message, relay_response, with_system_context};
use crate::search::{search_context, web_search};

type SharedState = Arc<AppState>;

/// Everything up to the first byte of the response. Any error here is
/// reported as a JSON envelope; nothing has been streamed yet.
async fn open_relay(state: &AppState, body: &[u8]) -> Result<Response> {
    let credentials = state.config.credentials()?;
    let messages = parse_chat_request(body)?;

    // Validation guarantees at least one user message
    let query = latest_user_message(&messages)
        .map(|m| m.content.clone())
        .unwrap_or_default();

    tracing::debug!("Searching the web for: {}", query);
    let results = web_search(
        &state.http,
        &state.config,
        &credentials.search_api_key,
        &query,
    )
    .await?;
    let context = search_context(&state.config.system_message, &results);
    let messages = with_system_context(messages, &context);

    tracing::info!("Opening completion stream with {} messages", messages.len());
    let upstream = completion_stream(
        &state.http,
        &state.config,
        &credentials.openai_api_key,
        &messages,
    )
    .await?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream; charset=utf-8")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(relay_response(upstream)))
        .context("Failed to build stream response")
}

/// Relay a streamed completion for the posted conversation
async fn chat_handler(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let expose_details = state.config.expose_error_details;
    open_relay(&state, &body)
        .await
        .map_err(|e| ApiError::from(e).with_details(expose_details))
}

/// Create the chat router
pub fn router() -> Router<SharedState> {
    Router::new().route("/", post(chat_handler))
}
