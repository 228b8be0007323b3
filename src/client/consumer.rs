//! Client side of the relay: turns the re-framed SSE stream back into
//! display text as it arrives.

use std::fmt::Display;
use std::pin::pin;

use anyhow::{Result, anyhow};
use bytes::Bytes;
use futures::Stream;
use futures_util::StreamExt;
use uuid::Uuid;

use crate::api::public::chat::ChatRequest;
use crate::openai::Message;
use crate::sse::{DONE, LineBuffer, SseLine, classify};

fn is_word_char(c: Option<char>) -> bool {
    c.is_some_and(|c| c.is_ascii_alphanumeric())
}

/// Append `token` to `text`, inserting a single space only when both
/// sides of the boundary are ASCII letters or digits. Punctuation never
/// gets a space on either side.
pub fn join(text: &str, token: &str) -> String {
    let mut out = text.to_string();
    push_token(&mut out, token);
    out
}

fn push_token(text: &mut String, token: &str) {
    if is_word_char(text.chars().last()) && is_word_char(token.chars().next()) {
        text.push(' ');
    }
    text.push_str(token);
}

/// Display buffer for the response currently being streamed.
///
/// The buffer belongs to one response at a time, identified by the id
/// handed out from `begin`.
#[derive(Debug, Default)]
pub struct Reconstruction {
    response_id: Option<Uuid>,
    text: String,
}

impl Reconstruction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand the buffer to a new response. A response that was still
    /// writing into it is abandoned.
    pub fn begin(&mut self) -> Uuid {
        if let Some(previous) = self.response_id.take() {
            tracing::warn!("Abandoning in-flight response {}", previous);
        }
        let id = Uuid::new_v4();
        self.response_id = Some(id);
        self.text.clear();
        id
    }

    pub fn active(&self) -> Option<Uuid> {
        self.response_id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn append(&mut self, token: &str) {
        push_token(&mut self.text, token);
    }

    /// Release the buffer, returning the finished text.
    pub fn complete(&mut self) -> String {
        self.response_id = None;
        std::mem::take(&mut self.text)
    }
}

/// Read an SSE body into `buffer`, calling `publish` with the current
/// text after every change. Returns the final text once the stream
/// ends; a read error ends it early with whatever arrived so far.
pub async fn consume<S, E, F>(buffer: &mut Reconstruction, body: S, mut publish: F) -> String
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
    F: FnMut(&str),
{
    let id = buffer.begin();
    publish(buffer.text());

    let mut body = pin!(body);
    let mut lines = LineBuffer::new();

    while let Some(chunk) = body.next().await {
        let bytes = match chunk {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!("Reading response {} failed: {}", id, e);
                break;
            }
        };

        for line in lines.push(&bytes) {
            let SseLine::Data(payload) = classify(&line) else {
                continue;
            };
            // The end of the stream is what finishes the response
            if payload == DONE {
                continue;
            }
            buffer.append(payload);
            publish(buffer.text());
        }
    }

    let text = buffer.complete();
    publish(buffer.text());
    text
}

/// Send the conversation to a relay endpoint and stream the reply into
/// `buffer`.
pub async fn stream_chat<F>(
    client: &reqwest::Client,
    url: &str,
    messages: &[Message],
    buffer: &mut Reconstruction,
    publish: F,
) -> Result<String>
where
    F: FnMut(&str),
{
    let response = client
        .post(url)
        .json(&ChatRequest {
            messages: messages.to_vec(),
        })
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(anyhow!("Chat request failed with {}: {}", status, body));
    }

    Ok(consume(buffer, response.bytes_stream(), publish).await)
}
