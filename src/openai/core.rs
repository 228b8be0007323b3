use reqwest::Response;
use serde::{Deserialize, Serialize};

use crate::core::{AppConfig, RelayError, fetch_with_retry, sanitize};

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum Role {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "user")]
    User,
}

impl Role {
    pub fn parse(role: &str) -> Option<Self> {
        match role {
            "system" => Some(Role::System),
            "assistant" => Some(Role::Assistant),
            "user" => Some(Role::User),
            _ => None,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Self {
        Message {
            role,
            content: content.to_string(),
        }
    }
}

/// Install `context` as the only system message, at the front of the
/// conversation. Earlier system messages are replaced rather than kept.
pub fn with_system_context(messages: Vec<Message>, context: &str) -> Vec<Message> {
    let mut out = Vec::with_capacity(messages.len() + 1);
    out.push(Message::new(Role::System, context));
    out.extend(messages.into_iter().filter(|m| m.role != Role::System));
    out
}

pub fn latest_user_message(messages: &[Message]) -> Option<&Message> {
    messages.iter().rev().find(|m| m.role == Role::User)
}

/// Body of a streaming chat completion request. Message contents are
/// sanitized on the way out.
#[derive(Serialize, Debug)]
pub struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    temperature: f64,
    top_p: f64,
    top_k: u32,
    stream: bool,
}

impl<'a> CompletionRequest<'a> {
    pub fn new(model: &'a str, messages: &[Message]) -> Self {
        let messages = messages
            .iter()
            .map(|m| Message::new(m.role.clone(), &sanitize(&m.content)))
            .collect();
        Self {
            model,
            messages,
            temperature: 0.7,
            top_p: 0.95,
            top_k: 50,
            stream: true,
        }
    }
}

/// Open a streaming completion. Returns once the provider has answered
/// with a success status; the body has not been read yet.
pub async fn completion_stream(
    client: &reqwest::Client,
    config: &AppConfig,
    api_key: &str,
    messages: &[Message],
) -> Result<Response, RelayError> {
    let payload = CompletionRequest::new(&config.openai_model, messages);
    let url = format!(
        "{}/v1/chat/completions",
        config.openai_api_hostname.trim_end_matches("/")
    );

    // No request timeout: it would also cut off a long-running body
    fetch_with_retry("completion provider", &config.retry, || {
        client
            .post(&url)
            .bearer_auth(api_key)
            .header("Content-Type", "application/json")
            .json(&payload)
    })
    .await
}
