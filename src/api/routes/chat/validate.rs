//! Validation of inbound chat requests.
//!
//! The body is checked by hand rather than through a typed extractor so
//! every violation is reported the same way, as a `Validation` error.

use serde_json::Value;

use crate::core::RelayError;
use crate::openai::{Message, Role};

fn invalid(reason: impl Into<String>) -> RelayError {
    RelayError::Validation(reason.into())
}

/// Parse and validate a `{ messages: [...] }` body. Message contents
/// are returned trimmed.
pub fn parse_chat_request(body: &[u8]) -> Result<Vec<Message>, RelayError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| invalid(format!("request body is not valid JSON: {}", e)))?;
    let fields = value
        .as_object()
        .ok_or_else(|| invalid("request body must be a JSON object"))?;
    let raw_messages = fields
        .get("messages")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("`messages` must be an array"))?;

    if raw_messages.is_empty() {
        return Err(invalid("`messages` must not be empty"));
    }

    let messages = raw_messages
        .iter()
        .enumerate()
        .map(|(index, raw)| parse_message(index, raw))
        .collect::<Result<Vec<_>, _>>()?;

    if !messages.iter().any(|m| m.role == Role::User) {
        return Err(invalid("`messages` must include a user message"));
    }

    Ok(messages)
}

fn parse_message(index: usize, raw: &Value) -> Result<Message, RelayError> {
    let fields = raw
        .as_object()
        .ok_or_else(|| invalid(format!("messages[{}] must be an object", index)))?;

    let role = fields
        .get("role")
        .and_then(Value::as_str)
        .filter(|r| !r.is_empty())
        .ok_or_else(|| invalid(format!("messages[{}].role must be a non-empty string", index)))?;
    let role = Role::parse(role).ok_or_else(|| {
        invalid(format!(
            "messages[{}].role must be one of user, assistant, system (got {:?})",
            index, role
        ))
    })?;

    let content = fields
        .get("content")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| {
            invalid(format!(
                "messages[{}].content must be a non-empty string",
                index
            ))
        })?;

    Ok(Message::new(role, content))
}
