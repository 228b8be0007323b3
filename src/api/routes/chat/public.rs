//! Public types for the chat API
use serde::{Deserialize, Serialize};

use crate::openai::Message;

/// Body of `POST /api/chat`. The server validates the raw JSON by hand
/// so this type is what well-behaved clients send.
#[derive(Serialize, Deserialize, Debug)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
}
