use serde::{Deserialize, Serialize};

use crate::catalog::Provider;
use crate::types::{Message, Role};

/// A message as sent to the completion backend.
///
/// Only role and content travel over the wire; the model tag stays local.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WireMessage {
    /// The role of the message.
    pub role: Role,

    /// The text of the message.
    pub content: String,
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// Body of `POST /chat`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRequest {
    /// The full conversation, ending with the newest user message.
    pub messages: Vec<WireMessage>,

    /// Provider the backend should route to.
    pub provider: Provider,

    /// Model identifier within the provider.
    pub model: String,
}

impl ChatRequest {
    /// Builds a request from the transient conversation and current selection.
    pub fn new(messages: &[Message], provider: Provider, model: impl Into<String>) -> Self {
        Self {
            messages: messages.iter().map(WireMessage::from).collect(),
            provider,
            model: model.into(),
        }
    }
}
