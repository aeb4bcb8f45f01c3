use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::Message;

/// Maximum number of characters kept when deriving a title.
pub const TITLE_MAX_CHARS: usize = 50;

/// Title used when a conversation has no usable user message.
pub const DEFAULT_TITLE: &str = "New Chat";

/// Title shown for stored sessions whose title is empty.
pub const UNTITLED: &str = "Untitled Chat";

/// A durable, titled conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    /// Unique identifier, assigned when the session is first persisted.
    pub id: String,

    /// Title derived from the first user message.
    #[serde(default)]
    pub title: String,

    /// When the session was first persisted.
    #[serde(rename = "timestamp", with = "crate::utils::time")]
    pub created_at: OffsetDateTime,

    /// The conversation so far.
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Session {
    /// Returns the title for display, falling back for empty titles.
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            UNTITLED
        } else {
            &self.title
        }
    }
}

/// Derives a session title from the first user message.
///
/// The title is the first [`TITLE_MAX_CHARS`] characters of that message, or
/// [`DEFAULT_TITLE`] when there is no user message or it is empty.
pub fn derive_title(messages: &[Message]) -> String {
    let title: String = messages
        .iter()
        .find(|m| m.is_user())
        .map(|m| m.content.chars().take(TITLE_MAX_CHARS).collect())
        .unwrap_or_default();
    if title.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        title
    }
}
