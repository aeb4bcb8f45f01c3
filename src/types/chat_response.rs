use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Body returned by `POST /chat`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatResponse {
    /// The complete assistant reply.
    pub response: String,
}

impl ChatResponse {
    /// Parses and validates a response body.
    ///
    /// Anything other than a JSON object with a string `response` field is a
    /// serialization error.
    pub fn from_body(body: &str) -> Result<Self> {
        serde_json::from_str(body).map_err(|e| {
            Error::serialization(
                format!("Failed to parse response: {e}"),
                Some(Box::new(e)),
            )
        })
    }
}
