//! Final answer normalization.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// The final answer of a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AssistantReply {
    /// The model answered with a JSON object.
    Structured(Map<String, JsonValue>),
    /// Any other answer, verbatim.
    Text(String),
}

impl AssistantReply {
    /// Normalizes the model's final text.
    ///
    /// Content that parses as a JSON object becomes structured; anything
    /// else, including JSON arrays and scalars, is returned unchanged.
    #[must_use]
    pub fn normalize(content: &str) -> Self {
        match serde_json::from_str::<JsonValue>(content.trim()) {
            Ok(JsonValue::Object(map)) => Self::Structured(map),
            _ => Self::Text(content.to_string()),
        }
    }

    /// Returns the text, if this is a text answer.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Structured(_) => None,
        }
    }

    /// Returns the object, if this is a structured answer.
    #[must_use]
    pub fn as_object(&self) -> Option<&Map<String, JsonValue>> {
        match self {
            Self::Structured(map) => Some(map),
            Self::Text(_) => None,
        }
    }
}
