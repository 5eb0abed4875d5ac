//! Conversation engine limits.

use crate::router::DEFAULT_MAX_ITERATIONS;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Limits applied to every turn.
///
/// Timeouts are configured in whole seconds; the builders accept any
/// non-zero [`Duration`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationConfig {
    /// Maximum model round trips per turn.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Budget for one model call.
    #[serde(
        rename = "model_timeout_seconds",
        with = "whole_seconds",
        default = "default_model_timeout"
    )]
    model_timeout: Duration,
    /// Budget for one tool call.
    #[serde(
        rename = "tool_timeout_seconds",
        with = "whole_seconds",
        default = "default_tool_timeout"
    )]
    tool_timeout: Duration,
    /// Budget for a whole turn, including waiting for the thread lock.
    #[serde(
        rename = "turn_timeout_seconds",
        with = "whole_seconds",
        default = "default_turn_timeout"
    )]
    turn_timeout: Duration,
}

mod whole_seconds {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        match u64::deserialize(deserializer)? {
            0 => Err(D::Error::custom("timeout must be at least one second")),
            secs => Ok(Duration::from_secs(secs)),
        }
    }
}

fn default_max_iterations() -> u32 {
    DEFAULT_MAX_ITERATIONS
}

fn default_model_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_tool_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_turn_timeout() -> Duration {
    Duration::from_secs(180)
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            model_timeout: default_model_timeout(),
            tool_timeout: default_tool_timeout(),
            turn_timeout: default_turn_timeout(),
        }
    }
}

// A zero budget would fail every call before it starts.
fn non_zero(timeout: Duration) -> Duration {
    timeout.max(Duration::from_millis(1))
}

impl ConversationConfig {
    /// Sets the round-trip cap.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the per-tool timeout.
    #[must_use]
    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = non_zero(timeout);
        self
    }

    /// Sets the per-model-call timeout.
    #[must_use]
    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = non_zero(timeout);
        self
    }

    /// Sets the whole-turn timeout.
    #[must_use]
    pub fn with_turn_timeout(mut self, timeout: Duration) -> Self {
        self.turn_timeout = non_zero(timeout);
        self
    }

    /// Returns the model call timeout.
    #[must_use]
    pub fn model_timeout(&self) -> Duration {
        self.model_timeout
    }

    /// Returns the tool call timeout.
    #[must_use]
    pub fn tool_timeout(&self) -> Duration {
        self.tool_timeout
    }

    /// Returns the turn timeout.
    #[must_use]
    pub fn turn_timeout(&self) -> Duration {
        self.turn_timeout
    }
}
