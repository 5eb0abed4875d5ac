//! Error types for the conversation crate.
//!
//! One enum per layer:
//! - `RegistryError`: tool registry misconfiguration (fatal at startup)
//! - `ToolError`: a single tool invocation failed (absorbed into the conversation)
//! - `HandlerError`: raised by domain handlers behind a tool
//! - `ThreadStoreError`: conversation memory persistence
//! - `AgentError`: one model invocation
//! - `TransitionError`: illegal turn state machine transition
//! - `AssistantError`: what `process_query` callers see

use crate::router::{TurnEvent, TurnState};
use crate::schema::FieldViolation;
use std::fmt;

/// Fixed answer shown to the end user when the model cannot be reached.
pub const UNAVAILABLE_MESSAGE: &str =
    "I'm unable to process your request at this time. Please try again later.";

/// Fixed answer shown to the end user when a turn hits the iteration cap.
pub const LOOP_LIMIT_MESSAGE: &str =
    "I couldn't complete this request. Please try rephrasing it or break it into smaller steps.";

/// Errors from tool registry configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A tool with this name is already registered.
    DuplicateTool { name: String },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateTool { name } => write!(f, "tool '{name}' is already registered"),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Error raised by a tool handler.
///
/// Carries a human-readable message that is shown to the model verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    /// Creates a handler error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HandlerError {}

impl From<serde_json::Error> for HandlerError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(format!("invalid arguments: {e}"))
    }
}

/// Errors from tool execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// Tool not found.
    NotFound { name: String },
    /// Arguments did not satisfy the input schema.
    InvalidArguments {
        name: String,
        violations: Vec<FieldViolation>,
    },
    /// The handler failed.
    ExecutionFailed { name: String, reason: String },
    /// The handler did not answer in time.
    Timeout { name: String, after_secs: u64 },
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { name } => write!(f, "tool not found: {name}"),
            Self::InvalidArguments { name, violations } => {
                write!(f, "invalid arguments for tool '{name}': ")?;
                for (i, violation) in violations.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    write!(f, "{violation}")?;
                }
                Ok(())
            }
            Self::ExecutionFailed { name, reason } => {
                write!(f, "tool '{name}' failed: {reason}")
            }
            Self::Timeout { name, after_secs } => {
                write!(f, "tool '{name}' timed out after {after_secs}s")
            }
        }
    }
}

impl std::error::Error for ToolError {}

/// Errors from thread store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadStoreError {
    /// Storage operation failed.
    StorageFailed { reason: String },
    /// Stored history could not be decoded.
    Corrupted { thread_id: String, reason: String },
}

impl fmt::Display for ThreadStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StorageFailed { reason } => write!(f, "thread storage failed: {reason}"),
            Self::Corrupted { thread_id, reason } => {
                write!(f, "thread '{thread_id}' history is corrupted: {reason}")
            }
        }
    }
}

impl std::error::Error for ThreadStoreError {}

/// Errors from a single agent step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    /// The model backend is missing, misconfigured, unreachable, or slow.
    ModelUnavailable { reason: String },
}

impl fmt::Display for AgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModelUnavailable { reason } => write!(f, "model unavailable: {reason}"),
        }
    }
}

impl std::error::Error for AgentError {}

/// An event arrived in a state that does not accept it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionError {
    /// State the router was in.
    pub from: TurnState,
    /// Event that was rejected.
    pub event: TurnEvent,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid turn transition: {:?} does not accept {:?}",
            self.from, self.event
        )
    }
}

impl std::error::Error for TransitionError {}

/// Errors returned to callers of the conversation controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssistantError {
    /// The user message was empty.
    EmptyMessage,
    /// The model could not be used; nothing was recorded for this turn.
    ModelUnavailable { reason: String },
    /// The turn reached the iteration cap.
    LoopLimitExceeded { limit: u32 },
    /// The turn as a whole ran out of time; nothing was recorded.
    TurnTimedOut { after_secs: u64 },
    /// Conversation memory could not be read or written.
    ThreadStore(ThreadStoreError),
    /// The turn state machine was driven incorrectly.
    InvalidTransition(TransitionError),
}

impl AssistantError {
    /// Returns the text safe to show to the end user.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::EmptyMessage => "Please enter a message.",
            Self::LoopLimitExceeded { .. } => LOOP_LIMIT_MESSAGE,
            Self::ModelUnavailable { .. }
            | Self::TurnTimedOut { .. }
            | Self::ThreadStore(_)
            | Self::InvalidTransition(_) => UNAVAILABLE_MESSAGE,
        }
    }
}

impl fmt::Display for AssistantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "user message is empty"),
            Self::ModelUnavailable { reason } => write!(f, "model unavailable: {reason}"),
            Self::LoopLimitExceeded { limit } => {
                write!(f, "turn exceeded the limit of {limit} model round-trips")
            }
            Self::TurnTimedOut { after_secs } => {
                write!(f, "turn timed out after {after_secs}s")
            }
            Self::ThreadStore(e) => write!(f, "thread store error: {e}"),
            Self::InvalidTransition(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for AssistantError {}

impl From<ThreadStoreError> for AssistantError {
    fn from(e: ThreadStoreError) -> Self {
        Self::ThreadStore(e)
    }
}

impl From<AgentError> for AssistantError {
    fn from(e: AgentError) -> Self {
        match e {
            AgentError::ModelUnavailable { reason } => Self::ModelUnavailable { reason },
        }
    }
}

impl From<TransitionError> for AssistantError {
    fn from(e: TransitionError) -> Self {
        Self::InvalidTransition(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Violation;

    #[test]
    fn invalid_arguments_lists_every_violation() {
        let err = ToolError::InvalidArguments {
            name: "createStaffMember".to_string(),
            violations: vec![
                FieldViolation::new("email", Violation::Missing),
                FieldViolation::new("tag", Violation::Unknown),
            ],
        };
        let text = err.to_string();
        assert!(text.contains("createStaffMember"));
        assert!(text.contains("`email`"));
        assert!(text.contains("`tag`"));
    }

    #[test]
    fn user_messages_hide_internals() {
        let err = AssistantError::ModelUnavailable {
            reason: "401 Unauthorized: bad key sk-123".to_string(),
        };
        assert_eq!(err.user_message(), UNAVAILABLE_MESSAGE);
        assert!(!err.user_message().contains("sk-123"));

        let err = AssistantError::LoopLimitExceeded { limit: 25 };
        assert_eq!(err.user_message(), LOOP_LIMIT_MESSAGE);
        assert!(err.to_string().contains("25"));
    }

    #[test]
    fn agent_error_converts_to_model_unavailable() {
        let err: AssistantError = AgentError::ModelUnavailable {
            reason: "timeout".to_string(),
        }
        .into();
        assert!(matches!(err, AssistantError::ModelUnavailable { .. }));
    }
}
