//! Error types for the assistants crate.

use brigade_conversation::{AssistantError, HandlerError, ThreadStoreError};
use std::fmt;

/// Errors raised by the restaurant domain services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// No record with this id in the restaurant.
    NotFound { entity: &'static str, id: String },
    /// The change clashes with existing data.
    Conflict { reason: String },
    /// The input is not acceptable.
    Invalid { reason: String },
    /// The backing service could not be reached.
    Unavailable { reason: String },
}

impl DomainError {
    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Creates a conflict error.
    #[must_use]
    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict {
            reason: reason.into(),
        }
    }

    /// Creates an invalid-input error.
    #[must_use]
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { entity, id } => write!(f, "{entity} '{id}' not found"),
            Self::Conflict { reason } => write!(f, "conflict: {reason}"),
            Self::Invalid { reason } => write!(f, "invalid input: {reason}"),
            Self::Unavailable { reason } => write!(f, "service unavailable: {reason}"),
        }
    }
}

impl std::error::Error for DomainError {}

impl From<DomainError> for HandlerError {
    fn from(e: DomainError) -> Self {
        Self::new(e.to_string())
    }
}

/// The assistant kind in a request path is not known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAssistantKind {
    /// The rejected value.
    pub kind: String,
}

impl fmt::Display for UnknownAssistantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown assistant kind '{}'", self.kind)
    }
}

impl std::error::Error for UnknownAssistantKind {}

/// Errors from the assistant hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    /// The turn failed.
    Assistant(AssistantError),
    /// Thread history could not be read or reset.
    ThreadStore(ThreadStoreError),
}

impl fmt::Display for HubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Assistant(e) => write!(f, "{e}"),
            Self::ThreadStore(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for HubError {}

impl From<AssistantError> for HubError {
    fn from(e: AssistantError) -> Self {
        Self::Assistant(e)
    }
}

impl From<ThreadStoreError> for HubError {
    fn from(e: ThreadStoreError) -> Self {
        Self::ThreadStore(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_read_well_for_the_model() {
        let err: HandlerError = DomainError::not_found("staff member", "01ABC").into();
        assert_eq!(err.message(), "staff member '01ABC' not found");

        let err: HandlerError = DomainError::conflict("table 4 is already allocated").into();
        assert!(err.message().contains("table 4"));
    }
}
