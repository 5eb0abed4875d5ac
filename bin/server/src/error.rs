//! Error types for the HTTP surface and server startup.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use brigade_assistants::{HubError, UnknownAssistantKind};
use brigade_conversation::AssistantError;
use brigade_core::ParseIdError;
use serde_json::json;
use std::fmt;

/// Request failures, rendered as `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    /// The assistant kind in the path is not known.
    UnknownKind(UnknownAssistantKind),
    /// A restaurant or admin id is malformed.
    InvalidId(ParseIdError),
    /// The administrator never talked to the assistant.
    ThreadNotFound { thread_id: String },
    /// The assistant hub failed.
    Hub(HubError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::UnknownKind(_) | Self::InvalidId(_) => StatusCode::BAD_REQUEST,
            Self::ThreadNotFound { .. } => StatusCode::NOT_FOUND,
            Self::Hub(HubError::Assistant(e)) => match e {
                AssistantError::EmptyMessage => StatusCode::BAD_REQUEST,
                AssistantError::LoopLimitExceeded { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                AssistantError::ModelUnavailable { .. }
                | AssistantError::TurnTimedOut { .. }
                | AssistantError::ThreadStore(_) => StatusCode::SERVICE_UNAVAILABLE,
                AssistantError::InvalidTransition(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Hub(HubError::ThreadStore(_)) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Returns the text safe to show to the caller.
    fn public_message(&self) -> String {
        match self {
            Self::UnknownKind(e) => e.to_string(),
            Self::InvalidId(e) => e.to_string(),
            Self::ThreadNotFound { .. } => self.to_string(),
            Self::Hub(HubError::Assistant(e)) => e.user_message().to_string(),
            Self::Hub(HubError::ThreadStore(e)) => {
                AssistantError::ThreadStore(e.clone()).user_message().to_string()
            }
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownKind(e) => write!(f, "{e}"),
            Self::InvalidId(e) => write!(f, "{e}"),
            Self::ThreadNotFound { thread_id } => write!(f, "thread '{thread_id}' not found"),
            Self::Hub(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<UnknownAssistantKind> for ApiError {
    fn from(e: UnknownAssistantKind) -> Self {
        Self::UnknownKind(e)
    }
}

impl From<ParseIdError> for ApiError {
    fn from(e: ParseIdError) -> Self {
        Self::InvalidId(e)
    }
}

impl From<HubError> for ApiError {
    fn from(e: HubError) -> Self {
        Self::Hub(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self, status = status.as_u16(), "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }
        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

/// Errors that stop the server from starting.
#[derive(Debug)]
pub enum StartupError {
    /// Configuration could not be loaded.
    Config { details: String },
    /// The model backend could not be built.
    Backend { details: String },
    /// The database could not be reached.
    Database { details: String },
    /// Migrations failed.
    Migration { details: String },
    /// An assistant's tools could not be registered.
    Assistants { details: String },
    /// The listener could not bind.
    Bind { addr: String, details: String },
    /// The server stopped with an error.
    Serve { details: String },
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { details } => write!(f, "invalid configuration: {details}"),
            Self::Backend { details } => write!(f, "model backend setup failed: {details}"),
            Self::Database { details } => write!(f, "database connection failed: {details}"),
            Self::Migration { details } => write!(f, "database migration failed: {details}"),
            Self::Assistants { details } => write!(f, "assistant setup failed: {details}"),
            Self::Bind { addr, details } => write!(f, "failed to bind to '{addr}': {details}"),
            Self::Serve { details } => write!(f, "server error: {details}"),
        }
    }
}

impl std::error::Error for StartupError {}

#[cfg(test)]
mod tests {
    use super::*;
    use brigade_conversation::{LOOP_LIMIT_MESSAGE, ThreadStoreError, UNAVAILABLE_MESSAGE};

    fn assistant(e: AssistantError) -> ApiError {
        ApiError::Hub(HubError::Assistant(e))
    }

    #[test]
    fn assistant_errors_map_to_statuses() {
        let unavailable = assistant(AssistantError::ModelUnavailable {
            reason: "connection refused".to_string(),
        });
        assert_eq!(unavailable.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(unavailable.public_message(), UNAVAILABLE_MESSAGE);

        let looped = assistant(AssistantError::LoopLimitExceeded { limit: 25 });
        assert_eq!(looped.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(looped.public_message(), LOOP_LIMIT_MESSAGE);

        let timed_out = assistant(AssistantError::TurnTimedOut { after_secs: 180 });
        assert_eq!(timed_out.status(), StatusCode::SERVICE_UNAVAILABLE);

        assert_eq!(
            assistant(AssistantError::EmptyMessage).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let err = ApiError::Hub(HubError::ThreadStore(ThreadStoreError::StorageFailed {
            reason: "password authentication failed".to_string(),
        }));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(!err.public_message().contains("password"));
    }

    #[test]
    fn startup_errors_name_the_failing_step() {
        let err = StartupError::Assistants {
            details: "tool 'listPositions' is already registered".to_string(),
        };
        assert!(err.to_string().starts_with("assistant setup failed"));
        assert!(err.to_string().contains("listPositions"));
    }

    #[test]
    fn unknown_kind_is_a_bad_request() {
        let err = ApiError::from(UnknownAssistantKind {
            kind: "payroll".to_string(),
        });
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.public_message().contains("payroll"));
    }
}
