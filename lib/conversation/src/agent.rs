//! Agent step: one model invocation.

use crate::error::AgentError;
use crate::message::{Message, ToolCall};
use brigade_ai::{LlmBackend, LlmRequest, ToolSpec};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use ulid::Ulid;

/// Sends the thread history to the model and turns its answer into an
/// assistant message.
#[derive(Clone)]
pub struct AgentStep {
    backend: Arc<dyn LlmBackend>,
    timeout: Duration,
}

impl AgentStep {
    /// Creates an agent step.
    #[must_use]
    pub fn new(backend: Arc<dyn LlmBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Invokes the model once.
    ///
    /// Tool calls with a missing or repeated id get a fresh one, so every
    /// tool result can be attributed to exactly one call.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ModelUnavailable`] if the backend fails or does
    /// not answer within the timeout.
    #[instrument(skip_all, fields(model = self.backend.model(), messages = history.len()))]
    pub async fn run(&self, history: &[Message], tools: &[ToolSpec]) -> Result<Message, AgentError> {
        let request = LlmRequest::new(history.iter().map(Message::to_chat).collect())
            .with_tools(tools.to_vec());

        let response = match tokio::time::timeout(self.timeout, self.backend.generate(&request)).await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!(error = %e, "model call failed");
                return Err(AgentError::ModelUnavailable {
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "model call timed out");
                return Err(AgentError::ModelUnavailable {
                    reason: format!("no response within {}s", self.timeout.as_secs()),
                });
            }
        };

        debug!(
            tool_calls = response.tool_calls.len(),
            total_tokens = response.usage.total(),
            "model responded"
        );

        let mut seen = HashSet::new();
        let tool_calls = response
            .tool_calls
            .into_iter()
            .map(|call| {
                let mut call = ToolCall::from(call);
                if call.id.trim().is_empty() || !seen.insert(call.id.clone()) {
                    call.id = format!("call_{}", Ulid::new());
                    seen.insert(call.id.clone());
                }
                call
            })
            .collect();

        Ok(Message::assistant(response.content).with_tool_calls(tool_calls))
    }
}

impl std::fmt::Debug for AgentStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentStep")
            .field("provider", &self.backend.provider())
            .field("model", &self.backend.model())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brigade_ai::{ChatRole, ChatToolCall, LlmError, LlmResponse, ScriptedBackend};
    use serde_json::json;

    fn step(backend: ScriptedBackend) -> (AgentStep, Arc<ScriptedBackend>) {
        let backend = Arc::new(backend);
        (AgentStep::new(backend.clone(), Duration::from_secs(60)), backend)
    }

    #[tokio::test]
    async fn sends_history_and_tools() {
        let (step, backend) = step(ScriptedBackend::new([LlmResponse::text("Hello")]));
        let tools = vec![ToolSpec {
            name: "listShifts".to_string(),
            description: "List shifts".to_string(),
            parameters: json!({"type": "object"}),
        }];
        let history = vec![Message::system("seed"), Message::user("hi")];

        let reply = step.run(&history, &tools).await.unwrap();

        assert_eq!(reply.content, "Hello");
        assert!(!reply.has_tool_calls());
        let request = &backend.requests()[0];
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[1].role, ChatRole::User);
        assert_eq!(request.tools, tools);
    }

    #[tokio::test]
    async fn backend_failure_is_model_unavailable() {
        let (step, _) = step(ScriptedBackend::new([]).then_fail(LlmError::ProviderUnavailable {
            provider: "openai".to_string(),
            reason: "connection refused".to_string(),
        }));

        let err = step.run(&[Message::user("hi")], &[]).await.unwrap_err();
        assert!(matches!(err, AgentError::ModelUnavailable { ref reason } if reason.contains("connection refused")));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_backend_times_out() {
        let (step, _) = step(
            ScriptedBackend::always(LlmResponse::text("late")).with_delay(Duration::from_secs(120)),
        );

        let err = step.run(&[Message::user("hi")], &[]).await.unwrap_err();
        assert!(matches!(err, AgentError::ModelUnavailable { .. }));
    }

    #[tokio::test]
    async fn missing_and_duplicate_call_ids_are_replaced() {
        let (step, _) = step(ScriptedBackend::new([LlmResponse::with_tool_calls(vec![
            ChatToolCall::new("", "listShifts", json!({})),
            ChatToolCall::new("call_1", "listShifts", json!({})),
            ChatToolCall::new("call_1", "listPositions", json!({})),
        ])]));

        let reply = step.run(&[Message::user("hi")], &[]).await.unwrap();
        let ids: HashSet<_> = reply.tool_calls.iter().map(|c| c.id.as_str()).collect();

        assert_eq!(ids.len(), 3);
        assert_eq!(reply.tool_calls[1].id, "call_1");
        assert!(reply.tool_calls[0].id.starts_with("call_"));
        assert_eq!(reply.tool_calls[2].name, "listPositions");
    }
}
