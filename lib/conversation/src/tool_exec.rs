//! Tool execution step.
//!
//! Runs every tool call of one assistant message concurrently. Failures never
//! abort the turn: they become error-flagged results the model can react to.

use crate::error::ToolError;
use crate::message::ToolCall;
use crate::tool::{ToolRegistry, ToolResult};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Dispatches tool calls against a registry.
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
}

impl ToolExecutor {
    /// Creates an executor with a per-call timeout.
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    /// Returns the registry.
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Executes the calls and returns one result per call, in call order.
    #[instrument(skip_all, fields(calls = calls.len()))]
    pub async fn execute(&self, calls: &[ToolCall]) -> Vec<ToolResult> {
        join_all(calls.iter().map(|call| self.execute_one(call))).await
    }

    async fn execute_one(&self, call: &ToolCall) -> ToolResult {
        let invocation = self.registry.invoke(&call.name, call.arguments.clone());
        let outcome = match tokio::time::timeout(self.timeout, invocation).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ToolError::Timeout {
                name: call.name.clone(),
                after_secs: self.timeout.as_secs(),
            }),
        };

        match outcome {
            Ok(output) => {
                debug!(tool = %call.name, call_id = %call.id, "tool succeeded");
                ToolResult::success(&call.id, &output)
            }
            Err(e) => {
                warn!(tool = %call.name, call_id = %call.id, error = %e, "tool call failed");
                ToolResult::failure(&call.id, &e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::schema::{FieldSpec, FieldType, SchemaSpec};
    use crate::tool::{ToolDefinition, handler_fn};
    use serde_json::json;

    fn registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry
            .register(ToolDefinition::new(
                "slow",
                "Answers after a delay",
                SchemaSpec::new().field("ms", FieldSpec::required(FieldType::Integer)),
                handler_fn(|args| async move {
                    let ms = args["ms"].as_u64().unwrap_or_default();
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    Ok::<_, HandlerError>(json!({ "slept": ms }))
                }),
            ))
            .unwrap();
        registry
            .register(ToolDefinition::new(
                "broken",
                "Always fails",
                SchemaSpec::new(),
                handler_fn(|_| async {
                    Err::<serde_json::Value, _>(HandlerError::new("shift overlaps another shift"))
                }),
            ))
            .unwrap();
        Arc::new(registry)
    }

    #[tokio::test(start_paused = true)]
    async fn results_follow_call_order() {
        let executor = ToolExecutor::new(registry(), Duration::from_secs(30));
        let calls = vec![
            ToolCall::new("a", "slow", json!({"ms": 300})),
            ToolCall::new("b", "slow", json!({"ms": 10})),
            ToolCall::new("c", "slow", json!({"ms": 100})),
        ];

        let results = executor.execute(&calls).await;

        let ids: Vec<_> = results.iter().map(|r| r.tool_call_id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert!(results.iter().all(|r| !r.is_error));
        assert_eq!(results[0].content, "{\"slept\":300}");
    }

    #[tokio::test(start_paused = true)]
    async fn calls_run_concurrently() {
        let executor = ToolExecutor::new(registry(), Duration::from_secs(30));
        let calls = vec![
            ToolCall::new("a", "slow", json!({"ms": 1000})),
            ToolCall::new("b", "slow", json!({"ms": 1000})),
        ];

        let started = tokio::time::Instant::now();
        executor.execute(&calls).await;

        assert!(started.elapsed() < Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn failures_become_error_results() {
        let executor = ToolExecutor::new(registry(), Duration::from_secs(30));
        let calls = vec![
            ToolCall::new("a", "broken", json!({})),
            ToolCall::new("b", "missing", json!({})),
            ToolCall::new("c", "slow", json!({"ms": "soon"})),
        ];

        let results = executor.execute(&calls).await;

        assert!(results.iter().all(|r| r.is_error));
        assert!(results[0].content.contains("shift overlaps"));
        assert!(results[1].content.contains("tool not found"));
        assert!(results[2].content.contains("`ms`"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_tool_times_out() {
        let executor = ToolExecutor::new(registry(), Duration::from_secs(1));
        let calls = vec![ToolCall::new("a", "slow", json!({"ms": 5000}))];

        let results = executor.execute(&calls).await;

        assert!(results[0].is_error);
        assert!(results[0].content.contains("timed out"));
    }
}
