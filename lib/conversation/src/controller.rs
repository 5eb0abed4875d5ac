//! Conversation controller: the entry point for a user turn.
//!
//! A turn loads the thread, adds the user message, then alternates between
//! the agent step and the tool execution step under the router until the
//! model answers without tool calls or the round-trip cap is hit. Everything
//! the turn produced is committed to the thread store in a single append.

use crate::agent::AgentStep;
use crate::config::ConversationConfig;
use crate::error::{AssistantError, LOOP_LIMIT_MESSAGE, ThreadStoreError};
use crate::locks::ThreadLocks;
use crate::message::{Message, ToolCall};
use crate::response::AssistantReply;
use crate::router::{Router, TurnState};
use crate::thread::{Thread, ThreadId, ThreadStore};
use crate::tool::ToolRegistry;
use crate::tool_exec::ToolExecutor;
use brigade_ai::LlmBackend;
use brigade_core::TurnId;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Runs turns for the threads of one assistant.
#[derive(Clone)]
pub struct ConversationController {
    agent: AgentStep,
    tools: ToolExecutor,
    store: Arc<dyn ThreadStore>,
    locks: ThreadLocks,
    config: ConversationConfig,
}

impl ConversationController {
    /// Creates a controller.
    #[must_use]
    pub fn new(
        backend: Arc<dyn LlmBackend>,
        registry: Arc<ToolRegistry>,
        store: Arc<dyn ThreadStore>,
        config: ConversationConfig,
    ) -> Self {
        Self {
            agent: AgentStep::new(backend, config.model_timeout()),
            tools: ToolExecutor::new(registry, config.tool_timeout()),
            store,
            locks: ThreadLocks::new(),
            config,
        }
    }

    /// Returns the limits in effect.
    #[must_use]
    pub fn config(&self) -> &ConversationConfig {
        &self.config
    }

    /// Processes one user message on a thread and returns the final answer.
    ///
    /// Turns on the same thread run one at a time; turns on different
    /// threads run independently.
    ///
    /// # Errors
    ///
    /// - [`AssistantError::EmptyMessage`] for a blank message.
    /// - [`AssistantError::ModelUnavailable`] or [`AssistantError::TurnTimedOut`];
    ///   the thread is left untouched.
    /// - [`AssistantError::LoopLimitExceeded`]; the turn is recorded, ending
    ///   with a loop-limit notice.
    /// - [`AssistantError::ThreadStore`] if history cannot be read or written.
    #[instrument(skip_all, fields(thread_id = %thread_id))]
    pub async fn process_query(
        &self,
        thread_id: &ThreadId,
        user_message: &str,
    ) -> Result<AssistantReply, AssistantError> {
        if user_message.trim().is_empty() {
            return Err(AssistantError::EmptyMessage);
        }

        let turn_timeout = self.config.turn_timeout();
        match tokio::time::timeout(turn_timeout, self.run_turn(thread_id, user_message)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_secs = turn_timeout.as_secs(), "turn timed out");
                Err(AssistantError::TurnTimedOut {
                    after_secs: turn_timeout.as_secs(),
                })
            }
        }
    }

    async fn run_turn(
        &self,
        thread_id: &ThreadId,
        user_message: &str,
    ) -> Result<AssistantReply, AssistantError> {
        let _guard = self.locks.acquire(thread_id).await;

        let turn_id = TurnId::new();
        let mut history = self.store.load(thread_id).await?;
        let committed = history.len();
        history.push(Message::user(user_message).in_turn(turn_id));

        let tool_specs = self.tools.registry().describe_all();
        let mut router = Router::new(self.config.max_iterations);
        let mut pending: Vec<ToolCall> = Vec::new();

        loop {
            match router.state() {
                TurnState::AwaitingModel => {
                    let reply = self.agent.run(&history, &tool_specs).await?.in_turn(turn_id);
                    let state = router.model_responded(reply.has_tool_calls())?;
                    debug!(%turn_id, ?state, round_trips = router.round_trips(), "model responded");
                    pending.clone_from(&reply.tool_calls);
                    history.push(reply);
                }
                TurnState::ExecutingTools => {
                    let results = self.tools.execute(&pending).await;
                    history.extend(
                        results
                            .into_iter()
                            .map(|result| result.into_message().in_turn(turn_id)),
                    );
                    pending.clear();
                    let state = router.tools_completed()?;
                    debug!(%turn_id, ?state, "tools completed");
                }
                TurnState::Done => {
                    let content = history
                        .last()
                        .map(|message| message.content.clone())
                        .unwrap_or_default();
                    self.store
                        .append(thread_id, history.split_off(committed))
                        .await?;
                    info!(%turn_id, round_trips = router.round_trips(), "turn completed");
                    return Ok(AssistantReply::normalize(&content));
                }
                TurnState::LoopLimitExceeded => {
                    history.push(Message::assistant(LOOP_LIMIT_MESSAGE).in_turn(turn_id));
                    self.store
                        .append(thread_id, history.split_off(committed))
                        .await?;
                    warn!(%turn_id, limit = router.max_iterations(), "turn hit the iteration cap");
                    return Err(AssistantError::LoopLimitExceeded {
                        limit: router.max_iterations(),
                    });
                }
            }
        }
    }

    /// Clears a thread back to its seed message.
    ///
    /// Waits for a turn in progress on the thread to finish first.
    ///
    /// # Errors
    ///
    /// Returns [`ThreadStoreError`] if the store fails.
    #[instrument(skip_all, fields(thread_id = %thread_id))]
    pub async fn reset(&self, thread_id: &ThreadId) -> Result<(), ThreadStoreError> {
        let _guard = self.locks.acquire(thread_id).await;
        self.store.reset(thread_id).await?;
        info!("thread reset");
        Ok(())
    }

    /// Returns the thread's history, or the seed alone for a new thread.
    ///
    /// # Errors
    ///
    /// Returns [`ThreadStoreError`] if the store fails.
    pub async fn history(&self, thread_id: &ThreadId) -> Result<Vec<Message>, ThreadStoreError> {
        self.store.load(thread_id).await
    }

    /// Returns the stored thread, if anything was ever recorded on it.
    ///
    /// # Errors
    ///
    /// Returns [`ThreadStoreError`] if the store fails.
    pub async fn snapshot(&self, thread_id: &ThreadId) -> Result<Option<Thread>, ThreadStoreError> {
        self.store.snapshot(thread_id).await
    }
}

impl std::fmt::Debug for ConversationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationController")
            .field("agent", &self.agent)
            .field("tools", &self.tools)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
