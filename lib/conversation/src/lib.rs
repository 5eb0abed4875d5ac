//! Tool-calling conversation engine for Brigade assistants.
//!
//! This crate provides:
//!
//! - **Tool Registry**: named tools with input schemas and handlers
//! - **Thread Store**: append-only conversation memory keyed by thread id
//! - **Agent Step**: one model invocation over the thread history
//! - **Tool Execution Step**: concurrent dispatch of requested tool calls
//! - **Router**: the turn state machine and its round-trip cap
//! - **Conversation Controller**: runs a user turn to completion

pub mod agent;
pub mod config;
pub mod controller;
pub mod error;
pub mod locks;
pub mod message;
pub mod response;
pub mod router;
pub mod schema;
pub mod thread;
pub mod tool;
pub mod tool_exec;

pub use agent::AgentStep;
pub use config::ConversationConfig;
pub use controller::ConversationController;
pub use error::{
    AgentError, AssistantError, HandlerError, LOOP_LIMIT_MESSAGE, RegistryError,
    ThreadStoreError, ToolError, TransitionError, UNAVAILABLE_MESSAGE,
};
pub use locks::{ThreadGuard, ThreadLocks};
pub use message::{Message, MessageRole, ToolCall};
pub use response::AssistantReply;
pub use router::{DEFAULT_MAX_ITERATIONS, Router, TurnEvent, TurnState};
pub use schema::{FieldSpec, FieldType, FieldViolation, SchemaSpec, Violation};
pub use thread::{InMemoryThreadStore, Thread, ThreadId, ThreadStore};
pub use tool::{ToolDefinition, ToolHandler, ToolRegistry, ToolResult, handler_fn, parse_args};
pub use tool_exec::ToolExecutor;
