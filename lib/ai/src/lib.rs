//! Language model primitives for the brigade platform.
//!
//! This crate provides:
//!
//! - **Backend abstraction**: chat requests carrying tool schemas, responses
//!   carrying tool-call requests, and the `LlmBackend` trait
//! - **OpenAI-compatible backend**: Chat Completions over HTTP
//! - **Unavailable backend**: stand-in used when no model is configured
//! - **Scripted backend**: deterministic responses for tests

pub mod backend;
pub mod error;
pub mod openai;
pub mod scripted;

pub use backend::{
    ChatMessage, ChatRole, ChatToolCall, LlmBackend, LlmBackendConfig, LlmProvider, LlmRequest,
    LlmResponse, TokenUsage, ToolSpec, UnavailableBackend,
};
pub use error::LlmError;
pub use openai::OpenAiBackend;
pub use scripted::ScriptedBackend;
