//! Tool registry for assistants.
//!
//! A tool is a named capability the model may request: a description, an
//! input schema, and a handler that performs the domain operation. Each
//! assistant owns one registry, built once at startup and read-only after.

use crate::error::{HandlerError, RegistryError, ToolError};
use crate::message::Message;
use crate::schema::SchemaSpec;
use async_trait::async_trait;
use brigade_ai::ToolSpec;
use serde::de::DeserializeOwned;
use serde_json::{Value as JsonValue, json};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Performs the operation behind a tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Runs the operation with schema-valid arguments.
    async fn call(&self, arguments: JsonValue) -> Result<JsonValue, HandlerError>;
}

struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> ToolHandler for FnHandler<F>
where
    F: Fn(JsonValue) -> Fut + Send + Sync,
    Fut: Future<Output = Result<JsonValue, HandlerError>> + Send,
{
    async fn call(&self, arguments: JsonValue) -> Result<JsonValue, HandlerError> {
        (self.f)(arguments).await
    }
}

/// Wraps an async closure as a tool handler.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn ToolHandler>
where
    F: Fn(JsonValue) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<JsonValue, HandlerError>> + Send + 'static,
{
    Arc::new(FnHandler { f })
}

/// Deserializes tool arguments into a typed request.
///
/// # Errors
///
/// Returns a [`HandlerError`] if the arguments do not fit `T`.
pub fn parse_args<T: DeserializeOwned>(arguments: JsonValue) -> Result<T, HandlerError> {
    Ok(serde_json::from_value(arguments)?)
}

/// A tool available to an assistant.
#[derive(Clone)]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// When the model should use the tool.
    pub description: String,
    /// Contract for the arguments object.
    pub input_schema: SchemaSpec,
    handler: Arc<dyn ToolHandler>,
}

impl ToolDefinition {
    /// Creates a tool definition.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: SchemaSpec,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            handler,
        }
    }

    /// Returns the schema advertised to the model.
    #[must_use]
    pub fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.input_schema.to_json_schema(),
        }
    }
}

impl fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .finish_non_exhaustive()
    }
}

/// Registry of the tools one assistant may use.
///
/// Keeps registration order so the model always sees tools in the same order.
#[derive(Debug, Default, Clone)]
pub struct ToolRegistry {
    definitions: Vec<ToolDefinition>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateTool`] if the name is taken.
    pub fn register(&mut self, definition: ToolDefinition) -> Result<(), RegistryError> {
        if self.by_name.contains_key(&definition.name) {
            return Err(RegistryError::DuplicateTool {
                name: definition.name,
            });
        }
        self.by_name
            .insert(definition.name.clone(), self.definitions.len());
        self.definitions.push(definition);
        Ok(())
    }

    /// Gets a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.by_name.get(name).map(|&i| &self.definitions[i])
    }

    /// Returns the number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Returns whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Returns the tool schemas bound to the model, in registration order.
    #[must_use]
    pub fn describe_all(&self) -> Vec<ToolSpec> {
        self.definitions.iter().map(ToolDefinition::spec).collect()
    }

    /// Validates the arguments and runs the named tool.
    ///
    /// # Errors
    ///
    /// Returns a [`ToolError`] if the tool is unknown, the arguments violate
    /// its schema, or the handler fails.
    pub async fn invoke(&self, name: &str, arguments: JsonValue) -> Result<JsonValue, ToolError> {
        let definition = self.get(name).ok_or_else(|| ToolError::NotFound {
            name: name.to_string(),
        })?;

        definition
            .input_schema
            .validate(&arguments)
            .map_err(|violations| ToolError::InvalidArguments {
                name: name.to_string(),
                violations,
            })?;

        definition
            .handler
            .call(arguments)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                name: name.to_string(),
                reason: e.message().to_string(),
            })
    }
}

/// Outcome of one tool call, ready to be shown to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    /// The call this result answers.
    pub tool_call_id: String,
    /// Tool output, or an error description.
    pub content: String,
    /// Whether the call failed.
    pub is_error: bool,
}

impl ToolResult {
    /// Creates a successful result.
    #[must_use]
    pub fn success(tool_call_id: impl Into<String>, output: &JsonValue) -> Self {
        let content = match output {
            JsonValue::String(text) => text.clone(),
            other => other.to_string(),
        };
        Self {
            tool_call_id: tool_call_id.into(),
            content,
            is_error: false,
        }
    }

    /// Creates a failed result.
    #[must_use]
    pub fn failure(tool_call_id: impl Into<String>, error: &ToolError) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: json!({ "error": error.to_string() }).to_string(),
            is_error: true,
        }
    }

    /// Converts into a tool message.
    #[must_use]
    pub fn into_message(self) -> Message {
        Message::tool(self.tool_call_id, self.content, self.is_error)
    }
}
