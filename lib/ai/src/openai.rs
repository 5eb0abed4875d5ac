//! OpenAI-compatible Chat Completions backend.
//!
//! Works against the OpenAI API and any server exposing the same
//! `/chat/completions` contract with function-style tool calling.

use crate::backend::{
    ChatMessage, ChatRole, ChatToolCall, LlmBackend, LlmBackendConfig, LlmProvider, LlmRequest,
    LlmResponse, TokenUsage, ToolSpec,
};
use crate::error::LlmError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Upper bound on response body text copied into error messages.
const ERROR_BODY_MAX_CHARS: usize = 512;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Backend speaking the OpenAI Chat Completions protocol.
#[derive(Debug, Clone)]
pub struct OpenAiBackend {
    http: reqwest::Client,
    config: LlmBackendConfig,
}

impl OpenAiBackend {
    /// Creates a backend from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::InvalidConfig`] if the hosted OpenAI provider is
    /// selected without an API key, or the HTTP client cannot be built.
    pub fn new(config: LlmBackendConfig) -> Result<Self, LlmError> {
        if config.provider == LlmProvider::OpenAi && config.api_key.is_none() {
            return Err(LlmError::InvalidConfig {
                reason: "the openai provider requires an API key".to_string(),
            });
        }
        if config.model.trim().is_empty() {
            return Err(LlmError::InvalidConfig {
                reason: "model name is empty".to_string(),
            });
        }
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| LlmError::InvalidConfig {
                reason: e.to_string(),
            })?;
        Ok(Self { http, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn build_payload<'a>(&'a self, request: &'a LlmRequest) -> WireRequest<'a> {
        WireRequest {
            model: &self.config.model,
            messages: request.messages.iter().map(WireMessage::from_chat).collect(),
            tools: request.tools.iter().map(WireTool::from_spec).collect(),
            temperature: request.temperature.or(self.config.temperature),
            max_tokens: request.max_tokens.or(self.config.max_tokens),
        }
    }

    fn map_send_error(&self, error: &reqwest::Error) -> LlmError {
        if error.is_timeout() {
            LlmError::Timeout
        } else if error.is_connect() {
            LlmError::ProviderUnavailable {
                provider: self.config.provider.as_str().to_string(),
                reason: error.to_string(),
            }
        } else {
            LlmError::RequestFailed {
                reason: error.to_string(),
            }
        }
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    #[instrument(skip_all, fields(model = %self.config.model, messages = request.messages.len()))]
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let mut builder = self.http.post(self.endpoint()).json(&self.build_payload(request));
        if let Some(api_key) = &self.config.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await.map_err(|e| self.map_send_error(&e))?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse().ok());
            return Err(LlmError::RateLimited { retry_after_secs });
        }

        let body = response.text().await.map_err(|e| self.map_send_error(&e))?;
        if !status.is_success() {
            warn!(%status, "model backend returned an error status");
            return Err(LlmError::RequestFailed {
                reason: format!("{status}: {}", truncate(&body, ERROR_BODY_MAX_CHARS)),
            });
        }

        let parsed = parse_response(&body)?;
        debug!(
            tool_calls = parsed.tool_calls.len(),
            total_tokens = parsed.usage.total(),
            "model response received"
        );
        Ok(parsed)
    }

    fn provider(&self) -> LlmProvider {
        self.config.provider
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: ChatRole,
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl WireMessage {
    fn from_chat(message: &ChatMessage) -> Self {
        // Assistant turns that only carry tool calls send `null` content.
        let content = if message.role == ChatRole::Assistant
            && message.content.is_empty()
            && !message.tool_calls.is_empty()
        {
            None
        } else {
            Some(message.content.clone())
        };
        Self {
            role: message.role,
            content,
            tool_calls: message
                .tool_calls
                .iter()
                .map(WireToolCall::from_chat)
                .collect(),
            tool_call_id: message.tool_call_id.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: WireFunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

impl WireToolCall {
    fn from_chat(call: &ChatToolCall) -> Self {
        Self {
            id: call.id.clone(),
            kind: function_kind(),
            function: WireFunctionCall {
                name: call.name.clone(),
                arguments: call.arguments.to_string(),
            },
        }
    }

    fn into_chat(self) -> ChatToolCall {
        ChatToolCall {
            id: self.id,
            name: self.function.name,
            arguments: decode_arguments(self.function.arguments),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    /// JSON-encoded arguments object.
    arguments: String,
}

#[derive(Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction<'a>,
}

impl<'a> WireTool<'a> {
    fn from_spec(spec: &'a ToolSpec) -> Self {
        Self {
            kind: "function",
            function: WireFunction {
                name: &spec.name,
                description: &spec.description,
                parameters: &spec.parameters,
            },
        }
    }
}

#[derive(Serialize)]
struct WireFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a JsonValue,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    model: String,
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

/// Decodes the arguments string of a tool call.
///
/// Malformed JSON is kept as a string value so schema validation reports it
/// back to the model instead of failing the whole request.
fn decode_arguments(raw: String) -> JsonValue {
    if raw.trim().is_empty() {
        return JsonValue::Object(serde_json::Map::new());
    }
    serde_json::from_str(&raw).unwrap_or(JsonValue::String(raw))
}

fn parse_response(body: &str) -> Result<LlmResponse, LlmError> {
    let wire: WireResponse =
        serde_json::from_str(body).map_err(|e| LlmError::ResponseParseFailed {
            reason: e.to_string(),
        })?;
    let choice = wire
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::ResponseParseFailed {
            reason: "response contained no choices".to_string(),
        })?;

    let usage = wire
        .usage
        .map(|u| TokenUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        })
        .unwrap_or_default();

    Ok(LlmResponse {
        content: choice.message.content.unwrap_or_default(),
        tool_calls: choice
            .message
            .tool_calls
            .into_iter()
            .map(WireToolCall::into_chat)
            .collect(),
        usage,
        model: wire.model,
    })
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn backend() -> OpenAiBackend {
        OpenAiBackend::new(LlmBackendConfig::openai("sk-test", "gpt-4o-mini").with_temperature(0.1))
            .expect("valid config")
    }

    #[test]
    fn openai_requires_api_key() {
        let mut config = LlmBackendConfig::openai("sk-test", "gpt-4o-mini");
        config.api_key = None;
        let err = OpenAiBackend::new(config).unwrap_err();
        assert!(matches!(err, LlmError::InvalidConfig { .. }));
    }

    #[test]
    fn compatible_backend_needs_no_key() {
        let backend =
            OpenAiBackend::new(LlmBackendConfig::compatible("http://localhost:11434/v1/", "qwen"))
                .expect("valid config");
        assert_eq!(backend.endpoint(), "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn payload_matches_chat_completions_shape() {
        let backend = backend();
        let request = LlmRequest::new(vec![
            ChatMessage::system("You manage staff."),
            ChatMessage::user("Create John"),
            ChatMessage::assistant(
                "",
                vec![ChatToolCall::new(
                    "call_1",
                    "createStaffMember",
                    json!({"name": "John"}),
                )],
            ),
            ChatMessage::tool("call_1", "{\"id\":\"abc\"}"),
        ])
        .with_tools(vec![ToolSpec {
            name: "createStaffMember".to_string(),
            description: "Create a staff member".to_string(),
            parameters: json!({"type": "object", "properties": {}}),
        }]);

        let payload = serde_json::to_value(backend.build_payload(&request)).expect("serialize");

        assert_eq!(payload["model"], "gpt-4o-mini");
        assert_eq!(payload["temperature"], json!(0.1_f32));
        assert_eq!(payload["messages"][0]["role"], "system");
        assert_eq!(payload["messages"][2]["content"], JsonValue::Null);
        assert_eq!(payload["messages"][2]["tool_calls"][0]["type"], "function");
        assert_eq!(
            payload["messages"][2]["tool_calls"][0]["function"]["arguments"],
            "{\"name\":\"John\"}"
        );
        assert_eq!(payload["messages"][3]["tool_call_id"], "call_1");
        assert_eq!(payload["tools"][0]["function"]["name"], "createStaffMember");
        assert!(payload.get("max_tokens").is_none());
    }

    #[test]
    fn parses_tool_call_response() {
        let body = json!({
            "model": "gpt-4o-mini",
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_9",
                        "type": "function",
                        "function": {"name": "listShifts", "arguments": "{\"staffId\":\"s1\"}"}
                    }]
                }
            }],
            "usage": {"prompt_tokens": 120, "completion_tokens": 14}
        })
        .to_string();

        let response = parse_response(&body).expect("parse");

        assert!(response.content.is_empty());
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].arguments, json!({"staffId": "s1"}));
        assert_eq!(response.usage.total(), 134);
    }

    #[test]
    fn malformed_arguments_are_kept_as_text() {
        assert_eq!(
            decode_arguments("{not json".to_string()),
            JsonValue::String("{not json".to_string())
        );
        assert_eq!(decode_arguments("  ".to_string()), json!({}));
    }

    #[test]
    fn empty_choices_is_a_parse_error() {
        let err = parse_response("{\"choices\": []}").unwrap_err();
        assert!(matches!(err, LlmError::ResponseParseFailed { .. }));
    }

    #[test]
    fn truncate_long_bodies() {
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("abc", 3), "abc");
    }
}
