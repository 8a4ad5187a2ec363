//! Language model backends
//!
//! The model is an opaque capability: given messages and the tool
//! catalog it returns either a final answer or tool-call requests.
//! Failures carry a typed kind so the orchestrator never has to match
//! on error message substrings.

use crate::config::{Config, ModelChoice};
use crate::models::{ChatMessage, ChatRole, ParamType, ToolCall, ToolDescriptor};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{error, info};
use uuid::Uuid;

const GROQ_CHAT_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const GROQ_MODEL: &str = "llama3-8b-8192";
const OLLAMA_MODEL: &str = "llama3";

/// Typed failure kinds surfaced by model backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    RateLimited,
    Timeout,
    Other(String),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::RateLimited => write!(f, "model backend is over capacity"),
            ModelError::Timeout => write!(f, "model request timed out"),
            ModelError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

/// One model invocation outcome: a final answer, or tool calls to run.
#[derive(Debug, Clone)]
pub enum ModelReply {
    Answer(String),
    ToolCalls(Vec<ToolCall>),
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDescriptor],
    ) -> Result<ModelReply, ModelError>;
}

/// Build the configured backend.
pub fn build_model(config: &Config) -> Box<dyn LanguageModel> {
    match config.model_choice {
        ModelChoice::Groq => {
            info!("Model backend: groq ({})", GROQ_MODEL);
            Box::new(GroqModel::new(config.groq_api_key.clone()))
        }
        ModelChoice::Ollama => {
            info!("Model backend: ollama ({})", OLLAMA_MODEL);
            Box::new(OllamaModel::new(config.ollama_url.clone()))
        }
    }
}

/// OpenAI-style function schema from a tool descriptor.
fn descriptor_to_function(descriptor: &ToolDescriptor) -> Value {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();

    for param in &descriptor.parameters {
        let type_name = match param.param_type {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Array => "array",
            ParamType::Object => "object",
        };
        properties.insert(param.name.to_string(), json!({ "type": type_name }));
        if param.required {
            required.push(param.name);
        }
    }

    json!({
        "type": "function",
        "function": {
            "name": descriptor.name,
            "description": descriptor.description,
            "parameters": {
                "type": "object",
                "properties": properties,
                "required": required,
            }
        }
    })
}

fn role_str(role: ChatRole) -> &'static str {
    match role {
        ChatRole::System => "system",
        ChatRole::User => "user",
        ChatRole::Assistant => "assistant",
        ChatRole::Tool => "tool",
    }
}

/// Serialize messages to the chat-completions wire shape. Assistant
/// messages carrying tool calls get a `tool_calls` array (with the
/// arguments JSON-encoded as a string), and tool results reference
/// their call via `tool_call_id`.
fn wire_messages(messages: &[ChatMessage]) -> Vec<Value> {
    messages
        .iter()
        .map(|m| {
            let mut wire = json!({ "role": role_str(m.role), "content": m.content });
            if let Some(calls) = &m.tool_calls {
                wire["content"] = Value::Null;
                wire["tool_calls"] = Value::Array(
                    calls
                        .iter()
                        .map(|call| {
                            json!({
                                "id": call.call_id,
                                "type": "function",
                                "function": {
                                    "name": call.tool_name,
                                    "arguments": call.arguments.to_string(),
                                }
                            })
                        })
                        .collect(),
                );
            }
            if let Some(id) = &m.tool_call_id {
                wire["tool_call_id"] = json!(id);
            }
            wire
        })
        .collect()
}

// =============================
// Groq (hosted) backend
// =============================

/// Reusable Groq client (connection-pooled).
pub struct GroqModel {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GroqModel {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key,
            base_url: GROQ_CHAT_URL.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    /// Arguments arrive as a JSON-encoded string.
    arguments: String,
}

fn reply_from_choice(message: ChoiceMessage) -> Result<ModelReply, ModelError> {
    if let Some(calls) = message.tool_calls {
        if !calls.is_empty() {
            let parsed = calls
                .into_iter()
                .map(|call| {
                    let arguments = serde_json::from_str::<Value>(&call.function.arguments)
                        .unwrap_or_else(|_| json!({}));
                    let call_id = if call.id.is_empty() {
                        Uuid::new_v4().to_string()
                    } else {
                        call.id
                    };
                    ToolCall {
                        call_id,
                        tool_name: call.function.name,
                        arguments,
                    }
                })
                .collect();
            return Ok(ModelReply::ToolCalls(parsed));
        }
    }

    match message.content {
        Some(text) if !text.is_empty() => Ok(ModelReply::Answer(text)),
        _ => Err(ModelError::Other("Empty model response".to_string())),
    }
}

fn classify_request_error(e: reqwest::Error) -> ModelError {
    if e.is_timeout() {
        ModelError::Timeout
    } else {
        ModelError::Other(format!("Model request failed: {}", e))
    }
}

#[async_trait]
impl LanguageModel for GroqModel {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDescriptor],
    ) -> Result<ModelReply, ModelError> {
        if self.api_key.is_empty() {
            return Err(ModelError::Other(
                "GROQ_API_KEY not configured".to_string(),
            ));
        }

        let mut request = json!({
            "model": GROQ_MODEL,
            "messages": wire_messages(messages),
            "temperature": 0.0,
        });
        if !tools.is_empty() {
            request["tools"] = Value::Array(tools.iter().map(descriptor_to_function).collect());
        }

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(classify_request_error)?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE => {
                return Err(ModelError::RateLimited);
            }
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
                return Err(ModelError::Timeout);
            }
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                error!("Model API error response: {}", body);
                return Err(ModelError::Other(format!(
                    "Model API returned {}: {}",
                    status, body
                )));
            }
            _ => {}
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Other(format!("Model parse error: {}", e)))?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::Other("No choices in model response".to_string()))?;

        reply_from_choice(choice.message)
    }
}

// =============================
// Ollama (local) backend
// =============================

pub struct OllamaModel {
    client: Client,
    base_url: String,
}

impl OllamaModel {
    pub fn new(base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Option<Vec<OllamaToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OllamaToolCall {
    function: OllamaFunction,
}

#[derive(Debug, Deserialize)]
struct OllamaFunction {
    name: String,
    /// Ollama returns arguments as a JSON object directly.
    #[serde(default)]
    arguments: Value,
}

#[async_trait]
impl LanguageModel for OllamaModel {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDescriptor],
    ) -> Result<ModelReply, ModelError> {
        let mut request = json!({
            "model": OLLAMA_MODEL,
            "messages": wire_messages(messages),
            "stream": false,
        });
        if !tools.is_empty() {
            request["tools"] = Value::Array(tools.iter().map(descriptor_to_function).collect());
        }

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(classify_request_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Other(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let chat: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Other(format!("Ollama parse error: {}", e)))?;

        if let Some(calls) = chat.message.tool_calls {
            if !calls.is_empty() {
                let parsed = calls
                    .into_iter()
                    .map(|call| ToolCall {
                        call_id: Uuid::new_v4().to_string(),
                        tool_name: call.function.name,
                        arguments: call.function.arguments,
                    })
                    .collect();
                return Ok(ModelReply::ToolCalls(parsed));
            }
        }

        if chat.message.content.is_empty() {
            return Err(ModelError::Other("Empty model response".to_string()));
        }
        Ok(ModelReply::Answer(chat.message.content))
    }
}

// =============================
// Scripted backend (demo & tests)
// =============================

/// Deterministic model that replays a fixed script of replies. Keeps
/// the agent loop runnable without a live model backend.
pub struct ScriptedModel {
    script: Mutex<Vec<Result<ModelReply, ModelError>>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Result<ModelReply, ModelError>>) -> Self {
        Self {
            script: Mutex::new(replies),
        }
    }

    /// A model that always answers with fixed text.
    pub fn answering(text: impl Into<String>) -> Self {
        Self::new(vec![Ok(ModelReply::Answer(text.into()))])
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(
        &self,
        _messages: &[ChatMessage],
        _tools: &[ToolDescriptor],
    ) -> Result<ModelReply, ModelError> {
        let mut script = self
            .script
            .lock()
            .map_err(|_| ModelError::Other("script lock poisoned".to_string()))?;

        if script.is_empty() {
            return Ok(ModelReply::Answer(
                "I have no further information to add.".to_string(),
            ));
        }
        Ok(script.remove(0)?)
    }
}
