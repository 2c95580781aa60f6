//! SageMaker endpoint LLM provider implementation.
//!
//! Self-hosted models deployed behind a SageMaker endpoint (JumpStart, LMI
//! containers) accept the OpenAI chat completions payload on the runtime
//! `invocations` route, so the wire types here mirror that API.

use super::provider::{ApiKeySource, CompletionOptions, LlmError, LlmProvider};
use super::types::{CompletionResponse, FinishReason, Message, MessageRole, TokenUsage, ToolCall};
use crate::agent::tools::ToolDefinition;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const INFERENCE_COMPONENT_HEADER: &str = "X-Amzn-SageMaker-Inference-Component";

/// SageMaker endpoint provider.
pub struct SageMakerProvider {
    client: Client,
    base_url: String,
    endpoint_name: String,
    /// Set when the model is deployed as an inference component rather
    /// than directly on the endpoint.
    inference_component: Option<String>,
    api_key_source: ApiKeySource,
}

impl SageMakerProvider {
    /// Create a provider for an endpoint in a region, e.g.
    /// `SageMakerProvider::new("us-east-1", "my-llm-endpoint")`.
    pub fn new(region: impl AsRef<str>, endpoint_name: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: format!("https://runtime.sagemaker.{}.amazonaws.com", region.as_ref()),
            endpoint_name: endpoint_name.into(),
            inference_component: None,
            api_key_source: ApiKeySource::None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_inference_component(mut self, component: impl Into<String>) -> Self {
        self.inference_component = Some(component.into());
        self
    }

    pub fn with_api_key_source(mut self, source: ApiKeySource) -> Self {
        self.api_key_source = source;
        self
    }

    fn to_chat_messages(messages: &[Message]) -> Vec<ChatMessage> {
        messages.iter().map(|m| m.into()).collect()
    }

    fn to_chat_tools(tools: &[ToolDefinition]) -> Vec<ChatTool> {
        tools.iter().map(|t| t.into()).collect()
    }
}

#[async_trait]
impl LlmProvider for SageMakerProvider {
    fn name(&self) -> &str {
        "sagemaker"
    }

    fn model(&self) -> &str {
        &self.endpoint_name
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        options: &CompletionOptions,
    ) -> Result<CompletionResponse, LlmError> {
        let url = format!(
            "{}/endpoints/{}/invocations",
            self.base_url, self.endpoint_name
        );

        let request = ChatRequest {
            messages: Self::to_chat_messages(messages),
            tools: tools.map(Self::to_chat_tools),
            temperature: Some(options.temperature),
            max_tokens: options.max_tokens,
            stream: false,
        };

        debug!(
            endpoint = %self.endpoint_name,
            message_count = messages.len(),
            has_tools = tools.is_some(),
            "Sending completion request to SageMaker endpoint"
        );

        let mut req_builder = self.client.post(&url).json(&request);
        if let Some(component) = &self.inference_component {
            req_builder = req_builder.header(INFERENCE_COMPONENT_HEADER, component);
        }
        if let Some(api_key) = self.api_key_source.get_key().await? {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req_builder
            .timeout(options.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            LlmError::InvalidResponse(format!("Failed to parse SageMaker response: {}", e))
        })?;

        let choice = chat_response.choices.into_iter().next().ok_or_else(|| {
            LlmError::InvalidResponse("No choices in SageMaker response".to_string())
        })?;

        let has_tool_calls = choice
            .message
            .tool_calls
            .as_ref()
            .map(|tc| !tc.is_empty())
            .unwrap_or(false);

        let tool_calls = choice.message.tool_calls.map(|calls| {
            calls
                .into_iter()
                .map(|tc| ToolCall {
                    id: tc.id,
                    name: tc.function.name,
                    // Arguments arrive as a JSON string on this API.
                    arguments: serde_json::from_str(&tc.function.arguments)
                        .unwrap_or(serde_json::Value::Object(serde_json::Map::new())),
                })
                .collect()
        });

        let message = Message {
            role: MessageRole::Assistant,
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
            tool_call_id: None,
            tool_name: None,
        };

        let finish_reason = match choice.finish_reason.as_deref() {
            Some("tool_calls") => FinishReason::ToolCalls,
            Some("length") => FinishReason::MaxTokens,
            _ if has_tool_calls => FinishReason::ToolCalls,
            Some("stop") | None => FinishReason::Stop,
            Some(_) => FinishReason::Other,
        };

        let usage = chat_response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(CompletionResponse {
            message,
            finish_reason,
            usage,
        })
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        // Endpoints expose no metadata route; a one-token completion
        // verifies both reachability and a loaded model.
        let options = CompletionOptions {
            max_tokens: Some(1),
            timeout: std::time::Duration::from_secs(30),
            ..CompletionOptions::default()
        };
        self.complete(&[Message::user("ping")], None, &options)
            .await
            .map(|_| ())
    }
}

// OpenAI-compatible wire types

#[derive(Debug, Serialize)]
struct ChatRequest {
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ChatTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ChatToolCallRequest>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl From<&Message> for ChatMessage {
    fn from(msg: &Message) -> Self {
        let role = match msg.role {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        };

        ChatMessage {
            role: role.to_string(),
            content: if msg.content.is_empty() {
                None
            } else {
                Some(msg.content.clone())
            },
            tool_calls: msg.tool_calls.as_ref().map(|calls| {
                calls
                    .iter()
                    .map(|tc| ChatToolCallRequest {
                        id: tc.id.clone(),
                        r#type: "function".to_string(),
                        function: ChatFunctionCallRequest {
                            name: tc.name.clone(),
                            arguments: serde_json::to_string(&tc.arguments)
                                .unwrap_or_else(|_| "{}".to_string()),
                        },
                    })
                    .collect()
            }),
            tool_call_id: msg.tool_call_id.clone(),
            name: msg.tool_name.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatToolCallRequest {
    id: String,
    r#type: String,
    function: ChatFunctionCallRequest,
}

#[derive(Debug, Serialize)]
struct ChatFunctionCallRequest {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ChatTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: ChatFunctionDef,
}

impl From<&ToolDefinition> for ChatTool {
    fn from(def: &ToolDefinition) -> Self {
        ChatTool {
            tool_type: "function".to_string(),
            function: ChatFunctionDef {
                name: def.name.clone(),
                description: def.description.clone(),
                parameters: def.parameters.clone(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatFunctionDef {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ChatToolCallResponse>>,
}

#[derive(Debug, Deserialize)]
struct ChatToolCallResponse {
    id: String,
    function: ChatFunctionCallResponse,
}

#[derive(Debug, Deserialize)]
struct ChatFunctionCallResponse {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}
