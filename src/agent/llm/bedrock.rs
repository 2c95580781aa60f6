//! Amazon Bedrock LLM provider implementation.
//!
//! Talks to the Bedrock runtime Converse API, which works across every
//! hosted model family (Nova, Claude, ...) with the same request shape.

use super::provider::{ApiKeySource, CompletionOptions, LlmError, LlmProvider};
use super::types::{CompletionResponse, FinishReason, Message, MessageRole, TokenUsage, ToolCall};
use crate::agent::tools::ToolDefinition;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Amazon Bedrock provider.
///
/// Connects to the regional `bedrock-runtime` endpoint and uses the
/// `/model/{modelId}/converse` route for completions with tool support.
pub struct BedrockProvider {
    client: Client,
    base_url: String,
    model_id: String,
    api_key_source: ApiKeySource,
}

impl BedrockProvider {
    /// Create a provider for a model in a region, e.g.
    /// `BedrockProvider::new("us-east-1", "us.amazon.nova-pro-v1:0")`.
    pub fn new(region: impl AsRef<str>, model_id: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: format!("https://bedrock-runtime.{}.amazonaws.com", region.as_ref()),
            model_id: model_id.into(),
            api_key_source: ApiKeySource::None,
        }
    }

    /// Point the provider at a non-standard runtime URL (proxies, local
    /// emulators, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_key_source(mut self, source: ApiKeySource) -> Self {
        self.api_key_source = source;
        self
    }

    /// Split our conversation into Bedrock's shape: system turns become
    /// standalone system blocks, tool results ride in user turns, and
    /// consecutive tool results collapse into a single user turn.
    fn to_converse_messages(messages: &[Message]) -> (Vec<SystemBlock>, Vec<ConverseMessage>) {
        let mut system = Vec::new();
        let mut converted: Vec<ConverseMessage> = Vec::new();

        for message in messages {
            match message.role {
                MessageRole::System => system.push(SystemBlock {
                    text: message.content.clone(),
                }),
                MessageRole::User => converted.push(ConverseMessage {
                    role: "user".to_string(),
                    content: vec![ContentBlock::text(&message.content)],
                }),
                MessageRole::Assistant => {
                    let mut content = Vec::new();
                    if !message.content.is_empty() {
                        content.push(ContentBlock::text(&message.content));
                    }
                    for call in message.tool_calls.iter().flatten() {
                        content.push(ContentBlock::tool_use(call));
                    }
                    if content.is_empty() {
                        content.push(ContentBlock::text(""));
                    }
                    converted.push(ConverseMessage {
                        role: "assistant".to_string(),
                        content,
                    });
                }
                MessageRole::Tool => {
                    let block = ContentBlock::tool_result(
                        message.tool_call_id.as_deref().unwrap_or_default(),
                        &message.content,
                    );
                    match converted.last_mut() {
                        Some(last) if last.role == "user" && last.is_tool_results() => {
                            last.content.push(block)
                        }
                        _ => converted.push(ConverseMessage {
                            role: "user".to_string(),
                            content: vec![block],
                        }),
                    }
                }
            }
        }

        (system, converted)
    }

    fn to_converse_tools(tools: &[ToolDefinition]) -> ToolConfig {
        ToolConfig {
            tools: tools.iter().map(|t| t.into()).collect(),
        }
    }
}

#[async_trait]
impl LlmProvider for BedrockProvider {
    fn name(&self) -> &str {
        "bedrock"
    }

    fn model(&self) -> &str {
        &self.model_id
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        options: &CompletionOptions,
    ) -> Result<CompletionResponse, LlmError> {
        let url = format!("{}/model/{}/converse", self.base_url, self.model_id);

        let (system, converse_messages) = Self::to_converse_messages(messages);
        let request = ConverseRequest {
            messages: converse_messages,
            system,
            inference_config: InferenceConfig {
                temperature: Some(options.temperature),
                max_tokens: options.max_tokens,
            },
            tool_config: tools.map(Self::to_converse_tools),
        };

        debug!(
            model = %self.model_id,
            message_count = messages.len(),
            has_tools = tools.is_some(),
            "Sending converse request to Bedrock"
        );

        let mut req_builder = self.client.post(&url).json(&request);
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

        let converse_response: ConverseResponse = response.json().await.map_err(|e| {
            LlmError::InvalidResponse(format!("Failed to parse Bedrock response: {}", e))
        })?;

        let mut text_parts = Vec::new();
        let mut tool_calls = Vec::new();
        for block in converse_response.output.message.content {
            if let Some(text) = block.text {
                text_parts.push(text);
            }
            if let Some(tool_use) = block.tool_use {
                tool_calls.push(ToolCall {
                    id: tool_use.tool_use_id,
                    name: tool_use.name,
                    arguments: tool_use.input,
                });
            }
        }

        let has_tool_calls = !tool_calls.is_empty();
        let message = Message {
            role: MessageRole::Assistant,
            content: text_parts.join("\n"),
            tool_calls: has_tool_calls.then_some(tool_calls),
            tool_call_id: None,
            tool_name: None,
        };

        let finish_reason = match converse_response.stop_reason.as_deref() {
            Some("tool_use") => FinishReason::ToolCalls,
            Some("max_tokens") => FinishReason::MaxTokens,
            Some("end_turn") | Some("stop_sequence") => FinishReason::Stop,
            _ if has_tool_calls => FinishReason::ToolCalls,
            Some(_) => FinishReason::Other,
            None => FinishReason::Stop,
        };

        let usage = converse_response.usage.map(|u| TokenUsage {
            prompt_tokens: u.input_tokens,
            completion_tokens: u.output_tokens,
            total_tokens: u.total_tokens,
        });

        debug!(
            finish_reason = ?finish_reason,
            has_tool_calls = has_tool_calls,
            "Received converse response from Bedrock"
        );

        Ok(CompletionResponse {
            message,
            finish_reason,
            usage,
        })
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        // The runtime plane has no listing endpoint, so probe with a
        // one-token completion.
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

// Bedrock Converse API types

#[derive(Debug, Serialize)]
struct ConverseRequest {
    messages: Vec<ConverseMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    system: Vec<SystemBlock>,
    #[serde(rename = "inferenceConfig")]
    inference_config: InferenceConfig,
    #[serde(rename = "toolConfig", skip_serializing_if = "Option::is_none")]
    tool_config: Option<ToolConfig>,
}

#[derive(Debug, Serialize)]
struct SystemBlock {
    text: String,
}

#[derive(Debug, Serialize)]
struct InferenceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(rename = "maxTokens", skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ConverseMessage {
    role: String,
    content: Vec<ContentBlock>,
}

impl ConverseMessage {
    fn is_tool_results(&self) -> bool {
        self.content.iter().all(|block| block.tool_result.is_some())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ContentBlock {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "toolUse", skip_serializing_if = "Option::is_none")]
    tool_use: Option<ToolUseBlock>,
    #[serde(rename = "toolResult", skip_serializing_if = "Option::is_none")]
    tool_result: Option<ToolResultBlock>,
}

impl ContentBlock {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Self::default()
        }
    }

    fn tool_use(call: &ToolCall) -> Self {
        Self {
            tool_use: Some(ToolUseBlock {
                tool_use_id: call.id.clone(),
                name: call.name.clone(),
                input: call.arguments.clone(),
            }),
            ..Self::default()
        }
    }

    fn tool_result(tool_use_id: &str, content: &str) -> Self {
        Self {
            tool_result: Some(ToolResultBlock {
                tool_use_id: tool_use_id.to_string(),
                content: vec![ToolResultContent {
                    text: content.to_string(),
                }],
            }),
            ..Self::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ToolUseBlock {
    #[serde(rename = "toolUseId")]
    tool_use_id: String,
    name: String,
    input: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct ToolResultBlock {
    #[serde(rename = "toolUseId")]
    tool_use_id: String,
    content: Vec<ToolResultContent>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ToolResultContent {
    text: String,
}

#[derive(Debug, Serialize)]
struct ToolConfig {
    tools: Vec<ConverseTool>,
}

#[derive(Debug, Serialize)]
struct ConverseTool {
    #[serde(rename = "toolSpec")]
    tool_spec: ToolSpec,
}

impl From<&ToolDefinition> for ConverseTool {
    fn from(def: &ToolDefinition) -> Self {
        ConverseTool {
            tool_spec: ToolSpec {
                name: def.name.clone(),
                description: def.description.clone(),
                input_schema: InputSchema {
                    json: def.parameters.clone(),
                },
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct ToolSpec {
    name: String,
    description: String,
    #[serde(rename = "inputSchema")]
    input_schema: InputSchema,
}

#[derive(Debug, Serialize)]
struct InputSchema {
    json: Value,
}

#[derive(Debug, Deserialize)]
struct ConverseResponse {
    output: ConverseOutput,
    #[serde(rename = "stopReason", default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<ConverseUsage>,
}

#[derive(Debug, Deserialize)]
struct ConverseOutput {
    message: ConverseMessage,
}

#[derive(Debug, Deserialize)]
struct ConverseUsage {
    #[serde(rename = "inputTokens")]
    input_tokens: u32,
    #[serde(rename = "outputTokens")]
    output_tokens: u32,
    #[serde(rename = "totalTokens")]
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_turns_become_system_blocks() {
        let messages = vec![
            Message::system("You are a teacher"),
            Message::user("What is 2+2?"),
        ];
        let (system, converse) = BedrockProvider::to_converse_messages(&messages);
        assert_eq!(system.len(), 1);
        assert_eq!(system[0].text, "You are a teacher");
        assert_eq!(converse.len(), 1);
        assert_eq!(converse[0].role, "user");
        assert_eq!(converse[0].content[0].text.as_deref(), Some("What is 2+2?"));
    }

    #[test]
    fn test_tool_results_collapse_into_one_user_turn() {
        let calls = vec![
            ToolCall {
                id: "a".to_string(),
                name: "math_assistant".to_string(),
                arguments: serde_json::json!({"query": "2+2"}),
            },
            ToolCall {
                id: "b".to_string(),
                name: "english_assistant".to_string(),
                arguments: serde_json::json!({"query": "define noun"}),
            },
        ];
        let messages = vec![
            Message::user("Help"),
            Message::assistant_with_tools("", calls),
            Message::tool_response("a", "math_assistant", "4"),
            Message::tool_response("b", "english_assistant", "A noun names a thing"),
        ];
        let (_, converse) = BedrockProvider::to_converse_messages(&messages);

        assert_eq!(converse.len(), 3);
        assert_eq!(converse[1].role, "assistant");
        assert_eq!(converse[1].content.len(), 2);
        assert!(converse[1].content[0].tool_use.is_some());
        assert_eq!(converse[2].role, "user");
        assert_eq!(converse[2].content.len(), 2);
        assert!(converse[2].content.iter().all(|b| b.tool_result.is_some()));
    }

    #[test]
    fn test_tool_definition_conversion() {
        let def = ToolDefinition::new(
            "math_assistant",
            "Answer math questions",
            serde_json::json!({
                "type": "object",
                "properties": {"query": {"type": "string"}},
                "required": ["query"]
            }),
        );
        let tool: ConverseTool = (&def).into();
        assert_eq!(tool.tool_spec.name, "math_assistant");
        assert_eq!(tool.tool_spec.input_schema.json["type"], "object");
    }

    #[test]
    fn test_response_parsing() {
        let raw = serde_json::json!({
            "output": {"message": {
                "role": "assistant",
                "content": [
                    {"text": "Let me check."},
                    {"toolUse": {"toolUseId": "t1", "name": "math_assistant", "input": {"query": "2+2"}}}
                ]
            }},
            "stopReason": "tool_use",
            "usage": {"inputTokens": 10, "outputTokens": 5, "totalTokens": 15}
        });
        let parsed: ConverseResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.stop_reason.as_deref(), Some("tool_use"));
        assert_eq!(parsed.output.message.content.len(), 2);
        assert_eq!(parsed.usage.unwrap().total_tokens, 15);
    }
}
