//! Common types for LLM conversations.

use serde::{Deserialize, Serialize};

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A single turn in a conversation with a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    /// Tool calls requested by the assistant (if role is Assistant).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// ID of the tool call this message responds to (if role is Tool).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Name of the tool (if role is Tool).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            tool_name: None,
        }
    }

    /// An assistant turn that requests tool calls.
    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            tool_calls: Some(tool_calls),
            tool_call_id: None,
            tool_name: None,
        }
    }

    /// A tool result turn, answering a specific tool call.
    pub fn tool_response(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            role: MessageRole::Tool,
            content: content.into(),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
            tool_name: Some(tool_name.into()),
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().map(|calls| !calls.is_empty()).unwrap_or(false)
    }
}

/// A tool call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Arguments for the tool, as a JSON object.
    pub arguments: serde_json::Value,
}

/// Response to a completion request.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// The assistant's turn, possibly carrying tool calls.
    pub message: Message,
    pub finish_reason: FinishReason,
    /// Token accounting, when the backend reports it.
    pub usage: Option<TokenUsage>,
}

/// Why a completion stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// Natural end of response.
    Stop,
    /// Model wants to call tools.
    ToolCalls,
    /// Hit the maximum token limit.
    MaxTokens,
    /// The backend reported something else.
    Other,
}

#[derive(Debug, Clone, Copy)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        let sys = Message::system("You are a patient teacher");
        assert_eq!(sys.role, MessageRole::System);
        assert_eq!(sys.content, "You are a patient teacher");

        let user = Message::user("What is a prime number?");
        assert_eq!(user.role, MessageRole::User);
        assert!(!user.has_tool_calls());

        let tool_calls = vec![ToolCall {
            id: "call_1".to_string(),
            name: "math_assistant".to_string(),
            arguments: serde_json::json!({"query": "what is a prime number?"}),
        }];
        let asst = Message::assistant_with_tools("", tool_calls);
        assert!(asst.has_tool_calls());

        let tool_resp = Message::tool_response("call_1", "math_assistant", "A prime number is...");
        assert_eq!(tool_resp.role, MessageRole::Tool);
        assert_eq!(tool_resp.tool_call_id, Some("call_1".to_string()));
        assert_eq!(tool_resp.tool_name, Some("math_assistant".to_string()));
    }

    #[test]
    fn test_roles_serialize_lowercase() {
        let serialized = serde_json::to_string(&Message::user("Hi")).unwrap();
        assert_eq!(serialized, r#"{"role":"user","content":"Hi"}"#);
    }
}
