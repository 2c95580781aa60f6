//! LLM provider trait and shared request plumbing.

use super::types::{CompletionResponse, Message};
use crate::agent::tools::ToolDefinition;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

/// Timeout for api_key_command execution.
const API_KEY_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Options for a completion request.
#[derive(Debug, Clone)]
pub struct CompletionOptions {
    /// Temperature for sampling (0.0 = deterministic, 1.0 = creative).
    pub temperature: f32,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
    /// Request timeout.
    pub timeout: Duration,
}

impl CompletionOptions {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: None,
            timeout: Duration::from_secs(120),
        }
    }
}

/// Errors that can occur when talking to a model backend.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Request timeout")]
    Timeout,

    #[error("Unknown model: {0}")]
    UnknownModel(String),
}

/// Trait for LLM backends.
///
/// One implementation per inference service, all presenting the same
/// conversation-plus-tools interface to the agent code.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// The backend's name (e.g. "bedrock", "sagemaker").
    fn name(&self) -> &str;

    /// The model or endpoint being used.
    fn model(&self) -> &str;

    /// Complete a conversation, optionally with tool support.
    ///
    /// The response may carry tool calls instead of (or alongside) text.
    async fn complete(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        options: &CompletionOptions,
    ) -> Result<CompletionResponse, LlmError>;

    /// Check that the backend is reachable and willing to serve us.
    async fn health_check(&self) -> Result<(), LlmError>;
}

/// Source of the bearer token sent to inference endpoints.
#[derive(Debug, Clone, Default)]
pub enum ApiKeySource {
    /// No authentication.
    #[default]
    None,
    /// Static API key.
    Static(String),
    /// Shell command that outputs the API key (for rotating tokens).
    Command(String),
}

impl ApiKeySource {
    /// Get the current API key, executing the command if necessary.
    pub async fn get_key(&self) -> Result<Option<String>, LlmError> {
        match self {
            ApiKeySource::None => Ok(None),
            ApiKeySource::Static(key) => Ok(Some(key.clone())),
            ApiKeySource::Command(cmd) => {
                debug!(command = %cmd, "Fetching API key via command");

                let result = tokio::time::timeout(
                    API_KEY_COMMAND_TIMEOUT,
                    Command::new("sh").arg("-c").arg(cmd).output(),
                )
                .await;

                let output = match result {
                    Ok(Ok(output)) => output,
                    Ok(Err(e)) => {
                        warn!(command = %cmd, error = %e, "api_key_command failed to execute");
                        return Err(LlmError::Connection(format!(
                            "Failed to execute api_key_command: {}",
                            e
                        )));
                    }
                    Err(_) => {
                        warn!(command = %cmd, "api_key_command timed out");
                        return Err(LlmError::Timeout);
                    }
                };

                if !output.status.success() {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    warn!(command = %cmd, stderr = %stderr, "api_key_command failed");
                    return Err(LlmError::Connection(format!(
                        "api_key_command failed with status {}: {}",
                        output.status, stderr
                    )));
                }

                let key = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if key.is_empty() {
                    warn!(command = %cmd, "api_key_command returned empty key");
                    return Err(LlmError::Connection(
                        "api_key_command returned empty key".to_string(),
                    ));
                }

                Ok(Some(key))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_key_is_returned_as_is() {
        let source = ApiKeySource::Static("sk-123".to_string());
        assert_eq!(source.get_key().await.unwrap(), Some("sk-123".to_string()));

        let source = ApiKeySource::None;
        assert_eq!(source.get_key().await.unwrap(), None);
    }

    #[tokio::test]
    async fn command_key_is_trimmed() {
        let source = ApiKeySource::Command("echo '  token-from-command  '".to_string());
        assert_eq!(
            source.get_key().await.unwrap(),
            Some("token-from-command".to_string())
        );
    }

    #[tokio::test]
    async fn failing_command_is_an_error() {
        let source = ApiKeySource::Command("exit 3".to_string());
        assert!(source.get_key().await.is_err());
    }

    #[test]
    fn default_options() {
        let options = CompletionOptions::default();
        assert_eq!(options.temperature, 0.3);
        assert_eq!(options.max_tokens, None);
        assert_eq!(options.timeout, Duration::from_secs(120));

        let options = options.with_temperature(0.0).with_max_tokens(32);
        assert_eq!(options.temperature, 0.0);
        assert_eq!(options.max_tokens, Some(32));
    }
}
