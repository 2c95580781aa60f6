//! LLM provider abstraction layer.
//!
//! A trait-based seam over the inference backends (Bedrock converse,
//! SageMaker endpoints), plus the catalog/factory that turns a model key
//! into a ready provider.

mod bedrock;
mod factory;
mod provider;
mod sagemaker;
mod types;

pub use bedrock::BedrockProvider;
pub use factory::{HttpLlmFactory, LlmFactory, ModelSpec, ProviderKind};
pub use provider::{ApiKeySource, CompletionOptions, LlmError, LlmProvider};
pub use sagemaker::SageMakerProvider;
pub use types::{CompletionResponse, FinishReason, Message, MessageRole, TokenUsage, ToolCall};
