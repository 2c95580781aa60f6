//! Agent infrastructure for LLM-powered features.
//!
//! This module provides the generic pieces the assistants are built on:
//! - LLM provider abstraction (Bedrock converse, SageMaker endpoints)
//! - Tool registry for agent capabilities
//! - A bounded tool-call loop
//! - Per-turn execution traces for observability

pub mod llm;
pub mod runner;
pub mod tools;
pub mod trace;

pub use llm::{
    CompletionOptions, CompletionResponse, LlmError, LlmFactory, LlmProvider, Message, MessageRole,
};
pub use runner::{RunOutcome, RunnerError, ToolLoopRunner, DEFAULT_MAX_ITERATIONS};
pub use tools::{AgentTool, ToolDefinition, ToolError, ToolRegistry};
pub use trace::{AgentTrace, TraceStep, TraceStepKind};
