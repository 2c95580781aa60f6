//! Bounded tool-call loop.

use crate::agent::llm::{CompletionOptions, LlmError, LlmProvider, Message};
use crate::agent::tools::ToolRegistry;
use crate::agent::trace::{truncate, AgentTrace, TraceStepKind};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Iterations allowed before the loop gives up. One iteration is one
/// completion plus the tool calls it requested.
pub const DEFAULT_MAX_ITERATIONS: usize = 5;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Gave up after {0} tool iterations")]
    MaxIterationsExceeded(usize),
}

/// Outcome of a completed loop.
#[derive(Debug)]
pub struct RunOutcome {
    /// Final assistant text.
    pub reply: String,
    /// Last tool that ran, when any did.
    pub last_tool: Option<String>,
}

/// Drives a conversation with tool support until the model answers in
/// plain text.
///
/// Tool failures are not fatal: the error text goes back to the model as
/// the tool result, and the model decides how to carry on.
pub struct ToolLoopRunner {
    llm: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    max_iterations: usize,
    completion_options: CompletionOptions,
}

impl ToolLoopRunner {
    pub fn new(llm: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            llm,
            tools,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            completion_options: CompletionOptions::default(),
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_completion_options(mut self, options: CompletionOptions) -> Self {
        self.completion_options = options;
        self
    }

    pub async fn run(
        &self,
        mut messages: Vec<Message>,
        trace: &mut AgentTrace,
    ) -> Result<RunOutcome, RunnerError> {
        let definitions = self.tools.definitions();
        let tools = if definitions.is_empty() {
            None
        } else {
            Some(definitions.as_slice())
        };

        let mut last_tool = None;
        for iteration in 1..=self.max_iterations {
            trace.start_timer();
            let response = self
                .llm
                .complete(&messages, tools, &self.completion_options)
                .await?;
            trace.log_with_elapsed(
                TraceStepKind::Thought,
                format!(
                    "iteration {}: {}",
                    iteration,
                    truncate(&response.message.content, 200)
                ),
            );

            messages.push(response.message.clone());

            let tool_calls = match &response.message.tool_calls {
                Some(calls) if !calls.is_empty() => calls.clone(),
                _ => {
                    return Ok(RunOutcome {
                        reply: response.message.content,
                        last_tool,
                    })
                }
            };

            for tool_call in tool_calls {
                debug!(tool = %tool_call.name, "Executing tool call");
                trace.log(
                    TraceStepKind::ToolCall,
                    format!("{} {}", tool_call.name, tool_call.arguments),
                );
                trace.start_timer();

                let content = match self.tools.execute(&tool_call.name, &tool_call.arguments).await
                {
                    Ok(content) => content,
                    Err(e) => {
                        warn!(tool = %tool_call.name, error = %e, "Tool call failed");
                        format!("Error: {}", e)
                    }
                };

                trace.log_with_elapsed(
                    TraceStepKind::ToolResult,
                    format!("{}: {}", tool_call.name, truncate(&content, 200)),
                );

                messages.push(Message::tool_response(
                    &tool_call.id,
                    &tool_call.name,
                    &content,
                ));
                last_tool = Some(tool_call.name);
            }
        }

        warn!(
            max_iterations = self.max_iterations,
            "Tool loop exhausted its iteration budget"
        );
        Err(RunnerError::MaxIterationsExceeded(self.max_iterations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::llm::{CompletionResponse, FinishReason, ToolCall};
    use crate::agent::tools::{query_argument, AgentTool, ToolDefinition, ToolError};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedLlm {
        responses: Mutex<VecDeque<CompletionResponse>>,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<CompletionResponse>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
            }
        }

        fn text(content: &str) -> CompletionResponse {
            CompletionResponse {
                message: Message::assistant(content),
                finish_reason: FinishReason::Stop,
                usage: None,
            }
        }

        fn tool_call(name: &str, query: &str) -> CompletionResponse {
            let call = ToolCall {
                id: format!("call_{}", name),
                name: name.to_string(),
                arguments: serde_json::json!({"query": query}),
            };
            CompletionResponse {
                message: Message::assistant_with_tools("", vec![call]),
                finish_reason: FinishReason::ToolCalls,
                usage: None,
            }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            _messages: &[Message],
            _tools: Option<&[ToolDefinition]>,
            _options: &CompletionOptions,
        ) -> Result<CompletionResponse, LlmError> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| LlmError::InvalidResponse("script exhausted".to_string()))
        }

        async fn health_check(&self) -> Result<(), LlmError> {
            Ok(())
        }
    }

    struct EchoTool;

    #[async_trait]
    impl AgentTool for EchoTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition::query_tool("math_assistant", "Answers math questions")
        }

        async fn execute(&self, args: &serde_json::Value) -> Result<String, ToolError> {
            Ok(format!("answer to {}", query_argument(args)?))
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        Arc::new(registry)
    }

    #[tokio::test]
    async fn test_plain_answer_ends_the_loop() {
        let llm = Arc::new(ScriptedLlm::new(vec![ScriptedLlm::text("The answer is 4.")]));
        let runner = ToolLoopRunner::new(llm, registry());
        let mut trace = AgentTrace::new();

        let outcome = runner
            .run(vec![Message::user("What is 2+2?")], &mut trace)
            .await
            .unwrap();

        assert_eq!(outcome.reply, "The answer is 4.");
        assert!(outcome.last_tool.is_none());
        assert_eq!(trace.len(), 1);
    }

    #[tokio::test]
    async fn test_tool_call_round_trip() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            ScriptedLlm::tool_call("math_assistant", "2+2"),
            ScriptedLlm::text("It is 4."),
        ]));
        let runner = ToolLoopRunner::new(llm, registry());
        let mut trace = AgentTrace::new();

        let outcome = runner
            .run(vec![Message::user("What is 2+2?")], &mut trace)
            .await
            .unwrap();

        assert_eq!(outcome.reply, "It is 4.");
        assert_eq!(outcome.last_tool.as_deref(), Some("math_assistant"));
        // Thought, ToolCall, ToolResult, Thought.
        assert_eq!(trace.len(), 4);
        assert_eq!(trace.steps()[1].kind, TraceStepKind::ToolCall);
    }

    #[tokio::test]
    async fn test_unknown_tool_error_feeds_back_to_the_model() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            ScriptedLlm::tool_call("chemistry_assistant", "what is water?"),
            ScriptedLlm::text("I cannot use that tool, but water is H2O."),
        ]));
        let runner = ToolLoopRunner::new(llm, registry());
        let mut trace = AgentTrace::new();

        let outcome = runner
            .run(vec![Message::user("What is water?")], &mut trace)
            .await
            .unwrap();

        assert_eq!(outcome.reply, "I cannot use that tool, but water is H2O.");
        assert!(trace.steps()[2].detail.contains("Tool not found"));
    }

    #[tokio::test]
    async fn test_iteration_budget_is_enforced() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            ScriptedLlm::tool_call("math_assistant", "a"),
            ScriptedLlm::tool_call("math_assistant", "b"),
            ScriptedLlm::tool_call("math_assistant", "c"),
        ]));
        let runner = ToolLoopRunner::new(llm, registry()).with_max_iterations(2);
        let mut trace = AgentTrace::new();

        let result = runner.run(vec![Message::user("loop")], &mut trace).await;
        assert!(matches!(result, Err(RunnerError::MaxIterationsExceeded(2))));
    }
}
