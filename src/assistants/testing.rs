//! Scripted collaborators for assistant tests.

use crate::agent::llm::{
    CompletionOptions, CompletionResponse, FinishReason, LlmError, LlmProvider, Message, ToolCall,
};
use crate::agent::tools::ToolDefinition;
use crate::knowledge::{KbError, KnowledgeBase, ScoredPassage};
use crate::scoring::{ScoreError, Scorer};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// LLM double that replays pushed responses in order and records every
/// request it gets.
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<Result<CompletionResponse, LlmError>>>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn push_text(&self, content: &str) {
        self.responses.lock().unwrap().push_back(Ok(CompletionResponse {
            message: Message::assistant(content),
            finish_reason: FinishReason::Stop,
            usage: None,
        }));
    }

    pub fn push_tool_call(&self, name: &str, query: &str) {
        let call = ToolCall {
            id: format!("call_{}", name),
            name: name.to_string(),
            arguments: serde_json::json!({ "query": query }),
        };
        self.responses.lock().unwrap().push_back(Ok(CompletionResponse {
            message: Message::assistant_with_tools("", vec![call]),
            finish_reason: FinishReason::ToolCalls,
            usage: None,
        }));
    }

    pub fn push_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Messages sent in the n-th completion request.
    pub fn call(&self, index: usize) -> Vec<Message> {
        self.calls.lock().unwrap()[index].clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
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
        messages: &[Message],
        _tools: Option<&[ToolDefinition]>,
        _options: &CompletionOptions,
    ) -> Result<CompletionResponse, LlmError> {
        self.calls.lock().unwrap().push(messages.to_vec());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Connection("script exhausted".to_string())))
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        Ok(())
    }
}

/// In-memory knowledge base double.
pub struct MockKnowledgeBase {
    passages: Vec<ScoredPassage>,
    stored: Mutex<Vec<String>>,
    failing: bool,
}

impl MockKnowledgeBase {
    pub fn new() -> Self {
        Self {
            passages: Vec::new(),
            stored: Mutex::new(Vec::new()),
            failing: false,
        }
    }

    /// Every retrieval errors, as does every store.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::new()
        }
    }

    pub fn with_passage(mut self, text: &str, score: f64) -> Self {
        self.passages.push(ScoredPassage {
            text: text.to_string(),
            score,
        });
        self
    }

    pub fn stored(&self) -> Vec<String> {
        self.stored.lock().unwrap().clone()
    }
}

#[async_trait]
impl KnowledgeBase for MockKnowledgeBase {
    async fn store(&self, text: &str) -> Result<(), KbError> {
        if self.failing {
            return Err(KbError::Connection("knowledge base unreachable".to_string()));
        }
        self.stored.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn retrieve(
        &self,
        _query: &str,
        max_results: usize,
    ) -> Result<Vec<ScoredPassage>, KbError> {
        if self.failing {
            return Err(KbError::Connection("knowledge base unreachable".to_string()));
        }
        Ok(self.passages.iter().take(max_results).cloned().collect())
    }

    async fn health_check(&self) -> Result<(), KbError> {
        if self.failing {
            return Err(KbError::Connection("knowledge base unreachable".to_string()));
        }
        Ok(())
    }
}

/// Scorer double returning a fixed score and recording payloads.
pub struct MockScorer {
    score: f64,
    failing: bool,
    payloads: Mutex<Vec<String>>,
}

impl MockScorer {
    pub fn with_score(score: f64) -> Self {
        Self {
            score,
            failing: false,
            payloads: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::with_score(0.0)
        }
    }

    pub fn scored_payloads(&self) -> Vec<String> {
        self.payloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl Scorer for MockScorer {
    async fn score(&self, features: &str) -> Result<f64, ScoreError> {
        if self.failing {
            return Err(ScoreError::Connection("scoring endpoint unreachable".to_string()));
        }
        self.payloads.lock().unwrap().push(features.to_string());
        Ok(self.score)
    }

    async fn health_check(&self) -> Result<(), ScoreError> {
        if self.failing {
            return Err(ScoreError::Connection("scoring endpoint unreachable".to_string()));
        }
        Ok(())
    }
}
