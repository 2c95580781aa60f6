//! Scripted collaborators wired into the test server
//!
//! The server under test talks to an LLM, a knowledge base and a scoring
//! endpoint. Each gets an in-memory double here, scriptable from the test
//! body through the handles `TestServer::spawn()` returns.

use super::constants::*;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use teachassist::agent::llm::{
    CompletionOptions, CompletionResponse, FinishReason, LlmError, LlmProvider, Message, ModelSpec,
    ProviderKind, ToolCall,
};
use teachassist::agent::tools::ToolDefinition;
use teachassist::config::{AppConfig, CliConfig, EnvOverrides};
use teachassist::knowledge::{KbError, KnowledgeBase, ScoredPassage};
use teachassist::scoring::{ScoreError, Scorer};
use teachassist::LlmFactory;

/// Configuration with every default in place. Deliberately ignores the
/// host environment so test runs are reproducible.
pub fn test_app_config() -> AppConfig {
    AppConfig::resolve(&CliConfig::default(), None, &EnvOverrides::default())
        .expect("Failed to resolve test config")
}

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

    /// Queues a plain text completion.
    pub fn push_text(&self, content: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(CompletionResponse {
                message: Message::assistant(content),
                finish_reason: FinishReason::Stop,
                usage: None,
            }));
    }

    /// Queues a completion that requests one tool call.
    pub fn push_tool_call(&self, name: &str, query: &str) {
        let call = ToolCall {
            id: format!("call_{}", name),
            name: name.to_string(),
            arguments: serde_json::json!({ "query": query }),
        };
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(CompletionResponse {
                message: Message::assistant_with_tools("", vec![call]),
                finish_reason: FinishReason::ToolCalls,
                usage: None,
            }));
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
        TEST_MODEL_ID
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

/// Factory serving a one-model catalog backed by the shared scripted LLM.
pub struct ScriptedFactory {
    catalog: Vec<ModelSpec>,
    llm: Arc<ScriptedLlm>,
}

impl ScriptedFactory {
    pub fn new(llm: Arc<ScriptedLlm>) -> Self {
        Self {
            catalog: vec![ModelSpec {
                key: TEST_MODEL_KEY.to_string(),
                display_name: TEST_MODEL_NAME.to_string(),
                provider: ProviderKind::Bedrock,
                model_id: TEST_MODEL_ID.to_string(),
            }],
            llm,
        }
    }
}

impl LlmFactory for ScriptedFactory {
    fn catalog(&self) -> &[ModelSpec] {
        &self.catalog
    }

    fn default_key(&self) -> &str {
        TEST_MODEL_KEY
    }

    fn create(&self, key: &str) -> Result<Arc<dyn LlmProvider>, LlmError> {
        if self.spec(key).is_none() {
            return Err(LlmError::UnknownModel(key.to_string()));
        }
        Ok(self.llm.clone())
    }
}

/// In-memory knowledge base, configurable after the server is up.
pub struct MockKnowledgeBase {
    passages: Mutex<Vec<ScoredPassage>>,
    stored: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl MockKnowledgeBase {
    pub fn new() -> Self {
        Self {
            passages: Mutex::new(Vec::new()),
            stored: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// Adds a passage future retrievals will return.
    pub fn add_passage(&self, text: &str, score: f64) {
        self.passages.lock().unwrap().push(ScoredPassage {
            text: text.to_string(),
            score,
        });
    }

    /// Texts stored through the server so far.
    pub fn stored(&self) -> Vec<String> {
        self.stored.lock().unwrap().clone()
    }

    /// Makes every store and retrieve fail from now on.
    pub fn set_failing(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    fn fail(&self) -> bool {
        self.failing.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KnowledgeBase for MockKnowledgeBase {
    async fn store(&self, text: &str) -> Result<(), KbError> {
        if self.fail() {
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
        if self.fail() {
            return Err(KbError::Connection("knowledge base unreachable".to_string()));
        }
        Ok(self
            .passages
            .lock()
            .unwrap()
            .iter()
            .take(max_results)
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> Result<(), KbError> {
        Ok(())
    }
}

/// Scorer double returning a fixed score and recording payloads.
pub struct MockScorer {
    score: Mutex<f64>,
    failing: AtomicBool,
    payloads: Mutex<Vec<String>>,
}

impl MockScorer {
    pub fn new() -> Self {
        Self {
            score: Mutex::new(0.82),
            failing: AtomicBool::new(false),
            payloads: Mutex::new(Vec::new()),
        }
    }

    pub fn set_score(&self, score: f64) {
        *self.score.lock().unwrap() = score;
    }

    /// Makes every scoring call fail from now on.
    pub fn set_failing(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Payloads scored through the server so far.
    pub fn scored_payloads(&self) -> Vec<String> {
        self.payloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl Scorer for MockScorer {
    async fn score(&self, features: &str) -> Result<f64, ScoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ScoreError::Connection(
                "scoring endpoint unreachable".to_string(),
            ));
        }
        self.payloads.lock().unwrap().push(features.to_string());
        Ok(*self.score.lock().unwrap())
    }

    async fn health_check(&self) -> Result<(), ScoreError> {
        Ok(())
    }
}
