//! Personal knowledge base flow.
//!
//! Stores free-form facts and answers questions about what was stored.
//! Retrieval feeds the scored passages back through the LLM so the user
//! gets a conversational answer instead of raw search results.

use crate::agent::llm::{CompletionOptions, LlmError, LlmProvider, Message};
use crate::agent::trace::{truncate, AgentTrace, TraceStepKind};
use crate::knowledge::{KbError, KnowledgeBase, ScoredPassage};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use super::prompts;

pub const STORED_REPLY: &str = "✅ I've stored this information in your knowledge base.";
pub const MISSING_INFO_REPLY: &str =
    "I don't have any information about that stored in my knowledge base.";

#[derive(Debug, Error)]
pub enum FlowError {
    #[error(transparent)]
    Kb(#[from] KbError),

    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// The store/retrieve flow over the knowledge base collaborator.
pub struct KnowledgeFlow {
    llm: Arc<dyn LlmProvider>,
    kb: Arc<dyn KnowledgeBase>,
    max_results: usize,
    options: CompletionOptions,
}

impl KnowledgeFlow {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        kb: Arc<dyn KnowledgeBase>,
        max_results: usize,
        options: &CompletionOptions,
    ) -> Self {
        Self {
            llm,
            kb,
            max_results,
            options: options.clone(),
        }
    }

    /// Ingests the user's message verbatim as a new document.
    pub async fn store(
        &self,
        query: &str,
        trace: &mut AgentTrace,
    ) -> Result<String, FlowError> {
        trace.start_timer();
        self.kb.store(query).await?;
        trace.log_with_elapsed(TraceStepKind::Knowledge, "stored 1 document");
        debug!("Stored document in knowledge base");
        Ok(STORED_REPLY.to_string())
    }

    /// Searches the knowledge base and synthesizes an answer from the hits.
    /// An empty result set skips the synthesis call.
    pub async fn retrieve(
        &self,
        query: &str,
        trace: &mut AgentTrace,
    ) -> Result<String, FlowError> {
        trace.start_timer();
        let passages = self.kb.retrieve(query, self.max_results).await?;
        trace.log_with_elapsed(
            TraceStepKind::Knowledge,
            format!("retrieved {} passages", passages.len()),
        );

        if passages.is_empty() {
            return Ok(MISSING_INFO_REPLY.to_string());
        }

        let messages = vec![
            Message::system(prompts::KB_ANSWER),
            Message::user(format!(
                "User question: \"{}\"\n\nInformation from knowledge base:\n{}\n\nProvide a helpful answer based on this information:",
                query,
                format_passages(&passages)
            )),
        ];

        trace.start_timer();
        let response = self.llm.complete(&messages, None, &self.options).await?;
        let answer = clean_answer(&response.message.content);
        trace.log_with_elapsed(TraceStepKind::Thought, truncate(&answer, 200));
        Ok(answer)
    }
}

fn format_passages(passages: &[ScoredPassage]) -> String {
    passages
        .iter()
        .enumerate()
        .map(|(i, passage)| format!("{}. (score {:.4}) {}", i + 1, passage.score, passage.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Some models echo the "Response: " framing from the prompt examples.
fn clean_answer(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix("Response: ")
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistants::testing::{MockKnowledgeBase, ScriptedLlm};

    fn flow(llm: Arc<ScriptedLlm>, kb: Arc<MockKnowledgeBase>) -> KnowledgeFlow {
        KnowledgeFlow::new(llm, kb, 9, &CompletionOptions::default())
    }

    #[tokio::test]
    async fn test_store_confirms_and_keeps_the_text() {
        let llm = Arc::new(ScriptedLlm::new());
        let kb = Arc::new(MockKnowledgeBase::new());
        let mut trace = AgentTrace::new();

        let reply = flow(llm, kb.clone())
            .store("My cat is named Bob", &mut trace)
            .await
            .unwrap();

        assert_eq!(reply, STORED_REPLY);
        assert_eq!(kb.stored(), vec!["My cat is named Bob".to_string()]);
        assert_eq!(trace.steps()[0].kind, TraceStepKind::Knowledge);
    }

    #[tokio::test]
    async fn test_retrieve_synthesizes_from_passages() {
        let llm = Arc::new(ScriptedLlm::new());
        llm.push_text("Response: Your cat is named Bob.");
        let kb = Arc::new(
            MockKnowledgeBase::new()
                .with_passage("The user's cat is named Bob", 0.91)
                .with_passage("The user has one cat", 0.55),
        );
        let mut trace = AgentTrace::new();

        let reply = flow(llm.clone(), kb)
            .retrieve("what is my cat called?", &mut trace)
            .await
            .unwrap();

        assert_eq!(reply, "Your cat is named Bob.");

        let sent = llm.call(0);
        assert!(sent[0].content.contains("knowledge assistant"));
        assert!(sent[1].content.contains("User question: \"what is my cat called?\""));
        assert!(sent[1].content.contains("1. (score 0.9100) The user's cat is named Bob"));
        assert!(sent[1].content.contains("2. (score 0.5500) The user has one cat"));

        let kinds: Vec<_> = trace.steps().iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![TraceStepKind::Knowledge, TraceStepKind::Thought]);
    }

    #[tokio::test]
    async fn test_empty_retrieval_skips_the_llm() {
        let llm = Arc::new(ScriptedLlm::new());
        let kb = Arc::new(MockKnowledgeBase::new());
        let mut trace = AgentTrace::new();

        let reply = flow(llm.clone(), kb)
            .retrieve("what is my cat called?", &mut trace)
            .await
            .unwrap();

        assert_eq!(reply, MISSING_INFO_REPLY);
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let llm = Arc::new(ScriptedLlm::new());
        let kb = Arc::new(MockKnowledgeBase::failing());
        let mut trace = AgentTrace::new();

        let result = flow(llm, kb).store("remember this", &mut trace).await;
        assert!(matches!(result, Err(FlowError::Kb(_))));
    }

    #[test]
    fn test_clean_answer_strips_prefix_and_whitespace() {
        assert_eq!(clean_answer("\nResponse: Paris.\n"), "Paris.");
        assert_eq!(clean_answer("Paris."), "Paris.");
        assert_eq!(clean_answer("Response:Paris."), "Response:Paris.");
    }
}
