//! Top-level query routing.
//!
//! Every chat turn goes through two stages: a cheap classification that
//! decides between the teacher agent and the knowledge base, then the
//! chosen flow. Classification failures never fail the turn, they fall
//! back to the teacher.

use crate::agent::llm::{CompletionOptions, LlmProvider, Message};
use crate::agent::runner::{ToolLoopRunner, DEFAULT_MAX_ITERATIONS};
use crate::agent::tools::ToolRegistry;
use crate::agent::trace::{AgentTrace, TraceStep, TraceStepKind};
use crate::config::AppConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use super::knowledge::KnowledgeFlow;
use super::loan::{LOAN_ASSISTANT_DISPLAY_NAME, LOAN_ASSISTANT_NAME};
use super::prompts;
use super::subject::profile_by_name;

/// Turns of history replayed to the teacher agent.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Where a query was routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    Teacher,
    Knowledge,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Teacher => "teacher",
            Route::Knowledge => "knowledge",
        }
    }
}

/// What to do with a knowledge-base query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KbAction {
    Store,
    Retrieve,
}

impl KbAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            KbAction::Store => "store",
            KbAction::Retrieve => "retrieve",
        }
    }
}

/// Client-requested routing mode. Auto lets the classifier decide.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    #[default]
    Auto,
    Teacher,
    Knowledge,
}

impl ChatMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatMode::Auto => "auto",
            ChatMode::Teacher => "teacher",
            ChatMode::Knowledge => "knowledge",
        }
    }
}

/// Tunables shared by every turn the router handles.
#[derive(Debug, Clone)]
pub struct RouterSettings {
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub max_iterations: usize,
    pub history_limit: usize,
}

impl RouterSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Options for answer-generating completions.
    pub fn completion_options(&self) -> CompletionOptions {
        let options = CompletionOptions::default().with_temperature(self.temperature);
        match self.max_tokens {
            Some(max_tokens) => options.with_max_tokens(max_tokens),
            None => options,
        }
    }
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

/// One answered turn.
#[derive(Debug)]
pub struct RoutedReply {
    pub reply: String,
    pub route: Route,
    /// Display name of the specialist that produced the answer, when one did.
    pub assistant: Option<String>,
    /// Failure stage for metrics, None on success.
    pub failure: Option<&'static str>,
    pub trace: Vec<TraceStep>,
}

/// Routes chat turns between the teacher agent and the knowledge flow.
pub struct QueryRouter {
    llm: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    knowledge: KnowledgeFlow,
    settings: RouterSettings,
}

impl QueryRouter {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        knowledge: KnowledgeFlow,
        settings: RouterSettings,
    ) -> Self {
        Self {
            llm,
            tools,
            knowledge,
            settings,
        }
    }

    /// Options for the one-word classification calls. Deterministic and
    /// capped hard, anything past the first word is wasted.
    fn classifier_options(&self) -> CompletionOptions {
        CompletionOptions::default()
            .with_temperature(0.0)
            .with_max_tokens(16)
    }

    fn answer_options(&self) -> CompletionOptions {
        self.settings.completion_options()
    }

    async fn classify(
        &self,
        system_prompt: &str,
        query: &str,
    ) -> Result<String, crate::agent::llm::LlmError> {
        let messages = vec![
            Message::system(system_prompt),
            Message::user(format!("Query: {}", query)),
        ];
        let response = self
            .llm
            .complete(&messages, None, &self.classifier_options())
            .await?;
        Ok(response.message.content.to_lowercase())
    }

    /// Teacher or knowledge. Unclear or failed classifications go to the
    /// teacher, which can handle anything.
    async fn classify_route(&self, query: &str) -> Route {
        match self.classify(prompts::ROUTE_CLASSIFIER, query).await {
            Ok(text) if text.contains("knowledge") => Route::Knowledge,
            Ok(_) => Route::Teacher,
            Err(e) => {
                warn!(error = %e, "Route classification failed, defaulting to teacher");
                Route::Teacher
            }
        }
    }

    /// Store or retrieve. Unclear or failed classifications retrieve,
    /// which never destroys anything.
    async fn classify_kb_action(&self, query: &str) -> KbAction {
        match self.classify(prompts::KB_ACTION_CLASSIFIER, query).await {
            Ok(text) if text.contains("store") => KbAction::Store,
            Ok(_) => KbAction::Retrieve,
            Err(e) => {
                warn!(error = %e, "KB action classification failed, defaulting to retrieve");
                KbAction::Retrieve
            }
        }
    }

    /// Answers one turn. Errors come back as user-facing reply text, with
    /// the failure stage recorded for metrics.
    pub async fn answer(&self, history: &[Message], query: &str, mode: ChatMode) -> RoutedReply {
        let mut trace = AgentTrace::new();

        let route = match mode {
            ChatMode::Auto => {
                trace.start_timer();
                let route = self.classify_route(query).await;
                trace.log_with_elapsed(
                    TraceStepKind::Classification,
                    format!("routed to {}", route.as_str()),
                );
                route
            }
            ChatMode::Teacher => {
                trace.log(TraceStepKind::Classification, "mode forced to teacher");
                Route::Teacher
            }
            ChatMode::Knowledge => {
                trace.log(TraceStepKind::Classification, "mode forced to knowledge");
                Route::Knowledge
            }
        };
        debug!(route = route.as_str(), "Handling query");

        match route {
            Route::Knowledge => self.answer_knowledge(query, trace).await,
            Route::Teacher => self.answer_teacher(history, query, trace).await,
        }
    }

    async fn answer_knowledge(&self, query: &str, mut trace: AgentTrace) -> RoutedReply {
        trace.start_timer();
        let action = self.classify_kb_action(query).await;
        trace.log_with_elapsed(
            TraceStepKind::Classification,
            format!("knowledge action: {}", action.as_str()),
        );

        let (reply, failure) = match action {
            KbAction::Store => match self.knowledge.store(query, &mut trace).await {
                Ok(reply) => (reply, None),
                Err(e) => {
                    trace.log(TraceStepKind::Error, e.to_string());
                    (
                        format!("❌ Error storing information: {}", e),
                        Some("knowledge_store"),
                    )
                }
            },
            KbAction::Retrieve => match self.knowledge.retrieve(query, &mut trace).await {
                Ok(reply) => (reply, None),
                Err(e) => {
                    trace.log(TraceStepKind::Error, e.to_string());
                    (
                        format!("❌ Error retrieving information: {}", e),
                        Some("knowledge_retrieve"),
                    )
                }
            },
        };

        RoutedReply {
            reply,
            route: Route::Knowledge,
            assistant: None,
            failure,
            trace: trace.take_steps(),
        }
    }

    async fn answer_teacher(
        &self,
        history: &[Message],
        query: &str,
        mut trace: AgentTrace,
    ) -> RoutedReply {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(prompts::TEACHER_ORCHESTRATOR));
        let skip = history.len().saturating_sub(self.settings.history_limit);
        messages.extend_from_slice(&history[skip..]);
        messages.push(Message::user(query));

        let runner = ToolLoopRunner::new(self.llm.clone(), self.tools.clone())
            .with_max_iterations(self.settings.max_iterations)
            .with_completion_options(self.answer_options());

        match runner.run(messages, &mut trace).await {
            Ok(outcome) => RoutedReply {
                reply: outcome.reply,
                route: Route::Teacher,
                assistant: outcome.last_tool.as_deref().map(display_name_for_tool),
                failure: None,
                trace: trace.take_steps(),
            },
            Err(e) => {
                warn!(error = %e, "Teacher agent failed");
                trace.log(TraceStepKind::Error, e.to_string());
                RoutedReply {
                    reply: format!("❌ Error processing your question: {}", e),
                    route: Route::Teacher,
                    assistant: None,
                    failure: Some("teacher"),
                    trace: trace.take_steps(),
                }
            }
        }
    }
}

/// Maps a tool name to the name users see.
fn display_name_for_tool(name: &str) -> String {
    if name == LOAN_ASSISTANT_NAME {
        return LOAN_ASSISTANT_DISPLAY_NAME.to_string();
    }
    match profile_by_name(name) {
        Some(profile) => profile.display_name.to_string(),
        None => name.to_string(),
    }
}
