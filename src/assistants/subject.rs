//! Subject specialists: tools that answer by running a nested completion
//! with a subject-specific system prompt.

use crate::agent::llm::{CompletionOptions, LlmProvider, Message};
use crate::agent::tools::{query_argument, AgentTool, ToolDefinition, ToolError};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use super::prompts;

/// Static description of one subject specialist.
pub struct SubjectProfile {
    /// Tool name the orchestrator calls.
    pub name: &'static str,
    /// Name shown to users.
    pub display_name: &'static str,
    /// Tool description handed to the orchestrator model.
    pub description: &'static str,
    pub system_prompt: &'static str,
    /// Instructions prepended to the student's query.
    pub preamble: &'static str,
    /// Reply used when the model comes back empty.
    pub fallback: &'static str,
    /// Topic name used in error replies.
    pub error_topic: &'static str,
}

pub const SUBJECT_PROFILES: &[SubjectProfile] = &[
    SubjectProfile {
        name: "math_assistant",
        display_name: "Math Assistant",
        description: "Process and respond to math-related queries: calculations, equations, and mathematical concepts.",
        system_prompt: prompts::MATH,
        preamble: "Please solve the following mathematical problem, showing all steps and explaining concepts clearly: ",
        fallback: "I apologize, but I couldn't solve this mathematical problem. Please check if the problem is stated clearly or try rephrasing it.",
        error_topic: "math",
    },
    SubjectProfile {
        name: "english_assistant",
        display_name: "English Assistant",
        description: "Process and respond to English language, literature, and writing-related queries.",
        system_prompt: prompts::ENGLISH,
        preamble: "Analyze and respond to this English language or literature question, providing clear explanations with examples where appropriate: ",
        fallback: "I apologize, but I couldn't properly analyze your English language question. Could you please rephrase or provide more context?",
        error_topic: "English language",
    },
    SubjectProfile {
        name: "language_assistant",
        display_name: "Language Assistant",
        description: "Process and respond to translation and other language-related queries.",
        system_prompt: prompts::LANGUAGE,
        preamble: "Process this translation or language request, noting any cultural or grammatical points worth knowing: ",
        fallback: "I apologize, but I couldn't process this translation request. Please check the text and the target language, then try again.",
        error_topic: "language",
    },
    SubjectProfile {
        name: "computer_science_assistant",
        display_name: "Computer Science Assistant",
        description: "Process and respond to computer science and programming questions: code, algorithms, and data structures.",
        system_prompt: prompts::COMPUTER_SCIENCE,
        preamble: "Please address this computer science or programming question, providing code examples with thorough explanations where appropriate: ",
        fallback: "I apologize, but I couldn't process your computer science question. Please try rephrasing or providing more specific details about what you're trying to learn or accomplish.",
        error_topic: "computer science",
    },
    SubjectProfile {
        name: "general_assistant",
        display_name: "General Assistant",
        description: "Handle general knowledge queries that fall outside the specialized subjects.",
        system_prompt: prompts::GENERAL,
        preamble: "Answer this general question concisely: ",
        fallback: "I apologize, but I couldn't answer this question. Please try rephrasing it.",
        error_topic: "general knowledge",
    },
];

/// Look up a profile by its tool name.
pub fn profile_by_name(name: &str) -> Option<&'static SubjectProfile> {
    SUBJECT_PROFILES.iter().find(|profile| profile.name == name)
}

/// One subject specialist, usable as an agent tool.
pub struct SubjectAssistant {
    profile: &'static SubjectProfile,
    llm: Arc<dyn LlmProvider>,
    options: CompletionOptions,
}

impl SubjectAssistant {
    pub fn new(
        profile: &'static SubjectProfile,
        llm: Arc<dyn LlmProvider>,
        options: CompletionOptions,
    ) -> Self {
        Self {
            profile,
            llm,
            options,
        }
    }
}

#[async_trait]
impl AgentTool for SubjectAssistant {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::query_tool(self.profile.name, self.profile.description)
    }

    async fn execute(&self, args: &serde_json::Value) -> Result<String, ToolError> {
        let query = query_argument(args)?;
        debug!(assistant = self.profile.name, "Routed to subject specialist");

        let messages = vec![
            Message::system(self.profile.system_prompt),
            Message::user(format!("{}{}", self.profile.preamble, query)),
        ];

        match self.llm.complete(&messages, None, &self.options).await {
            Ok(response) => {
                let text = response.message.content.trim();
                if text.is_empty() {
                    Ok(self.profile.fallback.to_string())
                } else {
                    Ok(text.to_string())
                }
            }
            // The orchestrator reads the error text and decides how to carry on.
            Err(e) => {
                warn!(assistant = self.profile.name, error = %e, "Subject completion failed");
                Ok(format!(
                    "Error processing your {} query: {}",
                    self.profile.error_topic, e
                ))
            }
        }
    }
}
