//! The assistant stack.
//!
//! A router classifies each turn, the teacher orchestrator delegates to
//! subject specialist tools, and the knowledge flow handles personal
//! facts. All of it talks to the backends through the `agent` traits.

mod knowledge;
mod loan;
mod prompts;
mod router;
mod subject;
#[cfg(test)]
pub(crate) mod testing;

pub use knowledge::{FlowError, KnowledgeFlow, MISSING_INFO_REPLY, STORED_REPLY};
pub use loan::{extract_payload, LoanAssistant, LOAN_ASSISTANT_DISPLAY_NAME, LOAN_ASSISTANT_NAME};
pub use router::{
    ChatMode, KbAction, QueryRouter, Route, RoutedReply, RouterSettings, DEFAULT_HISTORY_LIMIT,
};
pub use subject::{profile_by_name, SubjectAssistant, SubjectProfile, SUBJECT_PROFILES};

use crate::agent::llm::{CompletionOptions, LlmProvider};
use crate::agent::tools::ToolRegistry;
use crate::scoring::Scorer;
use std::sync::Arc;

/// Builds the tool registry the teacher orchestrator works with: the five
/// subject specialists plus the loan predictor.
pub fn build_teacher_registry(
    llm: Arc<dyn LlmProvider>,
    scorer: Arc<dyn Scorer>,
    options: &CompletionOptions,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for profile in SUBJECT_PROFILES {
        registry.register(SubjectAssistant::new(profile, llm.clone(), options.clone()));
    }
    registry.register(LoanAssistant::new(llm, scorer, options.clone()));
    registry
}
