//! Loan offering specialist.
//!
//! Pulls the CSV feature row out of the query, scores it against the
//! hosted XGBoost model, and has the LLM wrap the prediction block in a
//! short explanation.

use crate::agent::llm::{CompletionOptions, LlmProvider, Message};
use crate::agent::tools::{query_argument, AgentTool, ToolDefinition, ToolError};
use crate::scoring::{Prediction, Scorer};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, warn};

use super::prompts;

pub const LOAN_ASSISTANT_NAME: &str = "loan_offering_assistant";
pub const LOAN_ASSISTANT_DISPLAY_NAME: &str = "Loan Offering Assistant";

const NO_PAYLOAD_REPLY: &str = "I apologize, but I couldn't process this loan offering prediction. \
     Please check if your query includes a valid CSV feature payload.";

lazy_static! {
    // At least six comma-separated numbers in a row. Short enumerations in
    // ordinary prose stay below that.
    static ref PAYLOAD_RE: Regex =
        Regex::new(r"(?:-?\d+(?:\.\d+)?\s*,\s*){5,}-?\d+(?:\.\d+)?").expect("invalid payload regex");
}

/// Finds the CSV feature row embedded in a free-form query, normalizing
/// whitespace around the commas.
pub fn extract_payload(query: &str) -> Option<String> {
    let matched = PAYLOAD_RE.find(query)?;
    let row = matched
        .as_str()
        .split(',')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(",");
    Some(row)
}

pub struct LoanAssistant {
    llm: Arc<dyn LlmProvider>,
    scorer: Arc<dyn Scorer>,
    options: CompletionOptions,
}

impl LoanAssistant {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        scorer: Arc<dyn Scorer>,
        options: CompletionOptions,
    ) -> Self {
        Self {
            llm,
            scorer,
            options,
        }
    }

    /// Asks the model to present the prediction block. On failure the bare
    /// block still goes out, the explanation is garnish.
    async fn explain(&self, query: &str, report: &str) -> String {
        let messages = vec![
            Message::system(prompts::LOAN_SPECIALIST),
            Message::user(format!(
                "The customer asked: \"{}\"\n\nModel prediction:\n{}\n\nPresent this result to the customer, explaining what the prediction and confidence mean:",
                query, report
            )),
        ];
        match self.llm.complete(&messages, None, &self.options).await {
            Ok(response) => {
                let text = response.message.content.trim();
                if text.is_empty() {
                    report.to_string()
                } else {
                    format!("{}\n\n{}", report, text)
                }
            }
            Err(e) => {
                warn!(error = %e, "Loan explanation failed, returning prediction block alone");
                report.to_string()
            }
        }
    }
}

#[async_trait]
impl AgentTool for LoanAssistant {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::query_tool(
            LOAN_ASSISTANT_NAME,
            "Process loan offering prediction queries carrying a CSV feature payload of customer demographics.",
        )
    }

    async fn execute(&self, args: &serde_json::Value) -> Result<String, ToolError> {
        let query = query_argument(args)?;
        debug!("Routed to loan offering specialist");

        let Some(payload) = extract_payload(query) else {
            return Ok(NO_PAYLOAD_REPLY.to_string());
        };

        let score = match self.scorer.score(&payload).await {
            Ok(score) => score,
            Err(e) => return Ok(format!("Error invoking XGBoost endpoint: {}", e)),
        };

        let report = Prediction::from_score(score).report(&payload);
        Ok(self.explain(query, &report).await)
    }
}
