//! Execution trace for chat turns.
//!
//! Accumulates the steps taken while answering one query (classification,
//! completions, tool calls) so the API can return them when a client asks
//! for debug output.

use serde::Serialize;
use std::time::Instant;
use uuid::Uuid;

/// Type of trace step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStepKind {
    /// Routing decision for the query.
    Classification,
    /// A model completion.
    Thought,
    /// A tool call made by the agent.
    ToolCall,
    /// Result of a tool call.
    ToolResult,
    /// Knowledge base store or lookup.
    Knowledge,
    /// An error surfaced to the user.
    Error,
}

/// A single recorded step.
#[derive(Debug, Clone, Serialize)]
pub struct TraceStep {
    pub id: String,
    /// Step number within the turn (0-indexed).
    pub step_number: u32,
    /// Unix timestamp (milliseconds).
    pub timestamp: i64,
    pub kind: TraceStepKind,
    /// Human-readable description of this step.
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
}

/// Step accumulator for one chat turn. Not shared across turns; the
/// router builds a fresh one per query.
#[derive(Default)]
pub struct AgentTrace {
    steps: Vec<TraceStep>,
    current_timer: Option<Instant>,
}

impl AgentTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&mut self, kind: TraceStepKind, detail: impl Into<String>) {
        self.push(kind, detail, None);
    }

    /// Start a timer; the next `log_with_elapsed` call closes it.
    pub fn start_timer(&mut self) {
        self.current_timer = Some(Instant::now());
    }

    pub fn log_with_elapsed(&mut self, kind: TraceStepKind, detail: impl Into<String>) {
        let duration_ms = self
            .current_timer
            .take()
            .map(|start| start.elapsed().as_millis() as i64);
        self.push(kind, detail, duration_ms);
    }

    fn push(&mut self, kind: TraceStepKind, detail: impl Into<String>, duration_ms: Option<i64>) {
        self.steps.push(TraceStep {
            id: Uuid::new_v4().to_string(),
            step_number: self.steps.len() as u32,
            timestamp: chrono::Utc::now().timestamp_millis(),
            kind,
            detail: detail.into(),
            duration_ms,
        });
    }

    pub fn steps(&self) -> &[TraceStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Take ownership of all steps, leaving the trace empty.
    pub fn take_steps(&mut self) -> Vec<TraceStep> {
        std::mem::take(&mut self.steps)
    }
}

/// Truncates long model output for trace entries and logs.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len).collect();
        format!("{}...", cut)
    }
}
