use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Reasons a single JSONL record cannot be converted.
///
/// These are per-record failures. The caller logs them, bumps an error
/// counter and moves on to the next line.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("invalid or missing messages array")]
    MissingMessages,
    #[error("no user/assistant message pair found")]
    MissingRolePair,
    #[error("message {index} has no role or content")]
    InvalidMessage { index: usize },
    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Flattened training record for prompt/completion fine-tuning.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PromptCompletionRecord {
    pub prompt: String,
    pub completion: String,
}

/// Extracts the last user turn and the last assistant turn from a chat
/// record's `messages` array.
///
/// Records with fewer than two messages are rejected. Turns with a missing
/// or empty string content are ignored, so a trailing empty assistant turn
/// does not shadow an earlier real one. When either role never appears the
/// record is rejected rather than half-filled.
pub fn extract_prompt_completion(record: &Value) -> Result<PromptCompletionRecord, RecordError> {
    let messages = record
        .get("messages")
        .and_then(Value::as_array)
        .ok_or(RecordError::MissingMessages)?;
    if messages.len() < 2 {
        return Err(RecordError::MissingMessages);
    }

    let mut prompt = None;
    let mut completion = None;
    for message in messages {
        let role = message.get("role").and_then(Value::as_str);
        let content = message
            .get("content")
            .and_then(Value::as_str)
            .filter(|content| !content.is_empty());
        match (role, content) {
            (Some("user"), Some(content)) => prompt = Some(content),
            (Some("assistant"), Some(content)) => completion = Some(content),
            _ => {}
        }
    }

    match (prompt, completion) {
        (Some(prompt), Some(completion)) => Ok(PromptCompletionRecord {
            prompt: prompt.to_owned(),
            completion: completion.to_owned(),
        }),
        _ => Err(RecordError::MissingRolePair),
    }
}
