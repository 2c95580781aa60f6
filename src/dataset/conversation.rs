use serde::Serialize;
use serde_json::Value;

use super::record::RecordError;

/// Schema tag Bedrock expects on every conversation record.
pub const SCHEMA_VERSION: &str = "bedrock-conversation-2024";

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ContentBlock {
    pub text: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ConversationMessage {
    pub role: String,
    pub content: Vec<ContentBlock>,
}

/// Chat record in the Bedrock conversation schema: the flat content string
/// of each turn becomes a single-element list of text blocks.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ConversationRecord {
    #[serde(rename = "schemaVersion")]
    pub schema_version: &'static str,
    pub messages: Vec<ConversationMessage>,
}

impl ConversationRecord {
    pub fn new(messages: Vec<ConversationMessage>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            messages,
        }
    }
}

/// Reshapes a plain `messages` chat record into the Bedrock conversation
/// schema. All turns are kept in order and every turn must carry a string
/// role and a string content.
pub fn convert_conversation(record: &Value) -> Result<ConversationRecord, RecordError> {
    let messages = record
        .get("messages")
        .and_then(Value::as_array)
        .ok_or(RecordError::MissingMessages)?;
    if messages.is_empty() {
        return Err(RecordError::MissingMessages);
    }

    let mut converted = Vec::with_capacity(messages.len());
    for (index, message) in messages.iter().enumerate() {
        let role = message.get("role").and_then(Value::as_str);
        let content = message.get("content").and_then(Value::as_str);
        let (role, content) = match (role, content) {
            (Some(role), Some(content)) => (role, content),
            _ => return Err(RecordError::InvalidMessage { index }),
        };
        converted.push(ConversationMessage {
            role: role.to_owned(),
            content: vec![ContentBlock {
                text: content.to_owned(),
            }],
        });
    }

    Ok(ConversationRecord::new(converted))
}
