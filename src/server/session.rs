//! In-memory chat sessions.
//!
//! Sessions are conversation transcripts, not authentication. Nothing
//! persists across restarts; the knowledge base is where durable facts go.

use crate::agent::llm::{Message, MessageRole};
use crate::assistants::Route;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// One message in a session transcript.
#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    pub role: MessageRole,
    pub content: String,
    /// Routing decision, set on assistant turns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<Route>,
    /// Specialist that answered, when one did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assistant: Option<String>,
    /// Unix timestamp (milliseconds).
    pub timestamp: i64,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            route: None,
            assistant: None,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn assistant(content: impl Into<String>, route: Route, assistant: Option<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            route: Some(route),
            assistant,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: String,
    /// Unix timestamp (milliseconds).
    pub created_at: i64,
    pub turns: Vec<Turn>,
}

impl Session {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().timestamp_millis(),
            turns: Vec::new(),
        }
    }

    /// The newest turns as conversation messages for the model.
    pub fn history_messages(&self, limit: usize) -> Vec<Message> {
        let skip = self.turns.len().saturating_sub(limit);
        self.turns[skip..]
            .iter()
            .map(|turn| match turn.role {
                MessageRole::Assistant => Message::assistant(&turn.content),
                _ => Message::user(&turn.content),
            })
            .collect()
    }
}

/// All live sessions, keyed by id.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Looks up a session by id. A missing or unknown id starts a fresh
    /// session; the caller learns the new id from the returned snapshot.
    pub fn get_or_create(&self, id: Option<&str>) -> Session {
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(session) = id.and_then(|id| sessions.get(id)) {
            return session.clone();
        }
        let session = Session::new();
        sessions.insert(session.id.clone(), session.clone());
        session
    }

    pub fn get(&self, id: &str) -> Option<Session> {
        self.sessions.lock().unwrap().get(id).cloned()
    }

    pub fn append(&self, id: &str, turn: Turn) {
        if let Some(session) = self.sessions.lock().unwrap().get_mut(id) {
            session.turns.push(turn);
        }
    }

    /// Removes the session. Returns false when the id was unknown.
    pub fn clear(&self, id: &str) -> bool {
        self.sessions.lock().unwrap().remove(id).is_some()
    }

    pub fn active_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
