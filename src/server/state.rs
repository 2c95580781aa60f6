use axum::extract::FromRef;

use crate::agent::llm::LlmFactory;
use crate::config::AppConfig;
use crate::knowledge::KnowledgeBase;
use crate::scoring::Scorer;
use std::sync::Arc;
use std::time::Instant;

use super::session::SessionStore;
use super::ServerConfig;

pub type GuardedLlmFactory = Arc<dyn LlmFactory>;
pub type GuardedKnowledgeBase = Arc<dyn KnowledgeBase>;
pub type GuardedScorer = Arc<dyn Scorer>;
pub type GuardedSessionStore = Arc<SessionStore>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub app_config: AppConfig,
    pub start_time: Instant,
    pub llm_factory: GuardedLlmFactory,
    pub knowledge_base: GuardedKnowledgeBase,
    pub scorer: GuardedScorer,
    pub sessions: GuardedSessionStore,
    pub hash: String,
}

impl FromRef<ServerState> for GuardedLlmFactory {
    fn from_ref(input: &ServerState) -> Self {
        input.llm_factory.clone()
    }
}

impl FromRef<ServerState> for GuardedKnowledgeBase {
    fn from_ref(input: &ServerState) -> Self {
        input.knowledge_base.clone()
    }
}

impl FromRef<ServerState> for GuardedScorer {
    fn from_ref(input: &ServerState) -> Self {
        input.scorer.clone()
    }
}

impl FromRef<ServerState> for GuardedSessionStore {
    fn from_ref(input: &ServerState) -> Self {
        input.sessions.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for AppConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.app_config.clone()
    }
}
