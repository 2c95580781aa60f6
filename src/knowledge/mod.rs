//! Vector knowledge base access.
//!
//! The knowledge base is an external collaborator reached over HTTP. The
//! trait keeps the rest of the crate (and the tests) independent of the
//! hosted service.

mod http;

pub use http::HttpKnowledgeBase;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KbError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request timeout")]
    Timeout,
}

/// One retrieved passage with its relevance score (0.0 to 1.0).
#[derive(Debug, Clone, Serialize)]
pub struct ScoredPassage {
    pub text: String,
    pub score: f64,
}

#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// Ingest a piece of text as a new document.
    async fn store(&self, text: &str) -> Result<(), KbError>;

    /// Semantic search, best matches first. Results under the configured
    /// relevance floor are already filtered out.
    async fn retrieve(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<ScoredPassage>, KbError>;

    async fn health_check(&self) -> Result<(), KbError>;
}
