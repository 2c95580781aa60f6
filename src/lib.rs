//! TeachAssist Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod agent;
pub mod assistants;
pub mod config;
pub mod dataset;
pub mod knowledge;
pub mod scoring;
pub mod server;

// Re-export commonly used types for convenience
pub use agent::{LlmFactory, LlmProvider, Message, MessageRole};
pub use config::AppConfig;
pub use knowledge::KnowledgeBase;
pub use scoring::Scorer;
pub use server::{run_server, RequestsLoggingLevel};
