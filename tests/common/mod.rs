//! Common test infrastructure
//!
//! This module provides all the infrastructure needed for end-to-end tests.
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestServer, TestClient};
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_chat() {
//!     let server = TestServer::spawn().await;
//!     let client = TestClient::new(server.base_url.clone());
//!
//!     server.llm.push_text("teacher");
//!     server.llm.push_text("Hello!");
//!     let body = client.chat_ok(json!({"message": "hi"})).await;
//!     assert_eq!(body["reply"], "Hello!");
//! }
//! ```

mod client;
mod constants;
mod fixtures;
mod server;

// Public API - this is what tests import
#[allow(unused_imports)]
pub use client::TestClient;
#[allow(unused_imports)]
pub use constants::*;
#[allow(unused_imports)]
pub use server::TestServer;
