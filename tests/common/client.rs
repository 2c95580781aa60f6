//! HTTP client for end-to-end tests
//!
//! This module provides a thin wrapper over reqwest with one method per
//! server endpoint. When API routes or request formats change, update
//! only this file.

use super::constants::*;
use reqwest::Response;
use serde_json::Value;
use std::time::Duration;

/// HTTP test client
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    /// GET /
    pub async fn home(&self) -> Response {
        self.client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .expect("Failed to send request")
    }

    /// POST /v1/chat
    pub async fn chat(&self, body: Value) -> Response {
        self.client
            .post(format!("{}/v1/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .expect("Failed to send request")
    }

    /// POST /v1/chat, asserting success and decoding the JSON body
    pub async fn chat_ok(&self, body: Value) -> Value {
        let response = self.chat(body).await;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::OK,
            "Chat request failed: {:?}",
            response.text().await
        );
        response.json().await.expect("Failed to decode chat response")
    }

    /// GET /v1/models
    pub async fn get_models(&self) -> Response {
        self.client
            .get(format!("{}/v1/models", self.base_url))
            .send()
            .await
            .expect("Failed to send request")
    }

    /// GET /v1/session/{id}
    pub async fn get_session(&self, session_id: &str) -> Response {
        self.client
            .get(format!("{}/v1/session/{}", self.base_url, session_id))
            .send()
            .await
            .expect("Failed to send request")
    }

    /// DELETE /v1/session/{id}
    pub async fn delete_session(&self, session_id: &str) -> Response {
        self.client
            .delete(format!("{}/v1/session/{}", self.base_url, session_id))
            .send()
            .await
            .expect("Failed to send request")
    }

    /// GET /metrics
    pub async fn metrics(&self) -> Response {
        self.client
            .get(format!("{}/metrics", self.base_url))
            .send()
            .await
            .expect("Failed to send request")
    }
}
