//! Tabular model scoring.
//!
//! The loan assistant sends a CSV feature row to a hosted XGBoost model
//! and turns the returned probability into an accept/reject prediction.

use crate::agent::llm::ApiKeySource;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Scores at or above this are an accept.
pub const ACCEPT_THRESHOLD: f64 = 0.5;

/// A known-good feature row from the Direct Marketing dataset (59 one-hot
/// encoded features), used to probe the endpoint.
pub const SAMPLE_PAYLOAD: &str = "29,2,999,0,1,0,0.0,1.0,0.0,0.0,0.0,0.0,0.0,0.0,0.0,0.0,0.0,0.0,0.0,1.0,0.0,0.0,0.0,0.0,1.0,0.0,0.0,0.0,0.0,0.0,1.0,0.0,0.0,1.0,0.0,0.0,1.0,0.0,0.0,0.0,1.0,0.0,0.0,0.0,0.0,1.0,0.0,0.0,0.0,0.0,0.0,0.0,0.0,0.0,1.0,0.0,0.0,1.0,0.0";

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request timeout")]
    Timeout,
}

/// Trait for tabular scoring backends.
#[async_trait]
pub trait Scorer: Send + Sync {
    /// Score one CSV feature row, returning the raw probability.
    async fn score(&self, features: &str) -> Result<f64, ScoreError>;

    async fn health_check(&self) -> Result<(), ScoreError>;
}

/// An accept/reject call derived from a raw score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub score: f64,
    pub label: PredictionLabel,
    /// Percentage confidence in the label, 0 to 100.
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PredictionLabel {
    Accept,
    Reject,
}

impl PredictionLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionLabel::Accept => "Accept",
            PredictionLabel::Reject => "Reject",
        }
    }
}

impl Prediction {
    /// The score is the probability of acceptance, so confidence in a
    /// reject call is the complement.
    pub fn from_score(score: f64) -> Self {
        if score >= ACCEPT_THRESHOLD {
            Self {
                score,
                label: PredictionLabel::Accept,
                confidence: score * 100.0,
            }
        } else {
            Self {
                score,
                label: PredictionLabel::Reject,
                confidence: (1.0 - score) * 100.0,
            }
        }
    }

    /// The four-line prediction block shown to users.
    pub fn report(&self, payload: &str) -> String {
        format!(
            "Feature Payload: {}\nRaw Prediction Score: {:.4}\nPrediction: {}\nConfidence: {:.2}%",
            payload,
            self.score,
            self.label.as_str(),
            self.confidence
        )
    }
}

/// Scorer backed by a SageMaker endpoint serving an XGBoost model.
///
/// The container takes `text/csv` rows and answers with a bare number
/// (sometimes bracketed), not JSON.
pub struct SageMakerScorer {
    client: Client,
    base_url: String,
    endpoint_name: String,
    api_key_source: ApiKeySource,
}

impl SageMakerScorer {
    pub fn new(region: impl AsRef<str>, endpoint_name: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: format!("https://runtime.sagemaker.{}.amazonaws.com", region.as_ref()),
            endpoint_name: endpoint_name.into(),
            api_key_source: ApiKeySource::None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_key_source(mut self, source: ApiKeySource) -> Self {
        self.api_key_source = source;
        self
    }
}

#[async_trait]
impl Scorer for SageMakerScorer {
    async fn score(&self, features: &str) -> Result<f64, ScoreError> {
        let url = format!(
            "{}/endpoints/{}/invocations",
            self.base_url, self.endpoint_name
        );

        debug!(endpoint = %self.endpoint_name, "Sending scoring request");

        let mut builder = self
            .client
            .post(&url)
            .header("Content-Type", "text/csv")
            .body(features.to_string())
            .timeout(REQUEST_TIMEOUT);
        match self.api_key_source.get_key().await {
            Ok(Some(key)) => builder = builder.header("Authorization", format!("Bearer {}", key)),
            Ok(None) => {}
            Err(e) => return Err(ScoreError::Connection(e.to_string())),
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ScoreError::Timeout
            } else {
                ScoreError::Connection(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScoreError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ScoreError::InvalidResponse(e.to_string()))?;
        parse_score(&body)
    }

    async fn health_check(&self) -> Result<(), ScoreError> {
        self.score(SAMPLE_PAYLOAD).await.map(|_| ())
    }
}

/// Parses the endpoint's response body into a probability.
fn parse_score(body: &str) -> Result<f64, ScoreError> {
    let trimmed = body.trim().trim_matches(|c| c == '[' || c == ']');
    trimmed.parse::<f64>().map_err(|_| {
        ScoreError::InvalidResponse(format!("expected a numeric score, got {:?}", body.trim()))
    })
}
