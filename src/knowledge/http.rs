//! Bedrock knowledge base client.

use super::{KbError, KnowledgeBase, ScoredPassage};
use crate::agent::llm::ApiKeySource;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for a Bedrock-hosted knowledge base.
///
/// Retrieval goes to the agent runtime plane, ingestion to the agent
/// control plane; both hosts derive from the region unless overridden
/// (tests point both at the same mock server).
pub struct HttpKnowledgeBase {
    client: Client,
    retrieve_base_url: String,
    ingest_base_url: String,
    knowledge_base_id: String,
    /// Passages scoring below this are dropped from retrieval results.
    min_score: f64,
    api_key_source: ApiKeySource,
}

impl HttpKnowledgeBase {
    pub fn new(
        region: impl AsRef<str>,
        knowledge_base_id: impl Into<String>,
        min_score: f64,
    ) -> Self {
        let region = region.as_ref();
        Self {
            client: Client::new(),
            retrieve_base_url: format!("https://bedrock-agent-runtime.{}.amazonaws.com", region),
            ingest_base_url: format!("https://bedrock-agent.{}.amazonaws.com", region),
            knowledge_base_id: knowledge_base_id.into(),
            min_score,
            api_key_source: ApiKeySource::None,
        }
    }

    /// Send both retrieval and ingestion to one base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.retrieve_base_url = base_url.clone();
        self.ingest_base_url = base_url;
        self
    }

    pub fn with_api_key_source(mut self, source: ApiKeySource) -> Self {
        self.api_key_source = source;
        self
    }

    async fn authorized(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, KbError> {
        match self.api_key_source.get_key().await {
            Ok(Some(key)) => Ok(builder.header("Authorization", format!("Bearer {}", key))),
            Ok(None) => Ok(builder),
            Err(e) => Err(KbError::Connection(e.to_string())),
        }
    }
}

#[async_trait]
impl KnowledgeBase for HttpKnowledgeBase {
    async fn store(&self, text: &str) -> Result<(), KbError> {
        let url = format!(
            "{}/knowledgebases/{}/documents",
            self.ingest_base_url, self.knowledge_base_id
        );
        let request = IngestRequest {
            documents: vec![IngestDocument::inline_text(text)],
        };

        debug!(knowledge_base = %self.knowledge_base_id, "Ingesting document");

        let builder = self.client.put(&url).json(&request).timeout(REQUEST_TIMEOUT);
        let response = self
            .authorized(builder)
            .await?
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(KbError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(())
    }

    async fn retrieve(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<ScoredPassage>, KbError> {
        let url = format!(
            "{}/knowledgebases/{}/retrieve",
            self.retrieve_base_url, self.knowledge_base_id
        );
        let request = RetrieveRequest {
            retrieval_query: RetrievalQuery {
                text: query.to_string(),
            },
            retrieval_configuration: RetrievalConfiguration {
                vector_search_configuration: VectorSearchConfiguration {
                    number_of_results: max_results,
                },
            },
        };

        debug!(
            knowledge_base = %self.knowledge_base_id,
            max_results = max_results,
            "Retrieving passages"
        );

        let builder = self.client.post(&url).json(&request).timeout(REQUEST_TIMEOUT);
        let response = self
            .authorized(builder)
            .await?
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(KbError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let retrieved: RetrieveResponse = response.json().await.map_err(|e| {
            KbError::InvalidResponse(format!("Failed to parse retrieve response: {}", e))
        })?;

        let passages = retrieved
            .retrieval_results
            .into_iter()
            .filter(|result| result.score >= self.min_score)
            .map(|result| ScoredPassage {
                text: result.content.text,
                score: result.score,
            })
            .collect();
        Ok(passages)
    }

    async fn health_check(&self) -> Result<(), KbError> {
        self.retrieve("ping", 1).await.map(|_| ())
    }
}

fn map_reqwest_error(e: reqwest::Error) -> KbError {
    if e.is_timeout() {
        KbError::Timeout
    } else {
        KbError::Connection(e.to_string())
    }
}

// Knowledge base API types

#[derive(Debug, Serialize)]
struct RetrieveRequest {
    #[serde(rename = "retrievalQuery")]
    retrieval_query: RetrievalQuery,
    #[serde(rename = "retrievalConfiguration")]
    retrieval_configuration: RetrievalConfiguration,
}

#[derive(Debug, Serialize)]
struct RetrievalQuery {
    text: String,
}

#[derive(Debug, Serialize)]
struct RetrievalConfiguration {
    #[serde(rename = "vectorSearchConfiguration")]
    vector_search_configuration: VectorSearchConfiguration,
}

#[derive(Debug, Serialize)]
struct VectorSearchConfiguration {
    #[serde(rename = "numberOfResults")]
    number_of_results: usize,
}

#[derive(Debug, Deserialize)]
struct RetrieveResponse {
    #[serde(rename = "retrievalResults", default)]
    retrieval_results: Vec<RetrievalResult>,
}

#[derive(Debug, Deserialize)]
struct RetrievalResult {
    content: RetrievalContent,
    #[serde(default)]
    score: f64,
}

#[derive(Debug, Deserialize)]
struct RetrievalContent {
    text: String,
}

#[derive(Debug, Serialize)]
struct IngestRequest {
    documents: Vec<IngestDocument>,
}

#[derive(Debug, Serialize)]
struct IngestDocument {
    content: DocumentContent,
}

impl IngestDocument {
    fn inline_text(text: &str) -> Self {
        Self {
            content: DocumentContent {
                data_source_type: "CUSTOM".to_string(),
                custom: CustomContent {
                    custom_document_identifier: DocumentIdentifier {
                        id: Uuid::new_v4().to_string(),
                    },
                    source_type: "IN_LINE".to_string(),
                    inline_content: InlineContent {
                        content_type: "TEXT".to_string(),
                        text_content: TextContent {
                            data: text.to_string(),
                        },
                    },
                },
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct DocumentContent {
    #[serde(rename = "dataSourceType")]
    data_source_type: String,
    custom: CustomContent,
}

#[derive(Debug, Serialize)]
struct CustomContent {
    #[serde(rename = "customDocumentIdentifier")]
    custom_document_identifier: DocumentIdentifier,
    #[serde(rename = "sourceType")]
    source_type: String,
    #[serde(rename = "inlineContent")]
    inline_content: InlineContent,
}

#[derive(Debug, Serialize)]
struct DocumentIdentifier {
    id: String,
}

#[derive(Debug, Serialize)]
struct InlineContent {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(rename = "textContent")]
    text_content: TextContent,
}

#[derive(Debug, Serialize)]
struct TextContent {
    data: String,
}
