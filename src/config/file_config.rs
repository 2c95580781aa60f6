use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub region: Option<String>,

    // Feature sections
    pub model: Option<ModelConfig>,
    pub sagemaker: Option<SagemakerConfig>,
    pub knowledge_base: Option<KnowledgeBaseConfig>,
    pub scoring: Option<ScoringConfig>,
    pub api: Option<ApiConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ModelConfig {
    /// Model provider: "bedrock" or "sagemaker".
    pub provider: Option<String>,
    pub model_id: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SagemakerConfig {
    pub endpoint: Option<String>,
    pub inference_component: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct KnowledgeBaseConfig {
    pub id: Option<String>,
    pub max_results: Option<usize>,
    pub min_score: Option<f64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ScoringConfig {
    pub endpoint: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ApiConfig {
    // Base URL overrides, mainly for local proxies and tests
    pub bedrock_base_url: Option<String>,
    pub sagemaker_base_url: Option<String>,
    pub knowledge_base_url: Option<String>,
    // Bearer token, either inline or produced by a shell command
    pub api_key: Option<String>,
    pub api_key_command: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
