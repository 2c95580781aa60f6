//! Model catalog and provider construction.

use super::bedrock::BedrockProvider;
use super::provider::{ApiKeySource, LlmError, LlmProvider};
use super::sagemaker::SageMakerProvider;
use crate::config::AppConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which inference service hosts a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Bedrock,
    Sagemaker,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Bedrock => "bedrock",
            ProviderKind::Sagemaker => "sagemaker",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "bedrock" => Some(ProviderKind::Bedrock),
            "sagemaker" => Some(ProviderKind::Sagemaker),
            _ => None,
        }
    }
}

/// One selectable model in the catalog.
#[derive(Debug, Clone, Serialize)]
pub struct ModelSpec {
    /// Short key clients select models by, e.g. "nova-pro".
    pub key: String,
    pub display_name: String,
    pub provider: ProviderKind,
    /// Bedrock model ID, or the endpoint name for SageMaker.
    pub model_id: String,
}

impl ModelSpec {
    fn new(
        key: impl Into<String>,
        display_name: impl Into<String>,
        provider: ProviderKind,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            display_name: display_name.into(),
            provider,
            model_id: model_id.into(),
        }
    }
}

/// Builds providers from catalog keys.
///
/// The server constructs one provider per chat request; construction is a
/// couple of string clones, the HTTP connection pool lives in reqwest.
pub trait LlmFactory: Send + Sync {
    fn catalog(&self) -> &[ModelSpec];

    /// Key used when a request does not pick a model.
    fn default_key(&self) -> &str;

    fn create(&self, key: &str) -> Result<Arc<dyn LlmProvider>, LlmError>;

    fn spec(&self, key: &str) -> Option<&ModelSpec> {
        self.catalog().iter().find(|spec| spec.key == key)
    }
}

/// Factory wiring catalog entries to the HTTP providers.
pub struct HttpLlmFactory {
    catalog: Vec<ModelSpec>,
    default_key: String,
    region: String,
    bedrock_base_url: Option<String>,
    sagemaker_base_url: Option<String>,
    sagemaker_inference_component: Option<String>,
    api_key_source: ApiKeySource,
}

impl HttpLlmFactory {
    pub fn from_config(config: &AppConfig) -> Self {
        let mut catalog = vec![
            ModelSpec::new(
                "nova-pro",
                "Amazon Nova Pro",
                ProviderKind::Bedrock,
                "us.amazon.nova-pro-v1:0",
            ),
            ModelSpec::new(
                "nova-2-lite",
                "Amazon Nova 2 Lite",
                ProviderKind::Bedrock,
                "us.amazon.nova-2-lite-v1:0",
            ),
            ModelSpec::new(
                "claude-haiku",
                "Anthropic Claude Haiku 4.5",
                ProviderKind::Bedrock,
                "us.anthropic.claude-haiku-4-5-20251001-v1:0",
            ),
            ModelSpec::new(
                "claude-sonnet",
                "Anthropic Claude Sonnet 4.5",
                ProviderKind::Bedrock,
                "us.anthropic.claude-sonnet-4-5-20250929-v1:0",
            ),
        ];

        let sagemaker_usable = config.provider == ProviderKind::Sagemaker
            || !config.sagemaker_endpoint_is_placeholder();
        if sagemaker_usable {
            catalog.push(ModelSpec::new(
                "sagemaker",
                format!("SageMaker endpoint ({})", config.sagemaker_endpoint),
                ProviderKind::Sagemaker,
                config.sagemaker_endpoint.clone(),
            ));
        }

        let default_key = match config.provider {
            ProviderKind::Sagemaker => "sagemaker".to_string(),
            ProviderKind::Bedrock => {
                match catalog.iter().find(|spec| spec.model_id == config.model_id) {
                    Some(spec) => spec.key.clone(),
                    None => {
                        // A model ID we have no entry for still gets a slot.
                        catalog.insert(
                            0,
                            ModelSpec::new(
                                "custom",
                                config.model_id.clone(),
                                ProviderKind::Bedrock,
                                config.model_id.clone(),
                            ),
                        );
                        "custom".to_string()
                    }
                }
            }
        };

        Self {
            catalog,
            default_key,
            region: config.region.clone(),
            bedrock_base_url: config.bedrock_base_url.clone(),
            sagemaker_base_url: config.sagemaker_base_url.clone(),
            sagemaker_inference_component: config.sagemaker_inference_component.clone(),
            api_key_source: config.api_key_source.clone(),
        }
    }
}

impl LlmFactory for HttpLlmFactory {
    fn catalog(&self) -> &[ModelSpec] {
        &self.catalog
    }

    fn default_key(&self) -> &str {
        &self.default_key
    }

    fn create(&self, key: &str) -> Result<Arc<dyn LlmProvider>, LlmError> {
        let spec = self
            .spec(key)
            .ok_or_else(|| LlmError::UnknownModel(key.to_string()))?;

        match spec.provider {
            ProviderKind::Bedrock => {
                let mut provider = BedrockProvider::new(&self.region, &spec.model_id)
                    .with_api_key_source(self.api_key_source.clone());
                if let Some(base_url) = &self.bedrock_base_url {
                    provider = provider.with_base_url(base_url);
                }
                Ok(Arc::new(provider))
            }
            ProviderKind::Sagemaker => {
                let mut provider = SageMakerProvider::new(&self.region, &spec.model_id)
                    .with_api_key_source(self.api_key_source.clone());
                if let Some(base_url) = &self.sagemaker_base_url {
                    provider = provider.with_base_url(base_url);
                }
                if let Some(component) = &self.sagemaker_inference_component {
                    provider = provider.with_inference_component(component);
                }
                Ok(Arc::new(provider))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_roundtrip() {
        for kind in [ProviderKind::Bedrock, ProviderKind::Sagemaker] {
            assert_eq!(ProviderKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ProviderKind::parse("ollama"), None);
    }

    #[test]
    fn test_default_key_matches_configured_model() {
        let config = AppConfig::for_tests();
        let factory = HttpLlmFactory::from_config(&config);
        assert_eq!(factory.default_key(), "nova-pro");
        assert!(factory.spec("nova-2-lite").is_some());
        // Placeholder endpoint, bedrock default: no sagemaker entry.
        assert!(factory.spec("sagemaker").is_none());
    }

    #[test]
    fn test_unlisted_model_id_gets_a_custom_entry() {
        let mut config = AppConfig::for_tests();
        config.model_id = "us.amazon.nova-premier-v1:0".to_string();
        let factory = HttpLlmFactory::from_config(&config);
        assert_eq!(factory.default_key(), "custom");
        assert_eq!(
            factory.spec("custom").unwrap().model_id,
            "us.amazon.nova-premier-v1:0"
        );
    }

    #[test]
    fn test_sagemaker_provider_default() {
        let mut config = AppConfig::for_tests();
        config.provider = ProviderKind::Sagemaker;
        config.sagemaker_endpoint = "my-llm".to_string();
        let factory = HttpLlmFactory::from_config(&config);
        assert_eq!(factory.default_key(), "sagemaker");
        let provider = factory.create("sagemaker").unwrap();
        assert_eq!(provider.name(), "sagemaker");
        assert_eq!(provider.model(), "my-llm");
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let factory = HttpLlmFactory::from_config(&AppConfig::for_tests());
        assert!(matches!(
            factory.create("gpt-4o"),
            Err(LlmError::UnknownModel(_))
        ));
    }
}
