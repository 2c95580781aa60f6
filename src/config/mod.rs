mod file_config;

pub use file_config::{
    ApiConfig, FileConfig, KnowledgeBaseConfig, ModelConfig, SagemakerConfig, ScoringConfig,
};

use crate::agent::llm::{ApiKeySource, ProviderKind};
use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_MODEL_ID: &str = "us.amazon.nova-pro-v1:0";
pub const DEFAULT_TEMPERATURE: f32 = 0.3;
pub const DEFAULT_MAX_RESULTS: usize = 9;
pub const DEFAULT_MIN_SCORE: f64 = 0.000001;

// Shipped workshop defaults that must be replaced before the matching
// feature can reach a real endpoint. Resolution keeps them as-is so the
// binaries can report exactly what is missing instead of refusing to start.
pub const PLACEHOLDER_SAGEMAKER_ENDPOINT: &str = "my-llm-endpoint";
pub const PLACEHOLDER_INFERENCE_COMPONENT: &str = "my-llm-inference-component";
pub const PLACEHOLDER_KNOWLEDGE_BASE_ID: &str = "my-kb-id";
pub const PLACEHOLDER_SCORING_ENDPOINT: &str = "my-xgboost-endpoint";

/// Resolves a CLI path argument to an absolute path.
pub fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

/// CLI arguments that participate in config resolution.
/// This struct mirrors the CLI arguments that TOML config and environment
/// variables can override.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub region: Option<String>,
    pub provider: Option<String>,
    pub model_id: Option<String>,
    pub sagemaker_endpoint: Option<String>,
    pub knowledge_base_id: Option<String>,
    pub scoring_endpoint: Option<String>,
    pub temperature: Option<f32>,
}

/// Environment variable values, the highest-precedence config layer.
///
/// Kept as a plain struct so tests can construct overrides without touching
/// the process environment.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub region: Option<String>,
    pub provider: Option<String>,
    pub model_id: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub sagemaker_endpoint: Option<String>,
    pub sagemaker_inference_component: Option<String>,
    pub knowledge_base_id: Option<String>,
    pub max_results: Option<usize>,
    pub min_score: Option<f64>,
    pub scoring_endpoint: Option<String>,
    pub bedrock_base_url: Option<String>,
    pub sagemaker_base_url: Option<String>,
    pub knowledge_base_url: Option<String>,
    pub api_key: Option<String>,
    pub api_key_command: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            region: env_string("AWS_REGION"),
            provider: env_string("MODEL_PROVIDER"),
            model_id: env_string("BEDROCK_MODEL_ID"),
            temperature: env_parsed("TEMPERATURE"),
            max_tokens: env_parsed("MAX_TOKENS"),
            sagemaker_endpoint: env_string("SAGEMAKER_MODEL_ENDPOINT"),
            sagemaker_inference_component: env_string("SAGEMAKER_INFERENCE_COMPONENT"),
            knowledge_base_id: env_string("KNOWLEDGE_BASE_ID"),
            max_results: env_parsed("MAX_RESULTS"),
            min_score: env_parsed("MIN_SCORE"),
            scoring_endpoint: env_string("XGBOOST_ENDPOINT_NAME"),
            bedrock_base_url: env_string("BEDROCK_BASE_URL"),
            sagemaker_base_url: env_string("SAGEMAKER_BASE_URL"),
            knowledge_base_url: env_string("KNOWLEDGE_BASE_URL"),
            api_key: env_string("LLM_API_KEY"),
            api_key_command: env_string("LLM_API_KEY_COMMAND"),
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parsed<T: FromStr>(name: &str) -> Option<T> {
    let raw = env_string(name)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring unparseable {} value: {:?}", name, raw);
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Model selection
    pub region: String,
    pub provider: ProviderKind,
    pub model_id: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,

    // SageMaker-hosted LLM
    pub sagemaker_endpoint: String,
    pub sagemaker_inference_component: Option<String>,

    // Knowledge base
    pub knowledge_base_id: String,
    pub max_results: usize,
    pub min_score: f64,

    // Loan scoring
    pub scoring_endpoint: String,

    // Base URL overrides (None means the regional AWS endpoint)
    pub bedrock_base_url: Option<String>,
    pub sagemaker_base_url: Option<String>,
    pub knowledge_base_url: Option<String>,

    pub api_key_source: ApiKeySource,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments, an optional TOML file
    /// config, and the environment. Environment values override file values,
    /// which override CLI values.
    pub fn resolve(
        cli: &CliConfig,
        file_config: Option<FileConfig>,
        env: &EnvOverrides,
    ) -> Result<Self> {
        let file = file_config.unwrap_or_default();
        let model = file.model.unwrap_or_default();
        let sagemaker = file.sagemaker.unwrap_or_default();
        let knowledge_base = file.knowledge_base.unwrap_or_default();
        let scoring = file.scoring.unwrap_or_default();
        let api = file.api.unwrap_or_default();

        let region = env
            .region
            .clone()
            .or(file.region)
            .or_else(|| cli.region.clone())
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let provider_name = env
            .provider
            .clone()
            .or(model.provider)
            .or_else(|| cli.provider.clone())
            .unwrap_or_else(|| ProviderKind::Bedrock.as_str().to_string());
        let provider = match ProviderKind::parse(&provider_name.to_lowercase()) {
            Some(kind) => kind,
            None => bail!(
                "Invalid model provider: {:?}. Must be one of: bedrock, sagemaker",
                provider_name
            ),
        };

        let model_id = env
            .model_id
            .clone()
            .or(model.model_id)
            .or_else(|| cli.model_id.clone())
            .unwrap_or_else(|| DEFAULT_MODEL_ID.to_string());

        let temperature = env
            .temperature
            .or(model.temperature)
            .or(cli.temperature)
            .unwrap_or(DEFAULT_TEMPERATURE);
        if !(0.0..=1.0).contains(&temperature) {
            bail!(
                "temperature must be between 0.0 and 1.0, got {}",
                temperature
            );
        }

        let max_tokens = env.max_tokens.or(model.max_tokens);

        let sagemaker_endpoint = env
            .sagemaker_endpoint
            .clone()
            .or(sagemaker.endpoint)
            .or_else(|| cli.sagemaker_endpoint.clone())
            .unwrap_or_else(|| PLACEHOLDER_SAGEMAKER_ENDPOINT.to_string());

        // The shipped component placeholder means "endpoint has no inference
        // components", same as leaving it unset.
        let sagemaker_inference_component = env
            .sagemaker_inference_component
            .clone()
            .or(sagemaker.inference_component)
            .filter(|c| c != PLACEHOLDER_INFERENCE_COMPONENT);

        let knowledge_base_id = env
            .knowledge_base_id
            .clone()
            .or(knowledge_base.id)
            .or_else(|| cli.knowledge_base_id.clone())
            .unwrap_or_else(|| PLACEHOLDER_KNOWLEDGE_BASE_ID.to_string());

        let max_results = env
            .max_results
            .or(knowledge_base.max_results)
            .unwrap_or(DEFAULT_MAX_RESULTS);
        if max_results == 0 {
            bail!("max_results must be at least 1");
        }

        let min_score = env
            .min_score
            .or(knowledge_base.min_score)
            .unwrap_or(DEFAULT_MIN_SCORE);

        let scoring_endpoint = env
            .scoring_endpoint
            .clone()
            .or(scoring.endpoint)
            .or_else(|| cli.scoring_endpoint.clone())
            .unwrap_or_else(|| PLACEHOLDER_SCORING_ENDPOINT.to_string());

        let bedrock_base_url = env.bedrock_base_url.clone().or(api.bedrock_base_url);
        let sagemaker_base_url = env.sagemaker_base_url.clone().or(api.sagemaker_base_url);
        let knowledge_base_url = env.knowledge_base_url.clone().or(api.knowledge_base_url);

        let api_key = env.api_key.clone().or(api.api_key);
        let api_key_command = env.api_key_command.clone().or(api.api_key_command);
        let api_key_source = match (api_key, api_key_command) {
            (Some(key), _) => ApiKeySource::Static(key),
            (None, Some(command)) => ApiKeySource::Command(command),
            (None, None) => ApiKeySource::None,
        };

        Ok(Self {
            region,
            provider,
            model_id,
            temperature,
            max_tokens,
            sagemaker_endpoint,
            sagemaker_inference_component,
            knowledge_base_id,
            max_results,
            min_score,
            scoring_endpoint,
            bedrock_base_url,
            sagemaker_base_url,
            knowledge_base_url,
            api_key_source,
        })
    }

    pub fn sagemaker_endpoint_is_placeholder(&self) -> bool {
        self.sagemaker_endpoint == PLACEHOLDER_SAGEMAKER_ENDPOINT
    }

    pub fn knowledge_base_id_is_placeholder(&self) -> bool {
        self.knowledge_base_id == PLACEHOLDER_KNOWLEDGE_BASE_ID
    }

    pub fn scoring_endpoint_is_placeholder(&self) -> bool {
        self.scoring_endpoint == PLACEHOLDER_SCORING_ENDPOINT
    }

    /// Warnings about placeholder values still in effect, one line each,
    /// suitable for startup logging.
    pub fn placeholder_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.provider == ProviderKind::Sagemaker && self.sagemaker_endpoint_is_placeholder() {
            warnings.push(format!(
                "SageMaker endpoint is the shipped placeholder {:?}; completions will fail until it is set",
                self.sagemaker_endpoint
            ));
        }
        if self.knowledge_base_id_is_placeholder() {
            warnings.push(format!(
                "Knowledge base ID is the shipped placeholder {:?}; store/retrieve will fail until it is set",
                self.knowledge_base_id
            ));
        }
        if self.scoring_endpoint_is_placeholder() {
            warnings.push(format!(
                "Scoring endpoint is the shipped placeholder {:?}; loan predictions will fail until it is set",
                self.scoring_endpoint
            ));
        }
        warnings
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self::resolve(&CliConfig::default(), None, &EnvOverrides::default()).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_resolve_defaults() {
        let config =
            AppConfig::resolve(&CliConfig::default(), None, &EnvOverrides::default()).unwrap();

        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.provider, ProviderKind::Bedrock);
        assert_eq!(config.model_id, "us.amazon.nova-pro-v1:0");
        assert_eq!(config.temperature, 0.3);
        assert_eq!(config.max_tokens, None);
        assert_eq!(config.max_results, 9);
        assert_eq!(config.min_score, 0.000001);
        assert!(config.sagemaker_endpoint_is_placeholder());
        assert!(config.knowledge_base_id_is_placeholder());
        assert!(config.scoring_endpoint_is_placeholder());
        assert!(config.sagemaker_inference_component.is_none());
        assert!(matches!(config.api_key_source, ApiKeySource::None));
    }

    #[test]
    fn test_file_overrides_cli() {
        let cli = CliConfig {
            region: Some("us-west-2".to_string()),
            model_id: Some("cli-model".to_string()),
            temperature: Some(0.9),
            ..Default::default()
        };
        let file = FileConfig {
            region: Some("eu-west-1".to_string()),
            model: Some(ModelConfig {
                model_id: Some("us.amazon.nova-lite-v1:0".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let config = AppConfig::resolve(&cli, Some(file), &EnvOverrides::default()).unwrap();

        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.model_id, "us.amazon.nova-lite-v1:0");
        // CLI value used when the file does not specify
        assert_eq!(config.temperature, 0.9);
    }

    #[test]
    fn test_env_overrides_file() {
        let file = FileConfig {
            region: Some("eu-west-1".to_string()),
            model: Some(ModelConfig {
                model_id: Some("us.amazon.nova-lite-v1:0".to_string()),
                temperature: Some(0.5),
                ..Default::default()
            }),
            ..Default::default()
        };
        let env = EnvOverrides {
            region: Some("ap-southeast-2".to_string()),
            model_id: Some("us.amazon.nova-2-lite-v1:0".to_string()),
            ..Default::default()
        };

        let config = AppConfig::resolve(&CliConfig::default(), Some(file), &env).unwrap();

        assert_eq!(config.region, "ap-southeast-2");
        assert_eq!(config.model_id, "us.amazon.nova-2-lite-v1:0");
        // File value used when the environment does not specify
        assert_eq!(config.temperature, 0.5);
    }

    #[test]
    fn test_invalid_provider_rejected() {
        let cli = CliConfig {
            provider: Some("ollama".to_string()),
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli, None, &EnvOverrides::default());
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Invalid model provider"));
    }

    #[test]
    fn test_provider_name_is_case_insensitive() {
        let cli = CliConfig {
            provider: Some("SageMaker".to_string()),
            ..Default::default()
        };
        let config = AppConfig::resolve(&cli, None, &EnvOverrides::default()).unwrap();
        assert_eq!(config.provider, ProviderKind::Sagemaker);
    }

    #[test]
    fn test_temperature_out_of_range_rejected() {
        let cli = CliConfig {
            temperature: Some(1.5),
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli, None, &EnvOverrides::default());
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("temperature"));
    }

    #[test]
    fn test_zero_max_results_rejected() {
        let env = EnvOverrides {
            max_results: Some(0),
            ..Default::default()
        };
        let result = AppConfig::resolve(&CliConfig::default(), None, &env);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("max_results"));
    }

    #[test]
    fn test_static_api_key_beats_command() {
        let file = FileConfig {
            api: Some(ApiConfig {
                api_key: Some("sekret".to_string()),
                api_key_command: Some("cat /tmp/key".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let config =
            AppConfig::resolve(&CliConfig::default(), Some(file), &EnvOverrides::default())
                .unwrap();
        assert!(matches!(config.api_key_source, ApiKeySource::Static(ref k) if k == "sekret"));
    }

    #[test]
    fn test_placeholder_component_treated_as_unset() {
        let env = EnvOverrides {
            sagemaker_inference_component: Some(PLACEHOLDER_INFERENCE_COMPONENT.to_string()),
            ..Default::default()
        };
        let config = AppConfig::resolve(&CliConfig::default(), None, &env).unwrap();
        assert!(config.sagemaker_inference_component.is_none());

        let env = EnvOverrides {
            sagemaker_inference_component: Some("adapter-xyz".to_string()),
            ..Default::default()
        };
        let config = AppConfig::resolve(&CliConfig::default(), None, &env).unwrap();
        assert_eq!(
            config.sagemaker_inference_component.as_deref(),
            Some("adapter-xyz")
        );
    }

    #[test]
    fn test_placeholder_warnings() {
        let config = AppConfig::for_tests();
        // Bedrock default: the placeholder SageMaker endpoint is not worth
        // warning about, the knowledge base and scoring endpoints are.
        let warnings = config.placeholder_warnings();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("Knowledge base ID"));
        assert!(warnings[1].contains("Scoring endpoint"));

        let mut config = AppConfig::for_tests();
        config.provider = ProviderKind::Sagemaker;
        assert_eq!(config.placeholder_warnings().len(), 3);

        let mut config = AppConfig::for_tests();
        config.knowledge_base_id = "KB123456".to_string();
        config.scoring_endpoint = "xgboost-prod".to_string();
        assert!(config.placeholder_warnings().is_empty());
    }

    #[test]
    fn test_load_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
region = "eu-west-1"

[model]
provider = "bedrock"
model_id = "us.amazon.nova-lite-v1:0"
temperature = 0.5

[knowledge_base]
id = "KB123456"
max_results = 4

[api]
api_key_command = "cat /tmp/key"
"#
        )
        .unwrap();

        let file_config = FileConfig::load(file.path()).unwrap();
        let config = AppConfig::resolve(
            &CliConfig::default(),
            Some(file_config),
            &EnvOverrides::default(),
        )
        .unwrap();

        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.model_id, "us.amazon.nova-lite-v1:0");
        assert_eq!(config.temperature, 0.5);
        assert_eq!(config.knowledge_base_id, "KB123456");
        assert_eq!(config.max_results, 4);
        assert!(
            matches!(config.api_key_source, ApiKeySource::Command(ref c) if c == "cat /tmp/key")
        );
    }

    #[test]
    fn test_load_missing_file_error() {
        let result = FileConfig::load(std::path::Path::new("/nonexistent/teachassist.toml"));
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Failed to read config file"));
    }

    #[test]
    fn test_parse_path_is_absolute() {
        assert!(parse_path(".").unwrap().is_absolute());
        assert!(parse_path("does-not-exist-zzz").unwrap().is_absolute());
    }
}
