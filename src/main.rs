use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use teachassist::agent::llm::{HttpLlmFactory, LlmFactory};
use teachassist::config::{parse_path, AppConfig, CliConfig, EnvOverrides, FileConfig};
use teachassist::knowledge::HttpKnowledgeBase;
use teachassist::scoring::SageMakerScorer;
use teachassist::server::{self, run_server, RequestsLoggingLevel};

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to a TOML config file.
    #[clap(short, long, value_parser = parse_path)]
    pub config_file_path: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,

    /// AWS region for Bedrock, SageMaker and the knowledge base.
    #[clap(long)]
    pub region: Option<String>,

    /// Inference provider hosting the default model: bedrock or sagemaker.
    #[clap(long)]
    pub provider: Option<String>,

    /// Bedrock model ID of the default model.
    #[clap(long)]
    pub model_id: Option<String>,

    /// SageMaker endpoint name hosting a custom LLM.
    #[clap(long)]
    pub sagemaker_endpoint: Option<String>,

    /// Bedrock knowledge base ID for store/retrieve.
    #[clap(long)]
    pub knowledge_base_id: Option<String>,

    /// SageMaker endpoint name of the XGBoost loan scoring model.
    #[clap(long)]
    pub scoring_endpoint: Option<String>,

    /// Sampling temperature for chat completions.
    #[clap(long)]
    pub temperature: Option<f32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let file_config = match &cli_args.config_file_path {
        Some(path) => {
            info!("Loading config file at {:?}...", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };

    let cli_config = CliConfig {
        region: cli_args.region.clone(),
        provider: cli_args.provider.clone(),
        model_id: cli_args.model_id.clone(),
        sagemaker_endpoint: cli_args.sagemaker_endpoint.clone(),
        knowledge_base_id: cli_args.knowledge_base_id.clone(),
        scoring_endpoint: cli_args.scoring_endpoint.clone(),
        temperature: cli_args.temperature,
    };
    let app_config = AppConfig::resolve(&cli_config, file_config, &EnvOverrides::from_env())?;

    for warning in app_config.placeholder_warnings() {
        warn!("{}", warning);
    }

    info!("Initializing metrics...");
    server::metrics::init_metrics();

    // Refresh the process memory gauge in the background.
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));

        // Skip the first immediate tick, wait for the first interval
        ticker.tick().await;

        loop {
            ticker.tick().await;
            server::metrics::update_memory_usage();
        }
    });

    let llm_factory = Arc::new(HttpLlmFactory::from_config(&app_config));

    let mut knowledge_base = HttpKnowledgeBase::new(
        &app_config.region,
        &app_config.knowledge_base_id,
        app_config.min_score,
    )
    .with_api_key_source(app_config.api_key_source.clone());
    if let Some(base_url) = &app_config.knowledge_base_url {
        knowledge_base = knowledge_base.with_base_url(base_url);
    }

    let mut scorer = SageMakerScorer::new(&app_config.region, &app_config.scoring_endpoint)
        .with_api_key_source(app_config.api_key_source.clone());
    if let Some(base_url) = &app_config.sagemaker_base_url {
        scorer = scorer.with_base_url(base_url);
    }

    info!(
        "Ready to serve at port {} with default model {}!",
        cli_args.port,
        llm_factory.default_key()
    );
    run_server(
        app_config,
        llm_factory,
        Arc::new(knowledge_base),
        Arc::new(scorer),
        cli_args.logging_level,
        cli_args.port,
        cli_args.frontend_dir_path,
    )
    .await
}
