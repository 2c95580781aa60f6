use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[allow(dead_code)]
mod cli_style;

use cli_style::{
    get_styles, print_error, print_info, print_section_footer, print_section_header,
    print_success, print_warning, TableBuilder,
};

use teachassist::agent::llm::{
    ApiKeySource, CompletionOptions, HttpLlmFactory, LlmFactory, LlmProvider, Message,
    ProviderKind,
};
use teachassist::config::{parse_path, AppConfig, CliConfig, EnvOverrides, FileConfig};
use teachassist::knowledge::{HttpKnowledgeBase, KnowledgeBase};
use teachassist::scoring::{Prediction, SageMakerScorer, Scorer, SAMPLE_PAYLOAD};

#[derive(Parser, Debug)]
#[command(styles=get_styles())]
struct CliArgs {
    /// Path to a TOML config file.
    #[clap(short, long, value_parser = parse_path)]
    pub config_file_path: Option<PathBuf>,

    /// Model key to probe. Defaults to the catalog default.
    #[clap(short, long)]
    pub model: Option<String>,

    /// AWS region for Bedrock, SageMaker and the knowledge base.
    #[clap(long)]
    pub region: Option<String>,

    /// Send a test request to each configured endpoint.
    #[clap(long)]
    pub check: bool,
}

enum CheckStatus {
    Passed(String),
    Failed(String),
    Skipped(String),
}

struct CheckOutcome {
    name: String,
    status: CheckStatus,
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

async fn check_model(
    factory: &HttpLlmFactory,
    key: &str,
    app_config: &AppConfig,
) -> CheckOutcome {
    let name = format!("Model endpoint ({})", key);
    let endpoint_missing = factory
        .spec(key)
        .map(|spec| matches!(spec.provider, ProviderKind::Sagemaker))
        .unwrap_or(false)
        && app_config.sagemaker_endpoint_is_placeholder();
    if endpoint_missing {
        return CheckOutcome {
            name,
            status: CheckStatus::Skipped(
                "SageMaker endpoint is the shipped placeholder".to_string(),
            ),
        };
    }

    let llm = match factory.create(key) {
        Ok(llm) => llm,
        Err(err) => {
            return CheckOutcome {
                name,
                status: CheckStatus::Failed(err.to_string()),
            };
        }
    };

    let messages = [Message::user("What is the capital of France?")];
    let options = CompletionOptions::default().with_max_tokens(50);
    match llm.complete(&messages, None, &options).await {
        Ok(response) => {
            let reply = response.message.content.trim().replace('\n', " ");
            CheckOutcome {
                name,
                status: CheckStatus::Passed(format!("replied {:?}", truncate(&reply, 60))),
            }
        }
        Err(err) => CheckOutcome {
            name,
            status: CheckStatus::Failed(err.to_string()),
        },
    }
}

async fn check_knowledge_base(kb: &HttpKnowledgeBase, app_config: &AppConfig) -> CheckOutcome {
    let name = "Knowledge base".to_string();
    if app_config.knowledge_base_id_is_placeholder() {
        return CheckOutcome {
            name,
            status: CheckStatus::Skipped("knowledge base ID is the shipped placeholder".to_string()),
        };
    }
    match kb.health_check().await {
        Ok(()) => CheckOutcome {
            name,
            status: CheckStatus::Passed(format!("{} is reachable", app_config.knowledge_base_id)),
        },
        Err(err) => CheckOutcome {
            name,
            status: CheckStatus::Failed(err.to_string()),
        },
    }
}

async fn check_scoring(scorer: &SageMakerScorer, app_config: &AppConfig) -> CheckOutcome {
    let name = "Loan scoring endpoint".to_string();
    if app_config.scoring_endpoint_is_placeholder() {
        return CheckOutcome {
            name,
            status: CheckStatus::Skipped("scoring endpoint is the shipped placeholder".to_string()),
        };
    }
    match scorer.score(SAMPLE_PAYLOAD).await {
        Ok(score) => {
            let prediction = Prediction::from_score(score);
            CheckOutcome {
                name,
                status: CheckStatus::Passed(format!(
                    "sample row scored {:.4}, {} at {:.2}% confidence",
                    prediction.score,
                    prediction.label.as_str(),
                    prediction.confidence
                )),
            }
        }
        Err(err) => CheckOutcome {
            name,
            status: CheckStatus::Failed(err.to_string()),
        },
    }
}

fn placeholder_status(is_placeholder: bool) -> &'static str {
    if is_placeholder {
        "placeholder"
    } else {
        "ok"
    }
}

fn print_config(app_config: &AppConfig, default_model: &str) {
    print_section_header("Configuration");
    let temperature = app_config.temperature.to_string();
    let max_tokens = match app_config.max_tokens {
        Some(max_tokens) => max_tokens.to_string(),
        None => "provider default".to_string(),
    };
    let max_results = app_config.max_results.to_string();
    let min_score = app_config.min_score.to_string();
    let api_key = match &app_config.api_key_source {
        ApiKeySource::None => "none",
        ApiKeySource::Static(_) => "static key",
        ApiKeySource::Command(_) => "command",
    };

    let mut table = TableBuilder::new(vec!["Setting", "Value", "Status"]);
    table.add_row(vec!["Region", app_config.region.as_str(), ""]);
    table.add_row(vec!["Provider", app_config.provider.as_str(), ""]);
    table.add_row(vec!["Default model", default_model, ""]);
    table.add_row(vec!["Temperature", temperature.as_str(), ""]);
    table.add_row(vec!["Max tokens", max_tokens.as_str(), ""]);
    table.add_row(vec![
        "SageMaker endpoint",
        app_config.sagemaker_endpoint.as_str(),
        placeholder_status(app_config.sagemaker_endpoint_is_placeholder()),
    ]);
    table.add_row(vec![
        "Knowledge base ID",
        app_config.knowledge_base_id.as_str(),
        placeholder_status(app_config.knowledge_base_id_is_placeholder()),
    ]);
    table.add_row(vec!["Max results", max_results.as_str(), ""]);
    table.add_row(vec!["Min score", min_score.as_str(), ""]);
    table.add_row(vec![
        "Scoring endpoint",
        app_config.scoring_endpoint.as_str(),
        placeholder_status(app_config.scoring_endpoint_is_placeholder()),
    ]);
    table.add_row(vec!["API key", api_key, ""]);
    table.print();
    print_section_footer();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let file_config = match &cli_args.config_file_path {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let cli_config = CliConfig {
        region: cli_args.region.clone(),
        ..Default::default()
    };
    let app_config = AppConfig::resolve(&cli_config, file_config, &EnvOverrides::from_env())?;

    let factory = HttpLlmFactory::from_config(&app_config);
    let model_key = match cli_args.model {
        Some(key) => {
            if factory.spec(&key).is_none() {
                let available = factory
                    .catalog()
                    .iter()
                    .map(|spec| spec.key.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                anyhow::bail!("Unknown model {:?}. Available: {}", key, available);
            }
            key
        }
        None => factory.default_key().to_string(),
    };

    print_config(&app_config, &model_key);

    if !cli_args.check {
        println!();
        print_info("Run with --check to send a test request to each endpoint");
        return Ok(());
    }

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

    println!();
    print_info("Probing configured endpoints...");
    println!();

    let (model, knowledge, scoring) = futures::join!(
        check_model(&factory, &model_key, &app_config),
        check_knowledge_base(&knowledge_base, &app_config),
        check_scoring(&scorer, &app_config),
    );

    let outcomes = [model, knowledge, scoring];
    let mut failed = 0;
    for outcome in &outcomes {
        match &outcome.status {
            CheckStatus::Passed(detail) => {
                print_success(&format!("{}: {}", outcome.name, detail));
            }
            CheckStatus::Failed(detail) => {
                failed += 1;
                print_error(&format!("{}: {}", outcome.name, detail));
            }
            CheckStatus::Skipped(reason) => {
                print_warning(&format!("{}: skipped, {}", outcome.name, reason));
            }
        }
    }

    println!();
    if failed == 0 {
        print_success("All checks passed");
        Ok(())
    } else {
        print_error(&format!("{} of {} checks failed", failed, outcomes.len()));
        std::process::exit(1);
    }
}
