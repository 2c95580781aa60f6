use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use crossterm::style::Stylize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[allow(dead_code)]
mod cli_style;

use cli_style::{
    colors, get_styles, print_error, print_goodbye, print_help, print_info, print_key_value,
    print_success, print_welcome, CommandHelp, TableBuilder,
};

use rustyline::DefaultEditor;

use teachassist::agent::llm::{HttpLlmFactory, LlmFactory, Message, MessageRole};
use teachassist::assistants::{
    build_teacher_registry, ChatMode, KnowledgeFlow, QueryRouter, RouterSettings,
};
use teachassist::config::{parse_path, AppConfig, CliConfig, EnvOverrides, FileConfig};
use teachassist::knowledge::{HttpKnowledgeBase, KnowledgeBase};
use teachassist::scoring::{SageMakerScorer, Scorer};

const PROMPT: &str = "❯❯❯ ";

#[derive(Parser, Debug)]
#[command(styles=get_styles())]
struct CliArgs {
    /// Path to a TOML config file.
    #[clap(short, long, value_parser = parse_path)]
    pub config_file_path: Option<PathBuf>,

    /// Model key from the catalog to chat with.
    #[clap(short, long)]
    pub model: Option<String>,

    /// Routing mode for queries.
    #[clap(long, value_enum, default_value = "auto")]
    pub mode: ChatMode,

    /// AWS region for Bedrock, SageMaker and the knowledge base.
    #[clap(long)]
    pub region: Option<String>,

    /// Bedrock knowledge base ID for store/retrieve.
    #[clap(long)]
    pub knowledge_base_id: Option<String>,

    /// SageMaker endpoint name of the XGBoost loan scoring model.
    #[clap(long)]
    pub scoring_endpoint: Option<String>,
}

#[derive(Parser)]
#[command(styles=get_styles(), name = "")]
struct InnerCli {
    #[command(subcommand)]
    command: InnerCommand,
}

#[derive(Subcommand)]
enum InnerCommand {
    /// Shows or sets the routing mode: auto, teacher or knowledge.
    Mode { mode: Option<String> },

    /// Shows or switches the active model.
    Model { key: Option<String> },

    /// Lists the model catalog.
    Models,

    /// Clears the conversation history.
    Clear,

    /// Shows the conversation so far.
    History,

    /// Shows available commands.
    Help,

    /// Close this program.
    Exit,
}

const COMMANDS: &[CommandHelp] = &[
    CommandHelp {
        name: "/mode",
        args: "[auto|teacher|knowledge]",
        description: "Show or set the routing mode",
    },
    CommandHelp {
        name: "/model",
        args: "[key]",
        description: "Show or switch the active model",
    },
    CommandHelp {
        name: "/models",
        args: "",
        description: "List the model catalog",
    },
    CommandHelp {
        name: "/clear",
        args: "",
        description: "Clear the conversation history",
    },
    CommandHelp {
        name: "/history",
        args: "",
        description: "Show the conversation so far",
    },
    CommandHelp {
        name: "/help",
        args: "",
        description: "Show available commands",
    },
    CommandHelp {
        name: "/exit",
        args: "",
        description: "Close this program",
    },
];

enum CommandExecutionResult {
    Ok,
    Exit,
    Error(String),
}

struct ChatSession {
    app_config: AppConfig,
    factory: HttpLlmFactory,
    knowledge_base: Arc<dyn KnowledgeBase>,
    scorer: Arc<dyn Scorer>,
    settings: RouterSettings,
    model_key: String,
    mode: ChatMode,
    history: Vec<Message>,
}

impl ChatSession {
    fn router(&self) -> Result<QueryRouter> {
        let llm = self.factory.create(&self.model_key)?;
        let options = self.settings.completion_options();
        let tools = Arc::new(build_teacher_registry(
            llm.clone(),
            self.scorer.clone(),
            &options,
        ));
        let knowledge = KnowledgeFlow::new(
            llm.clone(),
            self.knowledge_base.clone(),
            self.app_config.max_results,
            &options,
        );
        Ok(QueryRouter::new(
            llm,
            tools,
            knowledge,
            self.settings.clone(),
        ))
    }

    fn ask(&mut self, runtime: &Runtime, query: &str) -> Result<()> {
        let router = self.router()?;
        let answered = runtime.block_on(router.answer(&self.history, query, self.mode));

        println!();
        println!("{}", answered.reply);
        let origin = match &answered.assistant {
            Some(assistant) => format!("[{} · {}]", answered.route.as_str(), assistant),
            None => format!("[{}]", answered.route.as_str()),
        };
        println!("  {}", origin.with(colors::DIM));
        println!();

        self.history.push(Message::user(query));
        self.history.push(Message::assistant(&answered.reply));
        let excess = self.history.len().saturating_sub(self.settings.history_limit);
        if excess > 0 {
            self.history.drain(..excess);
        }
        Ok(())
    }
}

fn execute_command(command: &str, session: &mut ChatSession) -> CommandExecutionResult {
    let args = shlex::split(command)
        .unwrap_or_else(|| command.split_whitespace().map(String::from).collect());

    let cli = InnerCli::try_parse_from(std::iter::once(" ").chain(args.iter().map(String::as_str)));

    match cli {
        Ok(cli) => match cli.command {
            InnerCommand::Mode { mode } => match mode {
                Some(mode) => match ChatMode::from_str(&mode, true) {
                    Ok(parsed) => {
                        session.mode = parsed;
                        print_success(&format!("Mode set to {}", parsed.as_str()));
                    }
                    Err(_) => {
                        return CommandExecutionResult::Error(format!(
                            "Invalid mode '{}'. Valid modes are: auto, teacher, knowledge",
                            mode
                        ));
                    }
                },
                None => print_key_value("Mode", session.mode.as_str()),
            },
            InnerCommand::Model { key } => match key {
                Some(key) => match session.factory.spec(&key) {
                    Some(spec) => {
                        let display_name = spec.display_name.clone();
                        session.model_key = key;
                        print_success(&format!("Switched to {}", display_name));
                    }
                    None => {
                        return CommandExecutionResult::Error(format!(
                            "Unknown model '{}'. Use /models to list the catalog",
                            key
                        ));
                    }
                },
                None => print_key_value("Model", &session.model_key),
            },
            InnerCommand::Models => {
                let mut table = TableBuilder::new(vec!["Key", "Model", "Provider"]);
                for spec in session.factory.catalog() {
                    table.add_row(vec![
                        spec.key.as_str(),
                        spec.display_name.as_str(),
                        spec.provider.as_str(),
                    ]);
                }
                table.print();
                println!();
                print_key_value("Active", &session.model_key);
            }
            InnerCommand::Clear => {
                session.history.clear();
                print_success("Conversation cleared");
            }
            InnerCommand::History => {
                if session.history.is_empty() {
                    print_info("No conversation yet");
                } else {
                    for message in &session.history {
                        let label = match message.role {
                            MessageRole::User => "you",
                            _ => "assistant",
                        };
                        println!(
                            "  {} {}",
                            format!("{}:", label).with(colors::DIM),
                            message.content
                        );
                    }
                }
            }
            InnerCommand::Help => print_help(COMMANDS),
            InnerCommand::Exit => return CommandExecutionResult::Exit,
        },

        Err(e) => {
            if let Err(_) = e.print() {
                println!("{}", e);
            }
        }
    }
    CommandExecutionResult::Ok
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    // Keep the REPL quiet by default; LOG_LEVEL opens it up.
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
        knowledge_base_id: cli_args.knowledge_base_id.clone(),
        scoring_endpoint: cli_args.scoring_endpoint.clone(),
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

    let model_display = factory
        .spec(&model_key)
        .map(|spec| spec.display_name.clone())
        .unwrap_or_else(|| model_key.clone());
    print_welcome(&model_display, &app_config.region);

    for warning in app_config.placeholder_warnings() {
        cli_style::print_warning(&warning);
    }

    let settings = RouterSettings::from_config(&app_config);
    let mut session = ChatSession {
        app_config,
        factory,
        knowledge_base: Arc::new(knowledge_base),
        scorer: Arc::new(scorer),
        settings,
        model_key,
        mode: cli_args.mode,
        history: Vec::new(),
    };

    let runtime = Runtime::new()?;
    let mut rl = DefaultEditor::new()?;

    loop {
        let readline = rl.readline(PROMPT);

        match readline {
            Ok(line) => {
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(&line);
                if let Some(command) = line.strip_prefix('/') {
                    match execute_command(command, &mut session) {
                        CommandExecutionResult::Ok => {}
                        CommandExecutionResult::Exit => {
                            break;
                        }
                        CommandExecutionResult::Error(err) => {
                            print_error(&err);
                            continue;
                        }
                    }
                } else if let Err(err) = session.ask(&runtime, &line) {
                    print_error(&format!("{}", err));
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                break;
            }
            Err(e) => {
                println!("Error: {:?}", e);
                break;
            }
        }
    }
    print_goodbye();
    Ok(())
}
