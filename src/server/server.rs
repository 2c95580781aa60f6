use anyhow::Result;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tracing::error;

use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::metrics::{
    metrics_handler, record_chat_failure, record_chat_turn, set_active_sessions,
};
use super::session::{SessionStore, Turn};
use super::{log_requests, state::*, RequestsLoggingLevel, ServerConfig};
use crate::agent::llm::{LlmError, LlmFactory};
use crate::agent::trace::TraceStep;
use crate::assistants::{
    build_teacher_registry, ChatMode, KnowledgeFlow, QueryRouter, Route, RouterSettings,
};
use crate::config::AppConfig;

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
    pub version: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Deserialize, Debug)]
struct ChatRequestBody {
    pub session_id: Option<String>,
    pub message: String,
    #[serde(default)]
    pub mode: ChatMode,
    pub model: Option<String>,
    /// When set, the response carries the per-turn execution trace.
    #[serde(default)]
    pub debug: bool,
}

#[derive(Serialize)]
struct ChatResponseBody {
    session_id: String,
    reply: String,
    route: Route,
    #[serde(skip_serializing_if = "Option::is_none")]
    assistant: Option<String>,
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    trace: Option<Vec<TraceStep>>,
}

#[derive(Serialize)]
struct ModelsResponse {
    default: String,
    models: Vec<crate::agent::llm::ModelSpec>,
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
        version: env!("APP_VERSION").to_string(),
    };
    Json(stats)
}

async fn post_chat(State(state): State<ServerState>, Json(body): Json<ChatRequestBody>) -> Response {
    let message = body.message.trim();
    if message.is_empty() {
        return (StatusCode::BAD_REQUEST, "message must not be empty").into_response();
    }

    let model_key = body
        .model
        .unwrap_or_else(|| state.llm_factory.default_key().to_string());
    let llm = match state.llm_factory.create(&model_key) {
        Ok(llm) => llm,
        Err(LlmError::UnknownModel(key)) => {
            return (StatusCode::BAD_REQUEST, format!("Unknown model: {}", key)).into_response();
        }
        Err(err) => {
            error!("Failed to construct provider {}: {}", model_key, err);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let settings = RouterSettings::from_config(&state.app_config);
    let session = state.sessions.get_or_create(body.session_id.as_deref());
    let history = session.history_messages(settings.history_limit);

    let options = settings.completion_options();
    let tools = Arc::new(build_teacher_registry(
        llm.clone(),
        state.scorer.clone(),
        &options,
    ));
    let knowledge = KnowledgeFlow::new(
        llm.clone(),
        state.knowledge_base.clone(),
        state.app_config.max_results,
        &options,
    );
    let router = QueryRouter::new(llm, tools, knowledge, settings);

    let started = Instant::now();
    let answered = router.answer(&history, message, body.mode).await;
    record_chat_turn(answered.route.as_str(), &model_key, started.elapsed());
    if let Some(stage) = answered.failure {
        record_chat_failure(stage);
    }

    state.sessions.append(&session.id, Turn::user(message));
    state.sessions.append(
        &session.id,
        Turn::assistant(
            answered.reply.clone(),
            answered.route,
            answered.assistant.clone(),
        ),
    );
    set_active_sessions(state.sessions.active_count());

    Json(ChatResponseBody {
        session_id: session.id,
        reply: answered.reply,
        route: answered.route,
        assistant: answered.assistant,
        model: model_key,
        trace: body.debug.then_some(answered.trace),
    })
    .into_response()
}

async fn get_models(State(llm_factory): State<GuardedLlmFactory>) -> impl IntoResponse {
    Json(ModelsResponse {
        default: llm_factory.default_key().to_string(),
        models: llm_factory.catalog().to_vec(),
    })
}

async fn get_session(
    State(sessions): State<GuardedSessionStore>,
    Path(id): Path<String>,
) -> Response {
    match sessions.get(&id) {
        Some(session) => Json(session).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn delete_session(
    State(sessions): State<GuardedSessionStore>,
    Path(id): Path<String>,
) -> Response {
    if sessions.clear(&id) {
        set_active_sessions(sessions.active_count());
        StatusCode::OK.into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

impl ServerState {
    fn new(
        config: ServerConfig,
        app_config: AppConfig,
        llm_factory: GuardedLlmFactory,
        knowledge_base: GuardedKnowledgeBase,
        scorer: GuardedScorer,
    ) -> ServerState {
        ServerState {
            config,
            app_config,
            start_time: Instant::now(),
            llm_factory,
            knowledge_base,
            scorer,
            sessions: Arc::new(SessionStore::new()),
            hash: env!("GIT_HASH").to_owned(),
        }
    }
}

pub fn make_app(
    config: ServerConfig,
    app_config: AppConfig,
    llm_factory: GuardedLlmFactory,
    knowledge_base: GuardedKnowledgeBase,
    scorer: GuardedScorer,
) -> Result<Router> {
    let state = ServerState::new(
        config.clone(),
        app_config,
        llm_factory,
        knowledge_base,
        scorer,
    );

    let api_routes: Router = Router::new()
        .route("/chat", post(post_chat))
        .route("/models", get(get_models))
        .route("/session/{id}", get(get_session))
        .route("/session/{id}", delete(delete_session))
        .with_state(state.clone());

    let home_router: Router = match config.frontend_dir_path {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new()
            .route("/", get(home))
            .with_state(state.clone()),
    };

    let mut app: Router = home_router
        .nest("/v1", api_routes)
        .route("/metrics", get(metrics_handler));

    app = app.layer(CorsLayer::permissive());
    app = app.layer(middleware::from_fn_with_state(state.clone(), log_requests));

    Ok(app)
}

pub async fn run_server(
    app_config: AppConfig,
    llm_factory: GuardedLlmFactory,
    knowledge_base: GuardedKnowledgeBase,
    scorer: GuardedScorer,
    requests_logging_level: RequestsLoggingLevel,
    port: u16,
    frontend_dir_path: Option<String>,
) -> Result<()> {
    let config = ServerConfig {
        port,
        requests_logging_level,
        frontend_dir_path,
    };
    let app = make_app(config, app_config, llm_factory, knowledge_base, scorer)?;

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;

    Ok(axum::serve(listener, app).await?)
}
