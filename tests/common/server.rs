//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server wired to scripted collaborators.

use super::constants::*;
use super::fixtures::{test_app_config, MockKnowledgeBase, MockScorer, ScriptedFactory, ScriptedLlm};
use std::sync::Arc;
use std::time::Duration;
use teachassist::server::metrics::init_metrics;
use teachassist::server::server::make_app;
use teachassist::server::state::{GuardedKnowledgeBase, GuardedLlmFactory, GuardedScorer};
use teachassist::server::{RequestsLoggingLevel, ServerConfig};
use tokio::net::TcpListener;

/// Test server instance wired to scripted collaborators
///
/// When dropped, the server gracefully shuts down.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Scripted LLM backing every model in the test catalog
    pub llm: Arc<ScriptedLlm>,

    /// In-memory knowledge base
    pub knowledge_base: Arc<MockKnowledgeBase>,

    /// Fixed-score loan scorer
    pub scorer: Arc<MockScorer>,

    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new test server on a random port
    ///
    /// This function:
    /// 1. Creates scripted LLM, knowledge base and scorer doubles
    /// 2. Binds to a random port (127.0.0.1:0)
    /// 3. Spawns the server in a background task
    /// 4. Waits for the server to be ready
    ///
    /// # Panics
    ///
    /// Panics if port binding fails, the app cannot be built, or the
    /// server does not become ready within the timeout.
    pub async fn spawn() -> Self {
        let llm = Arc::new(ScriptedLlm::new());
        let knowledge_base = Arc::new(MockKnowledgeBase::new());
        let scorer = Arc::new(MockScorer::new());

        // The metrics registry is process-global; registering twice is a no-op.
        init_metrics();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");

        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let base_url = format!("http://127.0.0.1:{}", port);

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            frontend_dir_path: None,
        };

        let llm_factory: GuardedLlmFactory = Arc::new(ScriptedFactory::new(llm.clone()));
        let knowledge_base_handle: GuardedKnowledgeBase = knowledge_base.clone();
        let scorer_handle: GuardedScorer = scorer.clone();

        let app = make_app(
            config,
            test_app_config(),
            llm_factory,
            knowledge_base_handle,
            scorer_handle,
        )
        .expect("Failed to build app");

        // Spawn server in background task with graceful shutdown
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            llm,
            knowledge_base,
            scorer,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the server to become ready by polling the home endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => {
                    // Server is ready
                    return;
                }
                _ => {
                    // Server not ready yet, wait and retry
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Send shutdown signal
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
