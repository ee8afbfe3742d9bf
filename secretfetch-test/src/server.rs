//! In-process local endpoint management

use std::sync::{Arc, Once};
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::info;

use secretfetch_secretsmanager::{NewSecret, SecretsManagerState};

use crate::STARTUP_TIMEOUT_SECS;

/// A running local Secrets Manager endpoint
pub struct TestServer {
    state: Arc<SecretsManagerState>,
    port: u16,
    base_url: String,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Start the endpoint on a free port and wait until it answers
    pub async fn start() -> Result<Self, TestError> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| TestError::StartFailed(e.to_string()))?;
        let port = listener
            .local_addr()
            .map_err(|e| TestError::StartFailed(e.to_string()))?
            .port();

        let state = Arc::new(SecretsManagerState::new());
        let router = secretfetch_secretsmanager::router(state.clone());

        info!(port = port, "Starting local Secrets Manager");
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!(error = %e, "Local Secrets Manager stopped");
            }
        });

        let base_url = format!("http://127.0.0.1:{}", port);
        let server = Self {
            state,
            port,
            base_url,
            handle,
        };
        server.wait_ready().await?;
        Ok(server)
    }

    async fn wait_ready(&self) -> Result<(), TestError> {
        let health = format!("{}/health", self.base_url);
        let start = std::time::Instant::now();

        while start.elapsed() < Duration::from_secs(STARTUP_TIMEOUT_SECS) {
            if let Ok(response) = reqwest::get(&health).await {
                if response.status().is_success() {
                    info!(port = self.port, "Local Secrets Manager ready");
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        Err(TestError::StartupTimeout)
    }

    /// Get the base URL
    pub fn url(&self) -> &str {
        &self.base_url
    }

    /// Shared endpoint state, for direct inspection
    pub fn state(&self) -> &Arc<SecretsManagerState> {
        &self.state
    }

    /// Store a string secret in `region`
    pub fn seed(&self, region: &str, name: &str, value: &str) {
        self.state
            .storage
            .create_secret(region, NewSecret::string(name, value))
            .unwrap_or_else(|e| panic!("failed to seed secret {name}: {e}"));
    }

    /// Store a binary-only secret in `region`
    pub fn seed_binary(&self, region: &str, name: &str, base64_value: &str) {
        self.state
            .storage
            .create_secret(
                region,
                NewSecret {
                    name: name.to_string(),
                    secret_binary: Some(base64_value.to_string()),
                    ..NewSecret::default()
                },
            )
            .unwrap_or_else(|e| panic!("failed to seed secret {name}: {e}"));
    }

    /// SDK client for `region` pointed at this endpoint
    pub async fn client(&self, region: &'static str) -> aws_sdk_secretsmanager::Client {
        crate::create_client(self.url(), region).await
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Errors that can occur with the test server
#[derive(Debug, Error)]
pub enum TestError {
    #[error("Failed to start server: {0}")]
    StartFailed(String),

    #[error("Server startup timed out")]
    StartupTimeout,
}

/// Install a test-friendly `tracing` subscriber once per process
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "secretfetch=debug".into()),
            )
            .with_test_writer()
            .try_init();
    });
}
