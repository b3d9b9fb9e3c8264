//! Wiring & DI. Entry point: bootstrap adapters, inject into the session
//! controller, run the UI. No business logic here.

use docflow::adapters::http::{
    HttpAnalysisGateway, HttpChatGateway, HttpClient, HttpDocumentGateway,
};
use docflow::adapters::mock::MockBackend;
use docflow::adapters::persistence::TokenStore;
use docflow::adapters::ui::{ConsoleNotifier, ReplInputPort};
use docflow::ports::{AnalysisGateway, ChatGateway, DocumentGateway, InputPort, Notifier};
use docflow::shared::AppConfig;
use docflow::usecases::{RetryPolicy, SessionController, TokioSleeper};
use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let env_loaded = dotenv();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &env_loaded {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(_) => info!(cwd = %cwd.display(), "no .env found (check CWD)"),
    }

    docflow::adapters::ui::init_ui();

    let cfg = AppConfig::load().unwrap_or_default();

    // --- Gateways: real backend when configured, mock otherwise ---
    let (documents, analysis, chat): (
        Arc<dyn DocumentGateway>,
        Arc<dyn AnalysisGateway>,
        Arc<dyn ChatGateway>,
    ) = if cfg.is_backend_configured() {
        let base_url = cfg.api_base_url.clone().unwrap_or_default();
        info!(%base_url, "using HTTP backend");

        let tokens = Arc::new(TokenStore::new(cfg.token_path_or_default()));
        tokens.load().await;

        let client = Arc::new(
            HttpClient::new(
                &base_url,
                Arc::clone(&tokens),
                Duration::from_secs(cfg.request_timeout_secs_or_default()),
                Duration::from_secs(cfg.upload_timeout_secs_or_default()),
            )
            .map_err(|e| anyhow::anyhow!("HTTP client init failed: {}", e))?,
        );

        // Log in when credentials are configured and no session is persisted.
        if tokens.access_token().await.is_none() {
            match (cfg.username.as_deref(), cfg.password.as_deref()) {
                (Some(username), Some(password)) => {
                    client
                        .login(username, password)
                        .await
                        .map_err(|e| anyhow::anyhow!("login failed: {}", e))?;
                }
                _ => anyhow::bail!(
                    "No stored session. Set DOCFLOW_USERNAME and DOCFLOW_PASSWORD (env or .env)."
                ),
            }
        }

        (
            Arc::new(HttpDocumentGateway::new(Arc::clone(&client))),
            Arc::new(HttpAnalysisGateway::new(Arc::clone(&client))),
            Arc::new(HttpChatGateway::new(client)),
        )
    } else {
        warn!("DOCFLOW_API_BASE_URL is not set, using the built-in mock backend");
        let mock = Arc::new(MockBackend::new(cfg.mock_delay_ms_or_default()));
        (
            Arc::clone(&mock) as Arc<dyn DocumentGateway>,
            Arc::clone(&mock) as Arc<dyn AnalysisGateway>,
            mock as Arc<dyn ChatGateway>,
        )
    };

    // --- Session controller ---
    let notifier: Arc<dyn Notifier> = Arc::new(ConsoleNotifier);
    let retry = RetryPolicy::new(
        cfg.retry_attempts_or_default(),
        Duration::from_millis(cfg.retry_delay_ms_or_default()),
        Arc::new(TokioSleeper),
    );
    let session = Arc::new(SessionController::new(
        documents, analysis, chat, notifier, retry,
    ));

    // --- UI loop ---
    let ui = ReplInputPort::new(session, cfg.download_dir_or_default());
    ui.run().await
}
