use axum::Router;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use journal_companion::{
    api::routes,
    config::Config,
    orchestrator::{JournalOrchestrator, OrchestratorSettings},
    services::completion_client::OllamaCompletionClient,
    storage::{self, SeaOrmJournalRepository},
};

#[derive(Debug, Parser)]
#[command(name = "journal-companion", version, about = "Journaling service with an AI companion")]
struct Cli {
    /// Configuration file (defaults to ~/.journal-companion/config)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the HTTP port from configuration
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Load config
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.server_port = port;
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("journal_companion={}", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Initialize database
    let db_conn = storage::init_db_with_pool(&config.database_url, config.max_connections).await?;
    let repository = Arc::new(SeaOrmJournalRepository::new(db_conn));

    // Completion service
    let completion = Arc::new(OllamaCompletionClient::new(
        config.ollama_url.clone(),
        config.completion_model.clone(),
    ));
    match completion.health_check().await {
        Ok(true) => {
            tracing::info!("✅ Completion service reachable at {}", config.ollama_url);
            if let Ok(models) = completion.list_models().await {
                if !models.iter().any(|m| m == completion.model()) {
                    tracing::warn!(
                        "⚠️ Model {} not found; available: {}",
                        completion.model(),
                        models.join(", ")
                    );
                }
            }
        }
        Ok(false) => tracing::warn!("⚠️ Completion service health check returned false"),
        Err(e) => tracing::warn!(
            "⚠️ Completion service not available: {}. Reflections, summaries and chat will fail until it is.",
            e
        ),
    }

    let orchestrator = Arc::new(JournalOrchestrator::new(
        repository.clone(),
        repository.clone(),
        repository,
        completion,
        OrchestratorSettings::from(&config),
    ));

    let port = config.server_port;
    let cors_enabled = config.cors_enabled;
    let state = routes::AppState {
        config: Arc::new(RwLock::new(config)),
        orchestrator,
    };

    let mut app = Router::new()
        .merge(routes::create_router(state))
        .layer(TraceLayer::new_for_http());
    if cors_enabled {
        app = app.layer(CorsLayer::permissive());
    }

    // Start server
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🚀 Server listening on {}", addr);
    tracing::info!("📖 OpenAPI document at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
