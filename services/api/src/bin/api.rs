//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, OpenAiAnswerAdapter},
    config::{Config, ConfigError},
    error::ApiError,
    tasks::spawn_escalation_sweep,
    web::{router, state::AppState},
};
use async_openai::{config::OpenAIConfig, Client};
use doubt_forum_core::{DoubtStore, EscalationEngine, InMemoryDoubtStore, SystemClock};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!(
        profile = ?config.escalation_profile,
        senior_after_secs = config.senior_after.as_secs(),
        professor_after_secs = config.professor_after.as_secs(),
        "Configuration loaded. Starting server..."
    );

    // --- 2. Choose the Doubt Store ---
    let store: Arc<dyn DoubtStore> = match &config.database_url {
        Some(database_url) => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await?;
            let db_adapter = DbAdapter::new(db_pool);
            info!("Running database migrations...");
            db_adapter.run_migrations().await?;
            info!("Database migrations complete.");
            Arc::new(db_adapter)
        }
        None => {
            warn!("DATABASE_URL is not set; doubts are kept in memory and lost on restart");
            Arc::new(InMemoryDoubtStore::new())
        }
    };

    // --- 3. Initialize the Answer Adapter ---
    let openai_config = OpenAIConfig::new().with_api_key(
        config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| ConfigError::MissingVar("OPENAI_API_KEY".to_string()))?,
    );
    let openai_client = Client::with_config(openai_config);
    let answer_adapter = OpenAiAnswerAdapter::new(openai_client, config.answer_model.clone())
        .map_err(|e| ApiError::Internal(format!("Failed to build markdown cleaner: {}", e)))?;

    // --- 4. Build the Engine and the Shared AppState ---
    let engine = Arc::new(EscalationEngine::new(
        store,
        Arc::new(answer_adapter),
        Arc::new(SystemClock),
        config.escalation_policy(),
    ));
    let app_state = Arc::new(AppState {
        engine: engine.clone(),
        config: config.clone(),
    });

    // --- 5. Start the Escalation Sweep ---
    let shutdown = CancellationToken::new();
    let sweep = spawn_escalation_sweep(engine, config.sweep_interval, shutdown.clone());

    // --- 6. Create the Web Router & Start the Server ---
    let app = router(app_state)?;
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received");
        })
        .await?;

    // --- 7. Stop Background Work ---
    shutdown.cancel();
    if let Err(e) = sweep.await {
        warn!(error = %e, "Escalation sweep task ended abnormally");
    }
    info!("Server stopped");

    Ok(())
}
