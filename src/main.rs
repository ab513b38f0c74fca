mod api;
mod app;
mod config;
mod db;
mod domain;
mod error;
mod logging;
mod middleware;
mod routes;
mod services;

use anyhow::Result;

use services::{embeddings, knowledge, AiClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = config::Settings::from_env()?;

    // Initialize logging
    logging::init_logging(&settings.env);

    tracing::info!(
        env = ?settings.env,
        server_addr = %settings.server_addr,
        "Starting AutoMaintain backend"
    );

    // Create database pool (runs migrations)
    let pool = db::create_pool(&settings).await?;

    // Open the knowledge base
    let embedder = embeddings::load_embedder(settings.embedding_model_dir.as_deref());
    let knowledge = knowledge::open_knowledge_store(&settings.knowledge_dir, embedder).await?;

    // Remote model is optional; without a key the keyword pipeline answers
    let ai_client = match &settings.llm_api_key {
        Some(api_key) => Some(AiClient::new(
            &settings.llm_base_url,
            api_key,
            &settings.llm_model,
            settings.llm_timeout_seconds,
        )?),
        None => {
            tracing::warn!("LLM_API_KEY not set - using deterministic classification only");
            None
        }
    };

    // Optionally check remote model health (non-blocking)
    if let Some(ai_client) = ai_client.clone() {
        tokio::spawn(async move {
            match ai_client.health_check().await {
                Ok(()) => tracing::info!(model = ai_client.model(), "Remote model is reachable"),
                Err(e) => tracing::warn!(error = %e, "Remote model health check failed - fallback will cover"),
            }
        });
    }

    // Create application state
    let state = app::AppState::new(pool, settings.clone(), ai_client, knowledge);

    // Build application
    let app = app::create_app(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&settings.server_addr).await?;
    tracing::info!("Listening on {}", settings.server_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
