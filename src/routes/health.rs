use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::app::AppState;
use crate::db;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub services: ServiceHealth,
}

#[derive(Serialize)]
pub struct ServiceHealth {
    pub database: String,
    pub remote_model: String,
    pub knowledge_base: String,
    pub knowledge_documents: usize,
}

/// Health check endpoint - public
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<HealthResponse>) {
    let remote_check = async {
        match &state.ai_client {
            Some(client) => Some(client.health_check().await.is_ok()),
            None => None,
        }
    };

    // Check all services in parallel
    let (db_ok, remote, knowledge) = tokio::join!(
        db::health_check(&state.db),
        remote_check,
        state.knowledge.count(),
    );

    let remote_status = match remote {
        Some(true) => "ok",
        Some(false) => "error",
        None => "disabled",
    };

    // The keyword pipeline covers for the remote model, so only the
    // database and knowledge base are critical
    let status = if db_ok && knowledge.is_ok() && remote != Some(false) {
        "healthy"
    } else if db_ok {
        "degraded"
    } else {
        "unhealthy"
    };

    let status_code = if status == "unhealthy" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (
        status_code,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            services: ServiceHealth {
                database: if db_ok { "ok" } else { "error" }.to_string(),
                remote_model: remote_status.to_string(),
                knowledge_base: if knowledge.is_ok() { "ok" } else { "error" }.to_string(),
                knowledge_documents: knowledge.unwrap_or(0),
            },
        }),
    )
}
