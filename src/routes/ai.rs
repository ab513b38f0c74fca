//! Classification pipeline endpoints.
//!
//! Each stage of the submission pipeline is exposed on its own so staff
//! tools can classify, price or look up fixes without filing a request.
//! None of these fail when the remote model is down.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use rand::{rngs::StdRng, SeedableRng};
use std::sync::Arc;

use crate::api::response::DataResponse;
use crate::app::AppState;
use crate::domain::interactions::{AskRequest, DescriptionRequest, InteractionQuery};
use crate::domain::maintenance::{ClassifyResponse, EstimateResponse};
use crate::domain::Category;
use crate::error::{ApiError, ApiResult};
use crate::middleware::request_id::RequestIdExt;

/// Upper bound on recommendations per call.
const MAX_TOP_K: usize = 10;

fn require_description(req: &DescriptionRequest) -> ApiResult<&str> {
    let description = req.description.trim();
    if description.is_empty() {
        return Err(ApiError::validation("Description is required"));
    }
    Ok(description)
}

/// Explicit category, or whatever the classifier decides.
async fn resolve_category(state: &AppState, req: &DescriptionRequest, description: &str) -> Category {
    match req.category {
        Some(category) => category,
        None => state.classifier.classify(description).await.0.category,
    }
}

/// POST /ai/classify
pub async fn classify(
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    Json(req): Json<DescriptionRequest>,
) -> ApiResult<impl IntoResponse> {
    let description = require_description(&req)?;
    let (classification, classified_by) = state.classifier.classify(description).await;

    tracing::debug!(
        request_id = headers.request_id(),
        category = %classification.category,
        priority = %classification.priority,
        "Issue classified"
    );

    Ok(Json(DataResponse::new(ClassifyResponse {
        category: classification.category,
        priority: classification.priority,
        classified_by,
    })))
}

/// POST /ai/estimate
pub async fn estimate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DescriptionRequest>,
) -> ApiResult<impl IntoResponse> {
    let description = require_description(&req)?;
    let category = resolve_category(&state, &req, description).await;

    let mut rng = StdRng::from_entropy();
    let (estimated_cost, source) = state.estimator.estimate(description, category, &mut rng).await;

    Ok(Json(DataResponse::new(EstimateResponse {
        category,
        estimated_cost,
        source,
    })))
}

/// POST /ai/recommend
pub async fn recommend(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DescriptionRequest>,
) -> ApiResult<impl IntoResponse> {
    let description = require_description(&req)?;
    let category = resolve_category(&state, &req, description).await;
    let top_k = req
        .top_k
        .unwrap_or(state.settings.recommendation_top_k)
        .min(MAX_TOP_K);

    let recommendations = state.recommender.recommend(description, category, top_k).await;

    Ok(Json(DataResponse::new(recommendations)))
}

/// POST /ai/ask
pub async fn ask(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AskRequest>,
) -> ApiResult<impl IntoResponse> {
    let question = req.question.trim();
    if question.is_empty() {
        return Err(ApiError::validation("Question is required"));
    }

    let response = state.assistant.answer(req.tenant_id, question).await;
    Ok(Json(DataResponse::new(response)))
}

/// GET /ai/interactions
pub async fn list_interactions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<InteractionQuery>,
) -> ApiResult<impl IntoResponse> {
    let entries = state.interactions.recent(query.limit).await?;
    Ok(Json(DataResponse::new(entries)))
}
