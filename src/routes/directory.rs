//! Read-only staff views: tenants, reference solutions and dashboard totals.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::api::{DataResponse, Paginated, PaginationParams};
use crate::app::AppState;
use crate::domain::solutions::SolutionQuery;
use crate::error::ApiResult;

/// GET /tenants
pub async fn list_tenants(
    State(state): State<Arc<AppState>>,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<impl IntoResponse> {
    let (tenants, total) = state.dashboard.tenants(&pagination).await?;
    Ok(Paginated::new(tenants, &pagination, total))
}

/// GET /solutions
pub async fn list_solutions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SolutionQuery>,
) -> ApiResult<impl IntoResponse> {
    let solutions = state.solutions.list(query.category).await?;
    Ok(Json(DataResponse::new(solutions)))
}

/// GET /dashboard/stats
pub async fn dashboard_stats(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let stats = state.dashboard.stats().await?;
    Ok(Json(DataResponse::new(stats)))
}
