//! Maintenance request routes
//!
//! Tenant submission plus the staff workflow: triage, scheduling and
//! vendor assignment.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use rand::{rngs::StdRng, SeedableRng};
use std::sync::Arc;

use crate::api::{Created, DataResponse, Paginated, PaginationParams};
use crate::app::AppState;
use crate::domain::maintenance::{
    AssignVendorRequest, CalendarQuery, CalendarSummaryQuery, RequestQuery, ScheduleRequest,
    SubmitRequest, UpdateStatusRequest,
};
use crate::error::ApiResult;
use crate::middleware::request_id::RequestIdExt;

/// POST /requests
///
/// Classify, price and store a tenant's request; responds with the stored
/// request and suggested fixes.
pub async fn submit_request(
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubmitRequest>,
) -> ApiResult<impl IntoResponse> {
    tracing::info!(
        request_id = headers.request_id(),
        unit = %req.unit,
        "Submitting maintenance request"
    );

    let mut rng = StdRng::from_entropy();
    let response = state.requests.submit(req, &mut rng).await?;

    Ok(Created(DataResponse::new(response)))
}

/// GET /requests
pub async fn list_requests(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RequestQuery>,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<impl IntoResponse> {
    let (requests, total) = state.requests.list(&query, &pagination).await?;
    Ok(Paginated::new(requests, &pagination, total))
}

/// GET /requests/:request_id
pub async fn get_request(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let request = state.requests.get(request_id).await?;
    Ok(Json(DataResponse::new(request)))
}

/// PATCH /requests/:request_id/status
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<i64>,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<impl IntoResponse> {
    let request = state.requests.update_status(request_id, req).await?;
    Ok(Json(DataResponse::new(request)))
}

/// POST /requests/:request_id/schedule
pub async fn schedule_request(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<i64>,
    Json(req): Json<ScheduleRequest>,
) -> ApiResult<impl IntoResponse> {
    let request = state.requests.schedule(request_id, req).await?;
    Ok(Json(DataResponse::new(request)))
}

/// POST /requests/:request_id/assign
pub async fn assign_vendor(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<i64>,
    Json(req): Json<AssignVendorRequest>,
) -> ApiResult<impl IntoResponse> {
    let request = state.requests.assign_vendor(request_id, req).await?;
    Ok(Json(DataResponse::new(request)))
}

/// GET /calendar
///
/// Scheduled visits in a window, next 30 days by default.
pub async fn calendar(
    State(state): State<Arc<AppState>>,
    Query(window): Query<CalendarQuery>,
) -> ApiResult<impl IntoResponse> {
    let visits = state.requests.calendar(window).await?;
    Ok(Json(DataResponse::new(visits)))
}

/// GET /calendar/summary
pub async fn calendar_summary(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CalendarSummaryQuery>,
) -> ApiResult<impl IntoResponse> {
    let summary = state.requests.calendar_summary(query).await?;
    Ok(Json(DataResponse::new(summary)))
}
