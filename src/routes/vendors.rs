//! Vendor routes

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::{Created, DataResponse};
use crate::app::AppState;
use crate::domain::vendors::CreateVendorRequest;
use crate::domain::Category;
use crate::error::ApiResult;

#[derive(Debug, Deserialize, Default)]
pub struct VendorQuery {
    #[serde(default)]
    pub specialization: Option<Category>,
}

/// GET /vendors
pub async fn list_vendors(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VendorQuery>,
) -> ApiResult<impl IntoResponse> {
    let vendors = state.vendors.list(query.specialization).await?;
    Ok(Json(DataResponse::new(vendors)))
}

/// POST /vendors
pub async fn create_vendor(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateVendorRequest>,
) -> ApiResult<impl IntoResponse> {
    let vendor = state.vendors.create(req).await?;
    Ok(Created(DataResponse::new(vendor)))
}

/// GET /vendors/performance
pub async fn vendor_performance(
    State(state): State<Arc<AppState>>,
) -> ApiResult<impl IntoResponse> {
    let report = state.vendors.performance().await?;
    Ok(Json(DataResponse::new(report)))
}
