//! Staff dashboard aggregates

use serde::Serialize;

use super::maintenance::{Category, RequestStatus};

#[derive(Debug, Clone, Serialize)]
pub struct StatusCount {
    pub status: RequestStatus,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryBreakdown {
    pub category: Category,
    pub count: i64,
    pub avg_cost: Option<f64>,
}

/// Requests counted per calendar month, `YYYY-MM`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MonthlyCount {
    pub month: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub total_requests: i64,
    pub pending_requests: i64,
    pub avg_estimated_cost: Option<f64>,
    pub total_tenants: i64,
    pub by_status: Vec<StatusCount>,
    pub by_category: Vec<CategoryBreakdown>,
    /// Last 12 months including the current one, oldest first
    pub monthly_trends: Vec<MonthlyCount>,
}
