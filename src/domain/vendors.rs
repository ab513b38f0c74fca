//! Vendor domain types
//!
//! Service providers staff can assign to requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::maintenance::Category;

/// Vendor entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vendor {
    pub id: i64,
    pub company_name: String,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub specialization: Category,
    pub hourly_rate: f64,
    pub rating: f64, // 1.0-5.0 scale
    pub created_at: DateTime<Utc>,
}

/// Request DTO for adding a vendor
#[derive(Debug, Clone, Deserialize)]
pub struct CreateVendorRequest {
    pub company_name: String,
    #[serde(default)]
    pub contact_person: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub specialization: Category,
    #[serde(default = "default_hourly_rate")]
    pub hourly_rate: f64,
    #[serde(default = "default_rating")]
    pub rating: f64,
}

fn default_hourly_rate() -> f64 {
    75.0
}

fn default_rating() -> f64 {
    4.0
}

/// Aggregated job statistics per vendor
#[derive(Debug, Clone, Serialize)]
pub struct VendorPerformance {
    pub vendor_id: i64,
    pub company_name: String,
    pub specialization: Category,
    pub total_requests: i64,
    pub resolved_requests: i64,
    pub success_rate: f64, // percent, one decimal
    pub avg_cost: f64,
    pub rating: f64,
}
