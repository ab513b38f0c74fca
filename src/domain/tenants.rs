//! Tenant domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tenant entity. Email is the natural de-duplication key when present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub unit_number: String,
    pub created_at: DateTime<Utc>,
}
