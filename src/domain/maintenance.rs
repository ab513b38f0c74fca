//! Maintenance request domain types
//!
//! Requests submitted by tenants, the classification vocabulary the
//! pipeline produces, and the status workflow staff drive them through.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::dashboard::MonthlyCount;
use super::solutions::Recommendation;

/// Issue category. Declaration order is the classifier's tie-break order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Plumbing,
    Electrical,
    Hvac,
    Structural,
    Appliance,
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Self::Plumbing,
        Self::Electrical,
        Self::Hvac,
        Self::Structural,
        Self::Appliance,
        Self::Other,
    ];

    /// Storage / wire form
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plumbing => "plumbing",
            Self::Electrical => "electrical",
            Self::Hvac => "hvac",
            Self::Structural => "structural",
            Self::Appliance => "appliance",
            Self::Other => "other",
        }
    }

    /// Human-facing label, also used in model prompts
    pub fn label(&self) -> &'static str {
        match self {
            Self::Plumbing => "Plumbing",
            Self::Electrical => "Electrical",
            Self::Hvac => "HVAC",
            Self::Structural => "Structural",
            Self::Appliance => "Appliance",
            Self::Other => "Other",
        }
    }

    /// Case-insensitive parse of either form. "General" maps to `Other`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "plumbing" => Some(Self::Plumbing),
            "electrical" => Some(Self::Electrical),
            "hvac" => Some(Self::Hvac),
            "structural" => Some(Self::Structural),
            "appliance" | "appliances" => Some(Self::Appliance),
            "other" | "general" => Some(Self::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for Category {
    fn from(s: String) -> Self {
        Self::parse(&s).unwrap_or(Self::Other)
    }
}

/// Triage priority
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for Priority {
    fn from(s: String) -> Self {
        Self::parse(&s).unwrap_or(Self::Medium)
    }
}

/// Tenant-declared urgency
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    #[default]
    Normal,
    Urgent,
    Emergency,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Urgent => "urgent",
            Self::Emergency => "emergency",
        }
    }
}

impl From<String> for Urgency {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "urgent" => Self::Urgent,
            "emergency" => Self::Emergency,
            _ => Self::Normal,
        }
    }
}

/// Request workflow status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    #[default]
    Pending,
    InProgress,
    Resolved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
            Self::Rejected => "rejected",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::InProgress => 1,
            Self::Resolved | Self::Rejected => 2,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.rank() == 2
    }

    /// Forward-only workflow: Pending -> InProgress -> {Resolved, Rejected}.
    /// Re-applying the current non-terminal status is a no-op and allowed.
    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next.rank() >= self.rank()
    }
}

impl From<String> for RequestStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "in_progress" => Self::InProgress,
            "resolved" => Self::Resolved,
            "rejected" => Self::Rejected,
            _ => Self::Pending,
        }
    }
}

/// Output of the classification pipeline
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Classification {
    pub category: Category,
    pub priority: Priority,
}

impl Classification {
    pub fn new(category: Category, priority: Priority) -> Self {
        Self { category, priority }
    }
}

/// Which provider produced a classification or estimate
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Remote,
    Deterministic,
}

/// Where a cost estimate came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EstimateSource {
    Historical,
    Remote,
    Fallback,
}

/// Maintenance request entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceRequest {
    pub id: i64,
    pub tenant_id: i64,
    pub tenant_name: Option<String>,
    pub unit_number: Option<String>,
    pub category: Category,
    pub priority: Priority,
    pub urgency: Urgency,
    pub description: String,
    pub status: RequestStatus,
    pub estimated_cost: Option<f64>,
    pub actual_cost: Option<f64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub vendor_id: Option<i64>,
    pub vendor_name: Option<String>,
    pub attachment_paths: Vec<String>,
}

/// Request DTO for a tenant submitting an issue
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRequest {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub unit: String,
    pub description: String,
    /// Explicit category; the classifier decides when absent
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub urgency: Urgency,
    #[serde(default)]
    pub preferred_time: Option<String>,
    /// Paths of files already stored by the upload collaborator
    #[serde(default)]
    pub attachment_paths: Vec<String>,
}

/// Result of a successful submission
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionResponse {
    pub request: MaintenanceRequest,
    pub classification: Classification,
    pub classified_by: ProviderKind,
    pub estimated_cost: f64,
    pub estimate_source: EstimateSource,
    pub recommendations: Vec<Recommendation>,
}

/// Response DTO for the stand-alone classification endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ClassifyResponse {
    pub category: Category,
    pub priority: Priority,
    pub classified_by: ProviderKind,
}

/// Response DTO for the stand-alone estimate endpoint
#[derive(Debug, Clone, Serialize)]
pub struct EstimateResponse {
    pub category: Category,
    pub estimated_cost: f64,
    pub source: EstimateSource,
}

/// Query params for listing requests
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RequestQuery {
    #[serde(default)]
    pub status: Option<RequestStatus>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub priority: Option<Priority>,
}

/// Request DTO for moving a request through the workflow
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: RequestStatus,
    #[serde(default)]
    pub actual_cost: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Request DTO for booking a visit
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleRequest {
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub vendor_id: Option<i64>,
}

/// Request DTO for assigning a vendor
#[derive(Debug, Clone, Deserialize)]
pub struct AssignVendorRequest {
    pub vendor_id: i64,
}

/// Calendar window; defaults to the next 30 days
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CalendarQuery {
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CalendarSummaryQuery {
    /// Any day in the week to lay out; defaults to today
    #[serde(default)]
    pub week_of: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub weekday: String,
    pub visits: Vec<MaintenanceRequest>,
}

/// Monday-to-Sunday schedule plus visit counts per month.
#[derive(Debug, Clone, Serialize)]
pub struct CalendarSummary {
    pub week_start: NaiveDate,
    pub week: Vec<CalendarDay>,
    pub monthly: Vec<MonthlyCount>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parse_accepts_labels_and_wire_forms() {
        assert_eq!(Category::parse("HVAC"), Some(Category::Hvac));
        assert_eq!(Category::parse(" hvac "), Some(Category::Hvac));
        assert_eq!(Category::parse("General"), Some(Category::Other));
        assert_eq!(Category::parse("roofing"), None);
        for category in Category::ALL {
            assert_eq!(Category::parse(category.as_str()), Some(category));
            assert_eq!(Category::parse(category.label()), Some(category));
        }
    }

    #[test]
    fn status_workflow_is_forward_only() {
        use RequestStatus::*;
        assert!(Pending.can_transition_to(InProgress));
        assert!(Pending.can_transition_to(Rejected));
        assert!(InProgress.can_transition_to(Resolved));
        assert!(InProgress.can_transition_to(InProgress));
        assert!(!InProgress.can_transition_to(Pending));
        assert!(!Resolved.can_transition_to(InProgress));
        assert!(!Rejected.can_transition_to(Resolved));
    }

    #[test]
    fn enums_serialize_snake_case() {
        let json = serde_json::to_string(&RequestStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        let json = serde_json::to_string(&Category::Hvac).unwrap();
        assert_eq!(json, "\"hvac\"");
    }
}
