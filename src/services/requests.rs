//! Maintenance request workflow.
//!
//! Submission runs the full pipeline: validation, classification, cost
//! estimate, a single transaction for the tenant and request rows, then
//! recommendations. The remaining operations move requests through the
//! staff workflow.

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use super::classifier::Classifier;
use super::estimator::CostEstimator;
use super::recommender::SolutionRecommender;
use crate::api::PaginationParams;
use crate::domain::dashboard::MonthlyCount;
use crate::domain::maintenance::{
    AssignVendorRequest, CalendarDay, CalendarQuery, CalendarSummary, CalendarSummaryQuery,
    MaintenanceRequest, RequestQuery, ScheduleRequest, SubmissionResponse, SubmitRequest,
    UpdateStatusRequest, Urgency,
};
use crate::domain::{Category, Classification, Priority, RequestStatus};
use crate::error::{ApiError, ApiResult};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("email regex is valid")
});

/// Default calendar window when no end date is given.
const CALENDAR_DAYS: i64 = 30;

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Trimmed, non-empty optional text.
fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Reject a submission before any pipeline stage runs.
pub fn validate_submission(req: &SubmitRequest) -> ApiResult<()> {
    if req.name.trim().is_empty() {
        return Err(ApiError::validation("Name is required"));
    }
    if req.unit.trim().is_empty() {
        return Err(ApiError::validation("Unit number is required"));
    }
    if req.description.trim().is_empty() {
        return Err(ApiError::validation("Issue description is required"));
    }
    if let Some(email) = non_empty(req.email.as_deref()) {
        if !is_valid_email(&email) {
            return Err(ApiError::validation(format!("Invalid email address: {email}")));
        }
    }
    Ok(())
}

/// Database row for a request joined with tenant and vendor names
#[derive(Debug, sqlx::FromRow)]
struct RequestRow {
    request_id: i64,
    tenant_id: i64,
    tenant_name: Option<String>,
    unit_number: Option<String>,
    category: String,
    priority: String,
    urgency: String,
    description: String,
    status: String,
    estimated_cost: Option<f64>,
    actual_cost: Option<f64>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    scheduled_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    vendor_id: Option<i64>,
    vendor_name: Option<String>,
    attachment_paths: String,
}

impl From<RequestRow> for MaintenanceRequest {
    fn from(row: RequestRow) -> Self {
        Self {
            id: row.request_id,
            tenant_id: row.tenant_id,
            tenant_name: row.tenant_name,
            unit_number: row.unit_number,
            category: Category::from(row.category),
            priority: Priority::from(row.priority),
            urgency: Urgency::from(row.urgency),
            description: row.description,
            status: RequestStatus::from(row.status),
            estimated_cost: row.estimated_cost,
            actual_cost: row.actual_cost,
            notes: row.notes,
            created_at: row.created_at,
            scheduled_at: row.scheduled_at,
            completed_at: row.completed_at,
            vendor_id: row.vendor_id,
            vendor_name: row.vendor_name,
            attachment_paths: serde_json::from_str(&row.attachment_paths).unwrap_or_default(),
        }
    }
}

const SELECT_REQUESTS: &str = r#"
    SELECT r.request_id, r.tenant_id, t.name AS tenant_name, t.unit_number,
           r.category, r.priority, r.urgency, r.description, r.status,
           r.estimated_cost, r.actual_cost, r.notes, r.created_at,
           r.scheduled_at, r.completed_at, r.vendor_id,
           v.company_name AS vendor_name, r.attachment_paths
    FROM maintenance_requests r
    LEFT JOIN tenants t ON t.tenant_id = r.tenant_id
    LEFT JOIN vendors v ON v.vendor_id = r.vendor_id
"#;

const PRIORITY_ORDER: &str =
    "CASE r.priority WHEN 'high' THEN 0 WHEN 'medium' THEN 1 ELSE 2 END";

fn push_filters<'a>(qb: &mut QueryBuilder<'a, Sqlite>, query: &RequestQuery) {
    qb.push(" WHERE 1 = 1");
    if let Some(status) = query.status {
        qb.push(" AND r.status = ").push_bind(status.as_str());
    }
    if let Some(category) = query.category {
        qb.push(" AND r.category = ").push_bind(category.as_str());
    }
    if let Some(priority) = query.priority {
        qb.push(" AND r.priority = ").push_bind(priority.as_str());
    }
}

#[derive(Clone)]
pub struct RequestService {
    db: SqlitePool,
    classifier: Classifier,
    estimator: CostEstimator,
    recommender: SolutionRecommender,
    top_k: usize,
}

impl RequestService {
    pub fn new(
        db: SqlitePool,
        classifier: Classifier,
        estimator: CostEstimator,
        recommender: SolutionRecommender,
        top_k: usize,
    ) -> Self {
        Self {
            db,
            classifier,
            estimator,
            recommender,
            top_k,
        }
    }

    /// Run the classification pipeline and persist the request.
    pub async fn submit<R: Rng + Send>(
        &self,
        req: SubmitRequest,
        rng: &mut R,
    ) -> ApiResult<SubmissionResponse> {
        validate_submission(&req)?;

        let description = req.description.trim().to_string();
        let (classified, classified_by) = self.classifier.classify(&description).await;
        // A tenant-chosen category wins; priority always comes from the classifier
        let classification = Classification::new(
            req.category.unwrap_or(classified.category),
            classified.priority,
        );

        let (estimated_cost, estimate_source) = self
            .estimator
            .estimate(&description, classification.category, rng)
            .await;

        let request_id = self
            .persist(&req, &description, classification, estimated_cost)
            .await?;

        tracing::info!(
            request_id,
            category = %classification.category,
            priority = %classification.priority,
            classified_by = ?classified_by,
            estimated_cost,
            "Maintenance request submitted"
        );

        let recommendations = self
            .recommender
            .recommend(&description, classification.category, self.top_k)
            .await;

        Ok(SubmissionResponse {
            request: self.get(request_id).await?,
            classification,
            classified_by,
            estimated_cost,
            estimate_source,
            recommendations,
        })
    }

    /// Tenant lookup-or-create and request insert as one unit.
    async fn persist(
        &self,
        req: &SubmitRequest,
        description: &str,
        classification: Classification,
        estimated_cost: f64,
    ) -> ApiResult<i64> {
        let notes = non_empty(req.preferred_time.as_deref())
            .map(|preferred| format!("Preferred time: {preferred}"));

        let attachments = serde_json::to_string(&req.attachment_paths)
            .map_err(|e| ApiError::internal(format!("Failed to encode attachments: {e}")))?;

        let mut tx = self.db.begin().await?;

        let tenant_id = find_or_create_tenant(&mut *tx, req).await?;

        let request_id = sqlx::query(
            r#"
            INSERT INTO maintenance_requests
                (tenant_id, category, description, priority, urgency, status,
                 estimated_cost, notes, created_at, attachment_paths)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(tenant_id)
        .bind(classification.category.as_str())
        .bind(description)
        .bind(classification.priority.as_str())
        .bind(req.urgency.as_str())
        .bind(RequestStatus::Pending.as_str())
        .bind(estimated_cost)
        .bind(notes)
        .bind(Utc::now())
        .bind(attachments)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        tx.commit().await?;
        Ok(request_id)
    }

    pub async fn get(&self, request_id: i64) -> ApiResult<MaintenanceRequest> {
        let row = sqlx::query_as::<_, RequestRow>(&format!(
            "{SELECT_REQUESTS} WHERE r.request_id = ?"
        ))
        .bind(request_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Request {request_id} not found")))?;

        Ok(row.into())
    }

    /// Filtered page of requests, highest priority first, plus the total count.
    pub async fn list(
        &self,
        query: &RequestQuery,
        pagination: &PaginationParams,
    ) -> ApiResult<(Vec<MaintenanceRequest>, u64)> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM maintenance_requests r");
        push_filters(&mut count, query);
        let total: i64 = count.build_query_scalar().fetch_one(&self.db).await?;

        let mut select = QueryBuilder::<Sqlite>::new(SELECT_REQUESTS);
        push_filters(&mut select, query);
        select
            .push(format!(" ORDER BY {PRIORITY_ORDER}, r.created_at DESC, r.request_id DESC"))
            .push(" LIMIT ")
            .push_bind(pagination.limit())
            .push(" OFFSET ")
            .push_bind(pagination.offset());

        let rows = select
            .build_query_as::<RequestRow>()
            .fetch_all(&self.db)
            .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total as u64))
    }

    /// Move a request forward through the workflow.
    pub async fn update_status(
        &self,
        request_id: i64,
        update: UpdateStatusRequest,
    ) -> ApiResult<MaintenanceRequest> {
        let current = self.get(request_id).await?;

        if !current.status.can_transition_to(update.status) {
            return Err(ApiError::Conflict(format!(
                "Cannot move request {request_id} from {} to {}",
                current.status.as_str(),
                update.status.as_str()
            )));
        }
        if let Some(cost) = update.actual_cost {
            if !cost.is_finite() || cost < 0.0 {
                return Err(ApiError::validation("Actual cost must be a non-negative amount"));
            }
        }

        self.write_status(request_id, current.status, &update).await?;

        tracing::info!(
            request_id,
            from = current.status.as_str(),
            to = update.status.as_str(),
            "Request status updated"
        );

        self.get(request_id).await
    }

    /// Apply a status change only if the row still holds `expected`.
    async fn write_status(
        &self,
        request_id: i64,
        expected: RequestStatus,
        update: &UpdateStatusRequest,
    ) -> ApiResult<()> {
        let resolved = update.status == RequestStatus::Resolved;
        let completed_at = resolved.then(Utc::now);
        let actual_cost = if resolved { update.actual_cost } else { None };

        let result = sqlx::query(
            r#"
            UPDATE maintenance_requests
            SET status = ?,
                notes = COALESCE(?, notes),
                completed_at = COALESCE(?, completed_at),
                actual_cost = COALESCE(?, actual_cost)
            WHERE request_id = ? AND status = ?
            "#,
        )
        .bind(update.status.as_str())
        .bind(non_empty(update.notes.as_deref()))
        .bind(completed_at)
        .bind(actual_cost)
        .bind(request_id)
        .bind(expected.as_str())
        .execute(&self.db)
        .await?;

        ensure_unchanged(request_id, result.rows_affected())
    }

    /// Book a visit. A pending request moves to in progress.
    pub async fn schedule(
        &self,
        request_id: i64,
        schedule: ScheduleRequest,
    ) -> ApiResult<MaintenanceRequest> {
        let current = self.get(request_id).await?;
        if current.status.is_terminal() {
            return Err(ApiError::Conflict(format!(
                "Request {request_id} is already {}",
                current.status.as_str()
            )));
        }
        if let Some(vendor_id) = schedule.vendor_id {
            self.ensure_vendor(vendor_id).await?;
        }

        self.write_schedule(request_id, current.status, &schedule).await?;

        tracing::info!(request_id, scheduled_at = %schedule.scheduled_at, "Request scheduled");

        self.get(request_id).await
    }

    /// Set the visit only if the row still holds `expected`.
    async fn write_schedule(
        &self,
        request_id: i64,
        expected: RequestStatus,
        schedule: &ScheduleRequest,
    ) -> ApiResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE maintenance_requests
            SET scheduled_at = ?,
                vendor_id = COALESCE(?, vendor_id),
                status = ?
            WHERE request_id = ? AND status = ?
            "#,
        )
        .bind(schedule.scheduled_at)
        .bind(schedule.vendor_id)
        .bind(RequestStatus::InProgress.as_str())
        .bind(request_id)
        .bind(expected.as_str())
        .execute(&self.db)
        .await?;

        ensure_unchanged(request_id, result.rows_affected())
    }

    pub async fn assign_vendor(
        &self,
        request_id: i64,
        assign: AssignVendorRequest,
    ) -> ApiResult<MaintenanceRequest> {
        let current = self.get(request_id).await?;
        if current.status.is_terminal() {
            return Err(ApiError::Conflict(format!(
                "Request {request_id} is already {}",
                current.status.as_str()
            )));
        }
        self.ensure_vendor(assign.vendor_id).await?;

        let result = sqlx::query(
            "UPDATE maintenance_requests SET vendor_id = ? WHERE request_id = ? AND status = ?",
        )
        .bind(assign.vendor_id)
        .bind(request_id)
        .bind(current.status.as_str())
        .execute(&self.db)
        .await?;
        ensure_unchanged(request_id, result.rows_affected())?;

        tracing::info!(request_id, vendor_id = assign.vendor_id, "Vendor assigned");

        self.get(request_id).await
    }

    /// Scheduled requests within a window, earliest first.
    pub async fn calendar(&self, window: CalendarQuery) -> ApiResult<Vec<MaintenanceRequest>> {
        let from = window.from.unwrap_or_else(Utc::now);
        let to = window.to.unwrap_or(from + Duration::days(CALENDAR_DAYS));
        if to < from {
            return Err(ApiError::BadRequest(
                "Calendar end must not be before its start".to_string(),
            ));
        }

        let rows = sqlx::query_as::<_, RequestRow>(&format!(
            "{SELECT_REQUESTS} WHERE r.scheduled_at IS NOT NULL \
             AND r.scheduled_at >= ? AND r.scheduled_at <= ? \
             ORDER BY r.scheduled_at ASC"
        ))
        .bind(from)
        .bind(to)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// The week containing `week_of`, day by day, and scheduled visits per month.
    pub async fn calendar_summary(&self, query: CalendarSummaryQuery) -> ApiResult<CalendarSummary> {
        let anchor = query.week_of.unwrap_or_else(|| Utc::now().date_naive());
        let week_start =
            anchor - Duration::days(i64::from(anchor.weekday().num_days_from_monday()));
        let from = week_start.and_time(NaiveTime::MIN).and_utc();
        let to = from + Duration::days(7) - Duration::milliseconds(1);

        let visits = self
            .calendar(CalendarQuery {
                from: Some(from),
                to: Some(to),
            })
            .await?;

        let week = (0..7)
            .map(|offset| {
                let date = week_start + Duration::days(offset);
                CalendarDay {
                    date,
                    weekday: date.format("%A").to_string(),
                    visits: visits
                        .iter()
                        .filter(|v| v.scheduled_at.map(|at| at.date_naive()) == Some(date))
                        .cloned()
                        .collect(),
                }
            })
            .collect();

        let monthly = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT strftime('%Y-%m', scheduled_at) AS month, COUNT(*)
            FROM maintenance_requests
            WHERE strftime('%Y-%m', scheduled_at) IS NOT NULL
            GROUP BY month
            ORDER BY month
            "#,
        )
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(|(month, count)| MonthlyCount { month, count })
        .collect();

        Ok(CalendarSummary {
            week_start,
            week,
            monthly,
        })
    }

    async fn ensure_vendor(&self, vendor_id: i64) -> ApiResult<()> {
        let exists: Option<i64> =
            sqlx::query_scalar("SELECT vendor_id FROM vendors WHERE vendor_id = ?")
                .bind(vendor_id)
                .fetch_optional(&self.db)
                .await?;
        exists
            .map(|_| ())
            .ok_or_else(|| ApiError::NotFound(format!("Vendor {vendor_id} not found")))
    }
}

/// Zero rows means another update moved the request first.
fn ensure_unchanged(request_id: i64, rows_affected: u64) -> ApiResult<()> {
    if rows_affected == 0 {
        return Err(ApiError::Conflict(format!(
            "Request {request_id} was changed by another update; reload and retry"
        )));
    }
    Ok(())
}

/// Reuse the tenant with the same email, otherwise create one.
///
/// The insert is a no-op when the email is already taken, so two concurrent
/// submissions from one tenant settle on the same row.
async fn find_or_create_tenant(conn: &mut SqliteConnection, req: &SubmitRequest) -> ApiResult<i64> {
    let email = non_empty(req.email.as_deref()).map(|e| e.to_lowercase());

    let inserted = sqlx::query(
        r#"
        INSERT INTO tenants (name, email, phone, unit_number, created_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(email) DO NOTHING
        "#,
    )
    .bind(req.name.trim())
    .bind(email.as_deref())
    .bind(non_empty(req.phone.as_deref()))
    .bind(req.unit.trim())
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    // NULL emails never conflict, so an email-less tenant is always new
    let Some(email) = email else {
        let tenant_id = inserted.last_insert_rowid();
        tracing::debug!(tenant_id, "Tenant created");
        return Ok(tenant_id);
    };

    let tenant_id: i64 = sqlx::query_scalar("SELECT tenant_id FROM tenants WHERE email = ?")
        .bind(&email)
        .fetch_one(&mut *conn)
        .await?;
    if inserted.rows_affected() > 0 {
        tracing::debug!(tenant_id, "Tenant created");
    }
    Ok(tenant_id)
}
