//! Staff reporting: tenant directory and dashboard aggregates.

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use sqlx::SqlitePool;

use crate::api::PaginationParams;
use crate::domain::dashboard::{CategoryBreakdown, DashboardStats, MonthlyCount, StatusCount};
use crate::domain::tenants::Tenant;
use crate::domain::{Category, RequestStatus};
use crate::error::ApiResult;

/// Database row for tenant
#[derive(Debug, sqlx::FromRow)]
struct TenantRow {
    tenant_id: i64,
    name: String,
    email: Option<String>,
    phone: Option<String>,
    unit_number: String,
    created_at: DateTime<Utc>,
}

impl From<TenantRow> for Tenant {
    fn from(row: TenantRow) -> Self {
        Self {
            id: row.tenant_id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            unit_number: row.unit_number,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TotalsRow {
    total_requests: i64,
    pending_requests: i64,
    avg_estimated_cost: Option<f64>,
}

/// Trend window in months, counting the current one.
const TREND_MONTHS: u32 = 12;

/// First month (`YYYY-MM`) of the trend window ending at `today`.
fn trend_start(today: NaiveDate) -> String {
    let first = today.with_day(1).unwrap_or(today);
    first
        .checked_sub_months(Months::new(TREND_MONTHS - 1))
        .unwrap_or(first)
        .format("%Y-%m")
        .to_string()
}

#[derive(Clone)]
pub struct DashboardService {
    db: SqlitePool,
}

impl DashboardService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Page of tenants, newest first, plus the total count.
    pub async fn tenants(&self, pagination: &PaginationParams) -> ApiResult<(Vec<Tenant>, u64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tenants")
            .fetch_one(&self.db)
            .await?;

        let rows = sqlx::query_as::<_, TenantRow>(
            r#"
            SELECT tenant_id, name, email, phone, unit_number, created_at
            FROM tenants
            ORDER BY tenant_id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total as u64))
    }

    pub async fn stats(&self) -> ApiResult<DashboardStats> {
        let totals = sqlx::query_as::<_, TotalsRow>(
            r#"
            SELECT COUNT(*) AS total_requests,
                   COALESCE(SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END), 0)
                       AS pending_requests,
                   AVG(estimated_cost) AS avg_estimated_cost
            FROM maintenance_requests
            "#,
        )
        .fetch_one(&self.db)
        .await?;

        let total_tenants: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tenants")
            .fetch_one(&self.db)
            .await?;

        let by_status = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM maintenance_requests GROUP BY status ORDER BY COUNT(*) DESC",
        )
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(|(status, count)| StatusCount {
            status: RequestStatus::from(status),
            count,
        })
        .collect();

        let by_category = sqlx::query_as::<_, (String, i64, Option<f64>)>(
            r#"
            SELECT category, COUNT(*), AVG(estimated_cost)
            FROM maintenance_requests
            GROUP BY category
            ORDER BY COUNT(*) DESC, category
            "#,
        )
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(|(category, count, avg_cost)| CategoryBreakdown {
            category: Category::from(category),
            count,
            avg_cost: avg_cost.map(|c| (c * 100.0).round() / 100.0),
        })
        .collect();

        let monthly_trends = self.monthly_trends(Utc::now().date_naive()).await?;

        Ok(DashboardStats {
            total_requests: totals.total_requests,
            pending_requests: totals.pending_requests,
            avg_estimated_cost: totals
                .avg_estimated_cost
                .map(|c| (c * 100.0).round() / 100.0),
            total_tenants,
            by_status,
            by_category,
            monthly_trends,
        })
    }

    async fn monthly_trends(&self, today: NaiveDate) -> ApiResult<Vec<MonthlyCount>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT strftime('%Y-%m', created_at) AS month, COUNT(*)
            FROM maintenance_requests
            WHERE strftime('%Y-%m', created_at) >= ?
            GROUP BY month
            ORDER BY month
            "#,
        )
        .bind(trend_start(today))
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(month, count)| MonthlyCount { month, count })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::domain::maintenance::UpdateStatusRequest;
    use crate::services::requests::tests::{service, submission};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[tokio::test]
    async fn empty_database_has_zeroed_stats() {
        let dashboard = DashboardService::new(test_pool().await);
        let stats = dashboard.stats().await.unwrap();
        assert_eq!(stats.total_requests, 0);
        assert_eq!(stats.pending_requests, 0);
        assert!(stats.avg_estimated_cost.is_none());
        assert!(stats.by_status.is_empty());
        assert!(stats.by_category.is_empty());
        assert!(stats.monthly_trends.is_empty());
    }

    #[test]
    fn trend_window_spans_twelve_months() {
        let date = |s: &str| s.parse::<NaiveDate>().unwrap();
        assert_eq!(trend_start(date("2026-10-17")), "2025-11");
        assert_eq!(trend_start(date("2026-01-31")), "2025-02");
        assert_eq!(trend_start(date("2024-12-01")), "2024-01");
    }

    #[tokio::test]
    async fn monthly_trends_group_recent_requests_by_month() {
        let db = test_pool().await;
        let requests = service(db.clone());
        let dashboard = DashboardService::new(db.clone());
        let mut rng = StdRng::seed_from_u64(32);

        let created = [
            "2026-10-02T08:00:00Z",
            "2026-10-15T18:30:00Z",
            "2026-07-09T12:00:00Z",
            // Outside the window
            "2025-10-31T23:00:00Z",
        ];
        for (i, at) in created.iter().enumerate() {
            let id = requests
                .submit(submission(&format!("Cabinet hinge loose {i}")), &mut rng)
                .await
                .unwrap()
                .request
                .id;
            sqlx::query("UPDATE maintenance_requests SET created_at = ? WHERE request_id = ?")
                .bind(at.parse::<DateTime<Utc>>().unwrap())
                .bind(id)
                .execute(&db)
                .await
                .unwrap();
        }

        let trends = dashboard
            .monthly_trends("2026-10-17".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(
            trends,
            vec![
                MonthlyCount { month: "2026-07".into(), count: 1 },
                MonthlyCount { month: "2026-10".into(), count: 2 },
            ]
        );
    }

    #[tokio::test]
    async fn stats_reflect_submitted_requests() {
        let db = test_pool().await;
        let requests = service(db.clone());
        let dashboard = DashboardService::new(db);
        let mut rng = StdRng::seed_from_u64(31);

        let mut ids = Vec::new();
        for text in ["Toilet clogged", "Sink leaks", "Breaker keeps tripping"] {
            ids.push(requests.submit(submission(text), &mut rng).await.unwrap().request.id);
        }
        requests
            .update_status(
                ids[0],
                UpdateStatusRequest {
                    status: RequestStatus::InProgress,
                    actual_cost: None,
                    notes: Some("Plumber on the way".into()),
                },
            )
            .await
            .unwrap();

        let stats = dashboard.stats().await.unwrap();
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.pending_requests, 2);
        assert_eq!(stats.total_tenants, 3);
        assert!(stats.avg_estimated_cost.unwrap() >= 25.0);
        assert_eq!(stats.by_category[0].category, Category::Plumbing);
        assert_eq!(stats.by_category[0].count, 2);
        assert_eq!(stats.by_status[0].status, RequestStatus::Pending);

        let (tenants, total) = dashboard
            .tenants(&PaginationParams {
                page: Some(1),
                per_page: Some(2),
            })
            .await
            .unwrap();
        assert_eq!(total, 3);
        assert_eq!(tenants.len(), 2);
        assert_eq!(tenants[0].unit_number, "4B");
    }
}
