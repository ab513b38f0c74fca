//! Vendor directory and performance reporting.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::requests::is_valid_email;
use crate::domain::vendors::{CreateVendorRequest, Vendor, VendorPerformance};
use crate::domain::Category;
use crate::error::{ApiError, ApiResult};

/// Database row for vendor
#[derive(Debug, sqlx::FromRow)]
struct VendorRow {
    vendor_id: i64,
    company_name: String,
    contact_person: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    specialization: String,
    hourly_rate: f64,
    rating: f64,
    created_at: DateTime<Utc>,
}

impl From<VendorRow> for Vendor {
    fn from(row: VendorRow) -> Self {
        Self {
            id: row.vendor_id,
            company_name: row.company_name,
            contact_person: row.contact_person,
            email: row.email,
            phone: row.phone,
            specialization: Category::from(row.specialization),
            hourly_rate: row.hourly_rate,
            rating: row.rating,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PerformanceRow {
    vendor_id: i64,
    company_name: String,
    specialization: String,
    rating: f64,
    total_requests: i64,
    resolved_requests: i64,
    avg_cost: f64,
}

impl From<PerformanceRow> for VendorPerformance {
    fn from(row: PerformanceRow) -> Self {
        let success_rate = if row.total_requests > 0 {
            (row.resolved_requests as f64 / row.total_requests as f64 * 1000.0).round() / 10.0
        } else {
            0.0
        };
        Self {
            vendor_id: row.vendor_id,
            company_name: row.company_name,
            specialization: Category::from(row.specialization),
            total_requests: row.total_requests,
            resolved_requests: row.resolved_requests,
            success_rate,
            avg_cost: (row.avg_cost * 100.0).round() / 100.0,
            rating: row.rating,
        }
    }
}

const SELECT_VENDORS: &str = r#"
    SELECT vendor_id, company_name, contact_person, email, phone,
           specialization, hourly_rate, rating, created_at
    FROM vendors
"#;

#[derive(Clone)]
pub struct VendorService {
    db: SqlitePool,
}

impl VendorService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Vendors, best rated first, optionally for one specialization.
    pub async fn list(&self, specialization: Option<Category>) -> ApiResult<Vec<Vendor>> {
        let rows = match specialization {
            Some(category) => {
                sqlx::query_as::<_, VendorRow>(&format!(
                    "{SELECT_VENDORS} WHERE specialization = ? ORDER BY rating DESC, company_name"
                ))
                .bind(category.as_str())
                .fetch_all(&self.db)
                .await?
            }
            None => {
                sqlx::query_as::<_, VendorRow>(&format!(
                    "{SELECT_VENDORS} ORDER BY rating DESC, company_name"
                ))
                .fetch_all(&self.db)
                .await?
            }
        };
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn create(&self, req: CreateVendorRequest) -> ApiResult<Vendor> {
        let company_name = req.company_name.trim();
        if company_name.is_empty() {
            return Err(ApiError::validation("Company name is required"));
        }
        let email = req
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty());
        if let Some(email) = email {
            if !is_valid_email(email) {
                return Err(ApiError::validation(format!("Invalid email address: {email}")));
            }
        }
        if !(1.0..=5.0).contains(&req.rating) {
            return Err(ApiError::validation("Rating must be between 1.0 and 5.0"));
        }
        if !req.hourly_rate.is_finite() || req.hourly_rate < 0.0 {
            return Err(ApiError::validation("Hourly rate must not be negative"));
        }

        let taken: Option<i64> =
            sqlx::query_scalar("SELECT vendor_id FROM vendors WHERE company_name = ?")
                .bind(company_name)
                .fetch_optional(&self.db)
                .await?;
        if taken.is_some() {
            return Err(ApiError::Conflict(format!(
                "Vendor '{company_name}' already exists"
            )));
        }

        let vendor_id = sqlx::query(
            r#"
            INSERT INTO vendors
                (company_name, contact_person, email, phone, specialization,
                 hourly_rate, rating, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(company_name)
        .bind(req.contact_person.as_deref().map(str::trim))
        .bind(email)
        .bind(req.phone.as_deref().map(str::trim))
        .bind(req.specialization.as_str())
        .bind(req.hourly_rate)
        .bind(req.rating)
        .bind(Utc::now())
        .execute(&self.db)
        .await?
        .last_insert_rowid();

        tracing::info!(vendor_id, company_name, "Vendor created");

        let row = sqlx::query_as::<_, VendorRow>(&format!("{SELECT_VENDORS} WHERE vendor_id = ?"))
            .bind(vendor_id)
            .fetch_one(&self.db)
            .await?;
        Ok(row.into())
    }

    /// Job counts, success rate and average cost per vendor.
    pub async fn performance(&self) -> ApiResult<Vec<VendorPerformance>> {
        let rows = sqlx::query_as::<_, PerformanceRow>(
            r#"
            SELECT v.vendor_id, v.company_name, v.specialization, v.rating,
                   COUNT(r.request_id) AS total_requests,
                   COALESCE(SUM(CASE WHEN r.status = 'resolved' THEN 1 ELSE 0 END), 0)
                       AS resolved_requests,
                   COALESCE(AVG(COALESCE(r.actual_cost, r.estimated_cost)), 0.0) AS avg_cost
            FROM vendors v
            LEFT JOIN maintenance_requests r ON r.vendor_id = v.vendor_id
            GROUP BY v.vendor_id, v.company_name, v.specialization, v.rating
            ORDER BY total_requests DESC, v.rating DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::domain::maintenance::{AssignVendorRequest, UpdateStatusRequest};
    use crate::domain::RequestStatus;
    use crate::services::requests::tests::{service, submission};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn new_vendor(name: &str) -> CreateVendorRequest {
        CreateVendorRequest {
            company_name: name.to_string(),
            contact_person: Some("Ivy Installer".into()),
            email: Some("ivy@roofers.example".into()),
            phone: None,
            specialization: Category::Structural,
            hourly_rate: 120.0,
            rating: 4.2,
        }
    }

    #[tokio::test]
    async fn seeded_vendors_are_listed_best_first() {
        let vendors = VendorService::new(test_pool().await);
        let all = vendors.list(None).await.unwrap();
        assert_eq!(all.len(), 8);
        assert_eq!(all[0].company_name, "Elite Plumbing");

        let plumbers = vendors.list(Some(Category::Plumbing)).await.unwrap();
        assert_eq!(plumbers.len(), 2);
        assert!(plumbers.iter().all(|v| v.specialization == Category::Plumbing));
    }

    #[tokio::test]
    async fn create_validates_and_rejects_duplicates() {
        let vendors = VendorService::new(test_pool().await);

        let created = vendors.create(new_vendor("TopRoof")).await.unwrap();
        assert_eq!(created.company_name, "TopRoof");
        assert_eq!(created.specialization, Category::Structural);

        assert!(matches!(
            vendors.create(new_vendor("TopRoof")).await,
            Err(ApiError::Conflict(_))
        ));

        let mut bad_rating = new_vendor("Stars");
        bad_rating.rating = 6.0;
        assert!(matches!(vendors.create(bad_rating).await, Err(ApiError::Validation(_))));

        let mut bad_email = new_vendor("Mailless");
        bad_email.email = Some("nope".into());
        assert!(matches!(vendors.create(bad_email).await, Err(ApiError::Validation(_))));

        let mut negative = new_vendor("Cheap");
        negative.hourly_rate = -1.0;
        assert!(matches!(vendors.create(negative).await, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn performance_counts_resolved_jobs() {
        let db = test_pool().await;
        let requests = service(db.clone());
        let vendors = VendorService::new(db);
        let mut rng = StdRng::seed_from_u64(21);

        for text in ["Faucet drips", "Drain is clogged"] {
            let id = requests.submit(submission(text), &mut rng).await.unwrap().request.id;
            requests
                .assign_vendor(id, AssignVendorRequest { vendor_id: 1 })
                .await
                .unwrap();
            if text == "Faucet drips" {
                requests
                    .update_status(
                        id,
                        UpdateStatusRequest {
                            status: RequestStatus::Resolved,
                            actual_cost: Some(80.0),
                            notes: None,
                        },
                    )
                    .await
                    .unwrap();
            }
        }

        let report = vendors.performance().await.unwrap();
        assert_eq!(report.len(), 8);
        let quickfix = &report[0];
        assert_eq!(quickfix.company_name, "QuickFix Plumbing");
        assert_eq!(quickfix.total_requests, 2);
        assert_eq!(quickfix.resolved_requests, 1);
        assert_eq!(quickfix.success_rate, 50.0);
        assert!(quickfix.avg_cost > 0.0);

        let idle = report.iter().find(|v| v.vendor_id == 2).unwrap();
        assert_eq!(idle.total_requests, 0);
        assert_eq!(idle.success_rate, 0.0);
        assert_eq!(idle.avg_cost, 0.0);
    }
}
