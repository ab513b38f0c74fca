//! Solutions repository.
//!
//! Read-only access to the reference repair procedures. The classification
//! pipeline only ever reads from it.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::domain::{Category, SolutionRecord};

#[async_trait]
pub trait SolutionRepository: Send + Sync {
    /// Records for one category, cheapest first.
    async fn by_category(&self, category: Category, limit: usize) -> Result<Vec<SolutionRecord>>;

    /// Unfiltered sample used when a category has no records.
    async fn sample(&self, limit: usize) -> Result<Vec<SolutionRecord>>;

    /// Known costs for a category.
    async fn historical_costs(&self, category: Category) -> Result<Vec<f64>>;
}

/// Database row for a solution
#[derive(Debug, sqlx::FromRow)]
struct SolutionRow {
    solution_id: i64,
    category: String,
    problem_description: String,
    solution_steps: String,
    estimated_cost: Option<f64>,
    estimated_time: Option<String>,
    difficulty_level: Option<String>,
}

impl From<SolutionRow> for SolutionRecord {
    fn from(row: SolutionRow) -> Self {
        // Steps are a JSON array; tolerate hand-entered plain text
        let steps = serde_json::from_str::<Vec<String>>(&row.solution_steps).unwrap_or_else(|_| {
            row.solution_steps
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect()
        });

        Self {
            id: row.solution_id,
            category: Category::from(row.category),
            problem_description: row.problem_description,
            steps,
            estimated_cost: row.estimated_cost,
            estimated_time: row.estimated_time,
            difficulty: row.difficulty_level,
        }
    }
}

const SELECT_SOLUTIONS: &str = r#"
    SELECT solution_id, category, problem_description, solution_steps,
           estimated_cost, estimated_time, difficulty_level
    FROM solutions
"#;

#[derive(Clone)]
pub struct SqliteSolutionRepository {
    db: SqlitePool,
}

impl SqliteSolutionRepository {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Every record, optionally limited to one category.
    pub async fn list(&self, category: Option<Category>) -> Result<Vec<SolutionRecord>> {
        let rows = match category {
            Some(category) => {
                sqlx::query_as::<_, SolutionRow>(&format!(
                    "{SELECT_SOLUTIONS} WHERE category = ? ORDER BY estimated_cost ASC"
                ))
                .bind(category.as_str())
                .fetch_all(&self.db)
                .await?
            }
            None => {
                sqlx::query_as::<_, SolutionRow>(&format!(
                    "{SELECT_SOLUTIONS} ORDER BY category, estimated_cost ASC"
                ))
                .fetch_all(&self.db)
                .await?
            }
        };
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl SolutionRepository for SqliteSolutionRepository {
    async fn by_category(&self, category: Category, limit: usize) -> Result<Vec<SolutionRecord>> {
        let rows = sqlx::query_as::<_, SolutionRow>(&format!(
            "{SELECT_SOLUTIONS} WHERE category = ? ORDER BY estimated_cost ASC LIMIT ?"
        ))
        .bind(category.as_str())
        .bind(limit as i64)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn sample(&self, limit: usize) -> Result<Vec<SolutionRecord>> {
        let rows = sqlx::query_as::<_, SolutionRow>(&format!(
            "{SELECT_SOLUTIONS} ORDER BY RANDOM() LIMIT ?"
        ))
        .bind(limit as i64)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn historical_costs(&self, category: Category) -> Result<Vec<f64>> {
        let costs = sqlx::query_scalar::<_, f64>(
            "SELECT estimated_cost FROM solutions WHERE category = ? AND estimated_cost IS NOT NULL",
        )
        .bind(category.as_str())
        .fetch_all(&self.db)
        .await?;
        Ok(costs)
    }
}
