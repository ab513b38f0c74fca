//! AI interaction audit trail.
//!
//! Logging is telemetry: a failed insert is reported through tracing and
//! never propagated to the flow that produced the answer.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::domain::interactions::{InteractionLog, InteractionSource};

const DEFAULT_RECENT: u32 = 50;
const MAX_RECENT: u32 = 500;

#[derive(Debug, sqlx::FromRow)]
struct InteractionRow {
    interaction_id: i64,
    tenant_id: Option<i64>,
    question: String,
    response: String,
    source: String,
    created_at: DateTime<Utc>,
}

impl From<InteractionRow> for InteractionLog {
    fn from(row: InteractionRow) -> Self {
        Self {
            id: row.interaction_id,
            tenant_id: row.tenant_id,
            question: row.question,
            response: row.response,
            source: InteractionSource::from(row.source),
            created_at: row.created_at,
        }
    }
}

#[derive(Clone)]
pub struct InteractionLogger {
    db: SqlitePool,
}

impl InteractionLogger {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Record one exchange. Never fails.
    ///
    /// An unknown tenant is stored as NULL so the exchange itself is kept.
    pub async fn log(
        &self,
        tenant_id: Option<i64>,
        question: &str,
        response: &str,
        source: InteractionSource,
    ) {
        let result = sqlx::query(
            r#"
            INSERT INTO interactions (tenant_id, question, response, source, created_at)
            VALUES ((SELECT tenant_id FROM tenants WHERE tenant_id = ?), ?, ?, ?, ?)
            "#,
        )
        .bind(tenant_id)
        .bind(question)
        .bind(response)
        .bind(source.as_str())
        .bind(Utc::now())
        .execute(&self.db)
        .await;

        if let Err(e) = result {
            tracing::warn!(error = %e, source = source.as_str(), "Failed to record interaction");
        }
    }

    /// Most recent entries first.
    pub async fn recent(&self, limit: Option<u32>) -> Result<Vec<InteractionLog>> {
        let limit = limit.unwrap_or(DEFAULT_RECENT).clamp(1, MAX_RECENT);
        let rows = sqlx::query_as::<_, InteractionRow>(
            r#"
            SELECT interaction_id, tenant_id, question, response, source, created_at
            FROM interactions
            ORDER BY interaction_id DESC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn logged_entries_are_read_back_newest_first() {
        let logger = InteractionLogger::new(test_pool().await);
        logger
            .log(None, "How do I reset a breaker?", "Flip it off then on.", InteractionSource::Faq)
            .await;
        logger
            .log(None, "Boiler noise?", "Bleed the radiators.", InteractionSource::RemoteModel)
            .await;

        let entries = logger.recent(None).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].question, "Boiler noise?");
        assert_eq!(entries[0].source, InteractionSource::RemoteModel);
        assert_eq!(entries[1].source, InteractionSource::Faq);

        assert_eq!(logger.recent(Some(1)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_tenant_is_logged_without_one() {
        let logger = InteractionLogger::new(test_pool().await);
        logger
            .log(Some(9_999), "q", "r", InteractionSource::Fallback)
            .await;

        let entries = logger.recent(None).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].tenant_id, None);
        assert_eq!(entries[0].question, "q");
    }

    #[tokio::test]
    async fn known_tenant_is_kept() {
        let db = test_pool().await;
        let tenant_id = sqlx::query(
            "INSERT INTO tenants (name, unit_number, created_at) VALUES ('Sam', '2A', ?)",
        )
        .bind(Utc::now())
        .execute(&db)
        .await
        .unwrap()
        .last_insert_rowid();

        let logger = InteractionLogger::new(db);
        logger
            .log(Some(tenant_id), "q", "r", InteractionSource::Faq)
            .await;
        assert_eq!(logger.recent(None).await.unwrap()[0].tenant_id, Some(tenant_id));
    }

    #[tokio::test]
    async fn failed_insert_is_swallowed() {
        let db = test_pool().await;
        sqlx::query("DROP TABLE interactions").execute(&db).await.unwrap();

        let logger = InteractionLogger::new(db);
        logger.log(None, "q", "r", InteractionSource::Fallback).await;
        assert!(logger.recent(None).await.is_err());
    }
}
