//! Knowledge base routes
//!
//! Upload is multipart: any number of file parts plus an optional
//! `category` text field applied to every file in the batch.

use axum::{
    extract::{Multipart, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::api::DataResponse;
use crate::app::AppState;
use crate::domain::knowledge::{
    IngestOutcome, IngestResponse, IngestStatus, KnowledgeSearchRequest, KnowledgeStats,
    UploadedFile,
};
use crate::domain::Category;
use crate::error::{ApiError, ApiResult};

const MAX_SEARCH_RESULTS: usize = 20;

/// POST /knowledge/documents
pub async fn upload_documents(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    // Unreadable parts become failed outcomes in their upload position
    let mut entries: Vec<Result<UploadedFile, IngestOutcome>> = Vec::new();
    let mut category = Category::Other;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) if entries.is_empty() => {
                return Err(ApiError::BadRequest(format!("Invalid multipart body: {e}")));
            }
            Err(e) => {
                tracing::warn!(error = %e, "Multipart body ended early - keeping parts read so far");
                break;
            }
        };

        match field.file_name().map(str::to_string) {
            Some(filename) => match field.bytes().await {
                Ok(content) => entries.push(Ok(UploadedFile {
                    filename,
                    content: content.to_vec(),
                })),
                Err(e) => {
                    tracing::warn!(filename = %filename, error = %e, "Failed to read uploaded file");
                    entries.push(Err(IngestOutcome {
                        filename,
                        status: IngestStatus::Failed {
                            reason: format!("upload could not be read: {e}"),
                        },
                    }));
                }
            },
            None if field.name() == Some("category") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Invalid category field: {e}")))?;
                category = Category::parse(&value)
                    .ok_or_else(|| ApiError::validation(format!("Unknown category: {value}")))?;
            }
            None => {}
        }
    }

    if entries.is_empty() {
        return Err(ApiError::validation("At least one file is required"));
    }

    tracing::info!(files = entries.len(), category = %category, "Uploading knowledge documents");

    let mut files = Vec::new();
    let mut slots = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry {
            Ok(file) => {
                files.push(file);
                slots.push(None);
            }
            Err(outcome) => slots.push(Some(outcome)),
        }
    }

    let mut ingested = state.ingestor.ingest(files, category).await.into_iter();
    let outcomes: Vec<IngestOutcome> = slots
        .into_iter()
        .filter_map(|slot| slot.or_else(|| ingested.next()))
        .collect();

    let indexed = outcomes.iter().filter(|o| o.is_indexed()).count();
    let document_count = state.knowledge.count().await?;

    Ok(Json(DataResponse::new(IngestResponse {
        outcomes,
        indexed,
        document_count,
    })))
}

/// GET /knowledge/stats
pub async fn knowledge_stats(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let document_count = state.knowledge.count().await?;
    Ok(Json(DataResponse::new(KnowledgeStats { document_count })))
}

/// POST /knowledge/search
pub async fn search_knowledge(
    State(state): State<Arc<AppState>>,
    Json(req): Json<KnowledgeSearchRequest>,
) -> ApiResult<impl IntoResponse> {
    let query = req.query.trim();
    if query.is_empty() {
        return Err(ApiError::validation("Query is required"));
    }

    let hits = state
        .knowledge
        .query(query, req.limit.clamp(1, MAX_SEARCH_RESULTS))
        .await?;
    Ok(Json(DataResponse::new(hits)))
}
