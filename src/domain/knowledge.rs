//! Knowledge base domain types
//!
//! Free-text repair documents indexed for similarity search.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::maintenance::Category;

/// Metadata stored alongside every indexed document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentMetadata {
    pub filename: String,
    pub category: Category,
    pub source: String,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// A document as held by the vector store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeDocument {
    pub id: String,
    pub text: String,
    pub metadata: DocumentMetadata,
}

/// A nearest-neighbour match, best first
#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeHit {
    pub id: String,
    pub text: String,
    pub metadata: DocumentMetadata,
    pub score: f32,
}

/// A file received for ingestion
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content: Vec<u8>,
}

/// Per-file result of an ingestion batch
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestStatus {
    Indexed { document_id: String },
    Skipped { reason: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub filename: String,
    #[serde(flatten)]
    pub status: IngestStatus,
}

impl IngestOutcome {
    pub fn is_indexed(&self) -> bool {
        matches!(self.status, IngestStatus::Indexed { .. })
    }
}

/// Response DTO for an upload batch
#[derive(Debug, Clone, Serialize)]
pub struct IngestResponse {
    pub outcomes: Vec<IngestOutcome>,
    pub indexed: usize,
    pub document_count: usize,
}

/// Request DTO for searching the knowledge base
#[derive(Debug, Clone, Deserialize)]
pub struct KnowledgeSearchRequest {
    pub query: String,
    #[serde(default = "default_search_limit")]
    pub limit: usize,
}

fn default_search_limit() -> usize {
    3
}

/// Response DTO for knowledge base size
#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeStats {
    pub document_count: usize,
}
