//! Knowledge document ingestion.
//!
//! Turns uploaded files into text and indexes them one by one. A bad file
//! produces a `Failed` outcome for that file only; the rest of the batch
//! still goes through.

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use lopdf::Document;
use std::path::Path;
use std::sync::Arc;

use super::knowledge::VectorStore;
use crate::domain::knowledge::{
    DocumentMetadata, IngestOutcome, IngestStatus, KnowledgeDocument, UploadedFile,
};
use crate::domain::Category;

/// Extract plain text from an uploaded file based on its extension.
pub fn extract_text(content: &[u8], filename: &str) -> Result<String> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "txt" | "md" => Ok(String::from_utf8_lossy(content).into_owned()),
        "pdf" => extract_pdf_text(content),
        "" => bail!("file has no extension"),
        other => bail!("unsupported file type: .{other}"),
    }
}

fn extract_pdf_text(content: &[u8]) -> Result<String> {
    let doc = Document::load_mem(content).context("failed to load PDF")?;

    let mut pages = Vec::new();
    for page_number in doc.get_pages().keys() {
        match doc.extract_text(&[*page_number]) {
            Ok(text) => pages.push(text),
            Err(e) => {
                tracing::debug!(page = page_number, error = %e, "Skipping unreadable PDF page");
            }
        }
    }

    Ok(pages.join("\n"))
}

/// Final path component only; uploads may carry client-side directories.
fn base_name(filename: &str) -> String {
    Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename)
        .to_string()
}

#[derive(Clone)]
pub struct KnowledgeIngestor {
    store: Arc<dyn VectorStore>,
}

impl KnowledgeIngestor {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Index every file, reporting one outcome per file in input order.
    pub async fn ingest(&self, files: Vec<UploadedFile>, category: Category) -> Vec<IngestOutcome> {
        let mut outcomes = Vec::with_capacity(files.len());

        for (position, file) in files.into_iter().enumerate() {
            let filename = base_name(&file.filename);
            let status = match self.ingest_one(position, &filename, &file.content, category).await {
                Ok(status) => status,
                Err(e) => {
                    tracing::warn!(filename = %filename, error = %e, "Knowledge document failed");
                    IngestStatus::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            outcomes.push(IngestOutcome { filename, status });
        }

        let indexed = outcomes.iter().filter(|o| o.is_indexed()).count();
        tracing::info!(files = outcomes.len(), indexed, "Knowledge ingestion finished");

        outcomes
    }

    async fn ingest_one(
        &self,
        position: usize,
        filename: &str,
        content: &[u8],
        category: Category,
    ) -> Result<IngestStatus> {
        let text = extract_text(content, filename)?;
        let text = text.trim();
        if text.is_empty() {
            return Ok(IngestStatus::Skipped {
                reason: "no extractable text".to_string(),
            });
        }

        let uploaded_at = Utc::now();
        // Position keeps same-named files in one batch apart
        let id = format!("doc_{}_{}_{}", uploaded_at.timestamp_micros(), position, filename);
        let title = text
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(|l| l.trim_start_matches('#').trim().to_string());

        let document = KnowledgeDocument {
            id: id.clone(),
            text: text.to_string(),
            metadata: DocumentMetadata {
                filename: filename.to_string(),
                category,
                source: "upload".to_string(),
                uploaded_at,
                title,
            },
        };

        self.store
            .add(vec![document])
            .await
            .map_err(|e| anyhow!("indexing failed: {e}"))?;

        Ok(IngestStatus::Indexed { document_id: id })
    }
}
