//! Knowledge base vector store.
//!
//! `LanceVectorStore` (see `lance_store`) is the primary index. The
//! in-process `LocalVectorStore` here takes over when LanceDB cannot be
//! opened, and backs the unit tests. Both serialise writes through a
//! single writer and reject duplicate ids instead of overwriting.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::embeddings::{self, cosine_similarity, Embedder, HashingEmbedder};
use super::lance_store::LanceVectorStore;
use crate::domain::knowledge::{KnowledgeDocument, KnowledgeHit};

/// File name of the fallback store inside the knowledge directory.
const FALLBACK_FILE: &str = "fallback.jsonl";

/// Similarity index over knowledge documents.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn add(&self, documents: Vec<KnowledgeDocument>) -> Result<()>;

    /// Up to `n_results` documents, most similar first.
    async fn query(&self, text: &str, n_results: usize) -> Result<Vec<KnowledgeHit>>;

    async fn count(&self) -> Result<usize>;
}

/// Ids that are already taken, or repeated within `documents`.
pub(crate) fn duplicate_id<'a>(
    documents: &'a [KnowledgeDocument],
    is_taken: impl Fn(&str) -> bool,
) -> Option<&'a str> {
    let mut batch_ids = HashSet::new();
    documents
        .iter()
        .map(|d| d.id.as_str())
        .find(|id| is_taken(id) || !batch_ids.insert(*id))
}

/// LanceDB under `dir`, or the JSON-lines fallback in the same directory.
pub async fn open_knowledge_store(dir: &Path, embedder: Arc<dyn Embedder>) -> Result<Arc<dyn VectorStore>> {
    match LanceVectorStore::open(dir, Arc::clone(&embedder)).await {
        Ok(store) => Ok(Arc::new(store)),
        Err(e) => {
            tracing::error!(
                dir = %dir.display(),
                error = ?e,
                "LanceDB unavailable - using in-process knowledge store"
            );
            let store = LocalVectorStore::open(dir.join(FALLBACK_FILE), embedder).await?;
            Ok(Arc::new(store))
        }
    }
}

struct IndexedDocument {
    document: KnowledgeDocument,
    embedding: Vec<f32>,
}

#[derive(Default)]
struct Index {
    entries: Vec<IndexedDocument>,
    ids: HashSet<String>,
}

/// In-process vector store with optional JSON-lines persistence.
pub struct LocalVectorStore {
    embedder: Arc<dyn Embedder>,
    path: Option<PathBuf>,
    index: RwLock<Index>,
    writer: Mutex<()>,
}

impl LocalVectorStore {
    /// Volatile store with the hashing embedder.
    pub fn in_memory() -> Self {
        Self::with_embedder(Arc::new(HashingEmbedder))
    }

    pub fn with_embedder(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            path: None,
            index: RwLock::new(Index::default()),
            writer: Mutex::new(()),
        }
    }

    /// Open (or create) a store persisted at `path`.
    pub async fn open(path: impl AsRef<Path>, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let load_path = path.clone();
        let documents = tokio::task::spawn_blocking(move || read_records(&load_path))
            .await
            .context("knowledge load task panicked")??;

        let texts = documents.iter().map(|d| d.text.clone()).collect();
        let vectors = embeddings::embed_documents(&embedder, texts).await?;

        let mut index = Index::default();
        for (document, embedding) in documents.into_iter().zip(vectors) {
            if index.ids.insert(document.id.clone()) {
                index.entries.push(IndexedDocument { document, embedding });
            }
        }

        tracing::info!(
            path = %path.display(),
            documents = index.entries.len(),
            embedder = embedder.name(),
            "Knowledge base loaded"
        );

        Ok(Self {
            embedder,
            path: Some(path),
            index: RwLock::new(index),
            writer: Mutex::new(()),
        })
    }
}

/// Every readable record; undecodable lines are logged and skipped.
fn read_records(path: &Path) -> Result<Vec<KnowledgeDocument>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut documents = Vec::new();
    for (line_no, line) in BufReader::new(file).split(b'\n').enumerate() {
        let bytes = line.with_context(|| format!("Failed to read {}", path.display()))?;
        let record = match String::from_utf8(bytes) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(line = line_no + 1, error = %e, "Skipping corrupt knowledge record");
                continue;
            }
        };
        if record.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<KnowledgeDocument>(&record) {
            Ok(document) => documents.push(document),
            Err(e) => {
                tracing::warn!(line = line_no + 1, error = %e, "Skipping corrupt knowledge record");
            }
        }
    }
    Ok(documents)
}

fn append_records(path: &Path, documents: &[KnowledgeDocument]) -> Result<()> {
    let mut buf = String::new();
    for document in documents {
        buf.push_str(&serde_json::to_string(document)?);
        buf.push('\n');
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    file.write_all(buf.as_bytes())?;
    file.flush()?;
    Ok(())
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    async fn add(&self, documents: Vec<KnowledgeDocument>) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }

        // Single writer; readers only wait for the final publish
        let _writer = self.writer.lock().await;

        {
            let index = self.index.read();
            if let Some(id) = duplicate_id(&documents, |id| index.ids.contains(id)) {
                bail!("document id already exists: {id}");
            }
        }

        let texts = documents.iter().map(|d| d.text.clone()).collect();
        let vectors = embeddings::embed_documents(&self.embedder, texts).await?;

        if let Some(path) = self.path.clone() {
            let records = documents.clone();
            tokio::task::spawn_blocking(move || append_records(&path, &records))
                .await
                .context("knowledge write task panicked")??;
        }

        let mut index = self.index.write();
        for (document, embedding) in documents.into_iter().zip(vectors) {
            index.ids.insert(document.id.clone());
            index.entries.push(IndexedDocument { document, embedding });
        }

        Ok(())
    }

    async fn query(&self, text: &str, n_results: usize) -> Result<Vec<KnowledgeHit>> {
        let query = embeddings::embed_query(&self.embedder, text).await?;
        let index = self.index.read();

        let mut scored: Vec<(f32, &IndexedDocument)> = index
            .entries
            .iter()
            .map(|entry| (cosine_similarity(&query, &entry.embedding), entry))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(n_results)
            .map(|(score, entry)| KnowledgeHit {
                id: entry.document.id.clone(),
                text: entry.document.text.clone(),
                metadata: entry.document.metadata.clone(),
                score,
            })
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.index.read().entries.len())
    }
}
