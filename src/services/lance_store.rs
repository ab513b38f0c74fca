//! LanceDB-backed knowledge index.
//!
//! One table, `maintenance_knowledge`, holding the document id, its text,
//! the metadata as JSON and a fixed-size embedding column searched by
//! cosine distance.

use anyhow::{anyhow, bail, Context, Result};
use arrow_array::{Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use lancedb::query::{ExecutableQuery, QueryBase};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::embeddings::{self, Embedder};
use super::knowledge::{duplicate_id, VectorStore};
use crate::domain::knowledge::{DocumentMetadata, KnowledgeDocument, KnowledgeHit};

const TABLE_NAME: &str = "maintenance_knowledge";

pub struct LanceVectorStore {
    db: lancedb::Connection,
    embedder: Arc<dyn Embedder>,
    dimension: usize,
    writer: Mutex<()>,
}

impl LanceVectorStore {
    pub async fn open(dir: &Path, embedder: Arc<dyn Embedder>) -> Result<Self> {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let uri = dir
            .to_str()
            .ok_or_else(|| anyhow!("knowledge directory is not valid UTF-8"))?;

        let db = lancedb::connect(uri)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        let store = Self {
            db,
            dimension: embedder.dimension(),
            embedder,
            writer: Mutex::new(()),
        };
        store.ensure_table().await?;

        tracing::info!(
            dir = %dir.display(),
            documents = store.count().await?,
            embedder = store.embedder.name(),
            "Knowledge base opened"
        );
        Ok(store)
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("text", DataType::Utf8, false),
            Field::new("metadata_json", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.dimension as i32,
                ),
                true,
            ),
        ]))
    }

    async fn ensure_table(&self) -> Result<()> {
        let names = self.db.table_names().execute().await?;
        if !names.iter().any(|n| n == TABLE_NAME) {
            self.db
                .create_empty_table(TABLE_NAME, self.schema())
                .execute()
                .await
                .context("Failed to create knowledge table")?;
            return Ok(());
        }

        // Vectors from a different embedder cannot share the table
        let table = self.table().await?;
        let schema = table.schema().await?;
        let width = schema
            .field_with_name("vector")
            .ok()
            .and_then(|f| match f.data_type() {
                DataType::FixedSizeList(_, n) => Some(*n as usize),
                _ => None,
            });
        match width {
            Some(n) if n == self.dimension => Ok(()),
            Some(n) => bail!(
                "knowledge table holds {n}-dimensional vectors but the {} embedder produces {}",
                self.embedder.name(),
                self.dimension
            ),
            None => bail!("knowledge table has no vector column"),
        }
    }

    async fn table(&self) -> Result<lancedb::Table> {
        self.db
            .open_table(TABLE_NAME)
            .execute()
            .await
            .context("Failed to open knowledge table")
    }

    async fn existing_ids(&self, table: &lancedb::Table, documents: &[KnowledgeDocument]) -> Result<Vec<String>> {
        let id_list: Vec<String> = documents
            .iter()
            .map(|d| format!("'{}'", d.id.replace('\'', "''")))
            .collect();
        let results = table
            .query()
            .only_if(format!("id IN ({})", id_list.join(", ")))
            .select(lancedb::query::Select::columns(&["id"]))
            .execute()
            .await
            .context("LanceDB id lookup failed")?;

        let batches: Vec<RecordBatch> = futures::TryStreamExt::try_collect(results).await?;
        let mut ids = Vec::new();
        for batch in &batches {
            if let Some(col) = batch
                .column_by_name("id")
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
            {
                ids.extend((0..col.len()).map(|i| col.value(i).to_string()));
            }
        }
        Ok(ids)
    }
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    async fn add(&self, documents: Vec<KnowledgeDocument>) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let _writer = self.writer.lock().await;
        let table = self.table().await?;

        let taken = self.existing_ids(&table, &documents).await?;
        if let Some(id) = duplicate_id(&documents, |id| taken.iter().any(|t| t == id)) {
            bail!("document id already exists: {id}");
        }

        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
        let vectors = embeddings::embed_documents(&self.embedder, texts).await?;

        let metadata_jsons = documents
            .iter()
            .map(|d| serde_json::to_string(&d.metadata))
            .collect::<Result<Vec<_>, _>>()?;
        let ids: Vec<&str> = documents.iter().map(|d| d.id.as_str()).collect();
        let texts: Vec<&str> = documents.iter().map(|d| d.text.as_str()).collect();

        let flat_vectors: Vec<f32> = vectors.into_iter().flatten().collect();
        let vector_array = FixedSizeListArray::new(
            Arc::new(Field::new("item", DataType::Float32, true)),
            self.dimension as i32,
            Arc::new(Float32Array::from(flat_vectors)) as Arc<dyn Array>,
            None,
        );

        let schema = self.schema();
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(ids)) as Arc<dyn Array>,
                Arc::new(StringArray::from(texts)),
                Arc::new(StringArray::from(metadata_jsons)),
                Arc::new(vector_array) as Arc<dyn Array>,
            ],
        )
        .context("Failed to build knowledge RecordBatch")?;

        let reader = RecordBatchIterator::new(vec![Ok(batch)], schema);
        table
            .add(Box::new(reader))
            .execute()
            .await
            .context("Failed to insert knowledge documents")?;

        tracing::debug!(documents = documents.len(), "Inserted knowledge documents into LanceDB");
        Ok(())
    }

    async fn query(&self, text: &str, n_results: usize) -> Result<Vec<KnowledgeHit>> {
        let table = self.table().await?;
        if n_results == 0 || table.count_rows(None).await? == 0 {
            return Ok(Vec::new());
        }

        let query = embeddings::embed_query(&self.embedder, text).await?;
        let results = table
            .query()
            .nearest_to(query.as_slice())?
            .distance_type(lancedb::DistanceType::Cosine)
            .limit(n_results)
            .execute()
            .await
            .context("LanceDB vector search failed")?;

        let batches: Vec<RecordBatch> = futures::TryStreamExt::try_collect(results).await?;
        Ok(hits_from_batches(&batches))
    }

    async fn count(&self) -> Result<usize> {
        let table = self.table().await?;
        Ok(table.count_rows(None).await?)
    }
}

/// Rows with undecodable metadata are dropped with a warning.
fn hits_from_batches(batches: &[RecordBatch]) -> Vec<KnowledgeHit> {
    let mut hits = Vec::new();
    for batch in batches {
        let column = |name: &str| {
            batch
                .column_by_name(name)
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        };
        let (Some(ids), Some(texts), Some(metadata)) =
            (column("id"), column("text"), column("metadata_json"))
        else {
            continue;
        };
        let distances = batch
            .column_by_name("_distance")
            .and_then(|c| c.as_any().downcast_ref::<Float32Array>());

        for i in 0..batch.num_rows() {
            let metadata: DocumentMetadata = match serde_json::from_str(metadata.value(i)) {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::warn!(id = ids.value(i), error = %e, "Skipping knowledge row with bad metadata");
                    continue;
                }
            };
            hits.push(KnowledgeHit {
                id: ids.value(i).to_string(),
                text: texts.value(i).to_string(),
                metadata,
                // Cosine distance is 1 - similarity
                score: distances.map(|d| 1.0 - d.value(i)).unwrap_or(0.0),
            });
        }
    }
    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::embeddings::HashingEmbedder;
    use crate::services::knowledge::tests::doc;

    async fn store(dir: &Path) -> LanceVectorStore {
        LanceVectorStore::open(dir, Arc::new(HashingEmbedder)).await.unwrap()
    }

    #[tokio::test]
    async fn documents_are_searchable_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = store(dir.path()).await;
            assert_eq!(store.count().await.unwrap(), 0);
            assert!(store.query("anything", 2).await.unwrap().is_empty());

            store
                .add(vec![
                    doc("plumb", "To fix a leaking faucet shut off the water and replace the washer"),
                    doc("elec", "Reset a tripped circuit breaker by switching it fully off then on"),
                ])
                .await
                .unwrap();
        }

        let reopened = store(dir.path()).await;
        assert_eq!(reopened.count().await.unwrap(), 2);
        let hits = reopened.query("leaking faucet washer", 2).await.unwrap();
        assert_eq!(hits[0].id, "plumb");
        assert_eq!(hits[0].metadata.filename, "plumb.txt");
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path()).await;
        store.add(vec![doc("one", "boiler pressure")]).await.unwrap();

        assert!(store.add(vec![doc("two", "bleed radiators"), doc("one", "again")]).await.is_err());
        assert!(store.add(vec![doc("three", "a"), doc("three", "b")]).await.is_err());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[test]
    fn rows_with_bad_metadata_are_dropped() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("text", DataType::Utf8, false),
            Field::new("metadata_json", DataType::Utf8, false),
            Field::new("_distance", DataType::Float32, true),
        ]));
        let good = serde_json::to_string(&doc("a", "x").metadata).unwrap();
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec!["a", "b"])) as Arc<dyn Array>,
                Arc::new(StringArray::from(vec!["first", "second"])),
                Arc::new(StringArray::from(vec![good.as_str(), "{"])),
                Arc::new(Float32Array::from(vec![0.25f32, 0.1])),
            ],
        )
        .unwrap();

        let hits = hits_from_batches(&[batch]);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");
        assert!((hits[0].score - 0.75).abs() < 1e-6);
    }
}
