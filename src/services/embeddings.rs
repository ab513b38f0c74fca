//! Sentence embeddings for the knowledge base.
//!
//! The production embedder runs a MiniLM sentence-transformer exported to
//! ONNX (`model.onnx` + `tokenizer.json` in `EMBEDDING_MODEL_DIR`) through
//! onnxruntime, mean-pools the token states and L2-normalises the result.
//! Without a model directory the store falls back to feature hashing, which
//! only matches shared words.

use anyhow::{anyhow, Context, Result};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tokenizers::{PaddingParams, Tokenizer, TruncationParams};

/// Output width of all-MiniLM-L6-v2, also used by the hashing fallback.
pub const EMBEDDING_DIM: usize = 384;

/// Longest token sequence fed to the model.
const MAX_TOKENS: usize = 256;

const MAX_BATCH_SIZE: usize = 16;

pub trait Embedder: Send + Sync {
    /// Short identifier logged at startup.
    fn name(&self) -> &str;

    fn dimension(&self) -> usize;

    fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_documents(&[text])?
            .pop()
            .ok_or_else(|| anyhow!("embedder returned no vector"))
    }
}

/// Embed off the async worker; model inference is CPU bound.
pub async fn embed_query(embedder: &Arc<dyn Embedder>, text: &str) -> Result<Vec<f32>> {
    let embedder = Arc::clone(embedder);
    let text = text.to_string();
    tokio::task::spawn_blocking(move || embedder.embed_query(&text))
        .await
        .context("embedding task panicked")?
}

pub async fn embed_documents(embedder: &Arc<dyn Embedder>, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
    let embedder = Arc::clone(embedder);
    tokio::task::spawn_blocking(move || {
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        embedder.embed_documents(&refs)
    })
    .await
    .context("embedding task panicked")?
}

/// The model from `model_dir` when configured and loadable, otherwise hashing.
pub fn load_embedder(model_dir: Option<&Path>) -> Arc<dyn Embedder> {
    let Some(dir) = model_dir else {
        tracing::warn!("EMBEDDING_MODEL_DIR not set - knowledge search uses keyword hashing");
        return Arc::new(HashingEmbedder);
    };

    match MiniLmEmbedder::load(dir) {
        Ok(embedder) => {
            tracing::info!(model_dir = %dir.display(), "Sentence embedding model loaded");
            Arc::new(embedder)
        }
        Err(e) => {
            tracing::warn!(
                model_dir = %dir.display(),
                error = ?e,
                "Failed to load embedding model - knowledge search uses keyword hashing"
            );
            Arc::new(HashingEmbedder)
        }
    }
}

/// all-MiniLM-L6-v2 (or any BERT-style sentence model) on onnxruntime.
pub struct MiniLmEmbedder {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    token_type_input: bool,
    dimension: usize,
}

impl MiniLmEmbedder {
    pub fn load(model_dir: &Path) -> Result<Self> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to read {}: {e}", tokenizer_path.display()))?;
        tokenizer.with_padding(Some(PaddingParams::default()));
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_TOKENS,
                ..Default::default()
            }))
            .map_err(|e| anyhow!("Invalid truncation settings: {e}"))?;

        let num_threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);

        let session = Session::builder()
            .map_err(|e| anyhow!("Session builder: {e:?}"))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| anyhow!("Optimization level: {e:?}"))?
            .with_intra_threads(num_threads)
            .map_err(|e| anyhow!("Intra threads: {e:?}"))?
            .commit_from_file(&model_path)
            .map_err(|e| anyhow!("Failed to load {}: {e:?}", model_path.display()))?;

        let token_type_input = session.inputs.iter().any(|i| i.name == "token_type_ids");

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            token_type_input,
            dimension: EMBEDDING_DIM,
        })
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow!("Tokenization failed: {e}"))?;

        let batch_size = encodings.len();
        let seq_len = encodings.first().map(|e| e.get_ids().len()).unwrap_or(0);
        if seq_len == 0 {
            return Ok(vec![vec![0.0; self.dimension]; batch_size]);
        }

        let mut ids = Vec::with_capacity(batch_size * seq_len);
        let mut mask = Vec::with_capacity(batch_size * seq_len);
        let mut type_ids = Vec::with_capacity(batch_size * seq_len);
        for encoding in &encodings {
            ids.extend(encoding.get_ids().iter().map(|&v| i64::from(v)));
            mask.extend(encoding.get_attention_mask().iter().map(|&v| i64::from(v)));
            type_ids.extend(encoding.get_type_ids().iter().map(|&v| i64::from(v)));
        }

        let shape = vec![batch_size, seq_len];
        let input_ids = Value::from_array((shape.clone(), ids))
            .map_err(|e| anyhow!("input_ids tensor: {e:?}"))?;
        let attention_mask = Value::from_array((shape.clone(), mask.clone()))
            .map_err(|e| anyhow!("attention_mask tensor: {e:?}"))?;

        let mut session = self.session.lock();
        let outputs = if self.token_type_input {
            let token_type_ids = Value::from_array((shape, type_ids))
                .map_err(|e| anyhow!("token_type_ids tensor: {e:?}"))?;
            session.run(ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => attention_mask,
                "token_type_ids" => token_type_ids,
            ])
        } else {
            session.run(ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => attention_mask,
            ])
        }
        .map_err(|e| anyhow!("Inference failed: {e:?}"))?;

        let (out_shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| anyhow!("Failed to read model output: {e:?}"))?;
        if out_shape.len() != 3 {
            return Err(anyhow!("Expected token states, got shape {:?}", out_shape));
        }
        let hidden = out_shape[2] as usize;

        Ok((0..batch_size)
            .map(|sample| {
                let states = &data[sample * seq_len * hidden..(sample + 1) * seq_len * hidden];
                let sample_mask = &mask[sample * seq_len..(sample + 1) * seq_len];
                mean_pool(states, sample_mask, hidden)
            })
            .collect())
    }
}

impl Embedder for MiniLmEmbedder {
    fn name(&self) -> &str {
        "minilm"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_BATCH_SIZE) {
            vectors.extend(self.embed_batch(batch)?);
        }
        Ok(vectors)
    }
}

/// Attention-masked mean over token states, L2-normalised.
fn mean_pool(states: &[f32], mask: &[i64], hidden: usize) -> Vec<f32> {
    let mut pooled = vec![0.0f32; hidden];
    let mut count = 0.0f32;
    for (pos, &m) in mask.iter().enumerate() {
        if m == 0 {
            continue;
        }
        count += 1.0;
        let row = &states[pos * hidden..(pos + 1) * hidden];
        pooled.iter_mut().zip(row).for_each(|(p, v)| *p += v);
    }
    if count > 0.0 {
        pooled.iter_mut().for_each(|p| *p /= count);
    }
    normalize(pooled)
}

fn normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 1e-12 {
        vector.iter_mut().for_each(|v| *v /= norm);
    }
    vector
}

/// Words that carry no signal for repair lookups.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "at", "be", "but", "by", "for", "from", "has", "have", "in", "into",
    "is", "it", "its", "my", "of", "on", "or", "our", "so", "that", "the", "then", "there",
    "this", "to", "was", "were", "when", "with", "you", "your",
];

/// Feature-hashing fallback; lexical overlap only.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashingEmbedder;

impl HashingEmbedder {
    /// L2-normalised term-frequency vector; all zeros for text with no terms.
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; EMBEDDING_DIM];
        let lowered = text.to_lowercase();
        let terms = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.len() > 1 && !STOPWORDS.contains(t));

        for term in terms {
            let hash = fnv1a(term.as_bytes());
            let bucket = (hash % EMBEDDING_DIM as u64) as usize;
            // Sign bit spreads collisions so they partially cancel
            let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        normalize(vector)
    }
}

impl Embedder for HashingEmbedder {
    fn name(&self) -> &str {
        "hashing"
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIM
    }

    fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(PRIME))
}

/// Cosine similarity; 0.0 for mismatched or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashing_embeddings_are_normalised_and_deterministic() {
        let e = HashingEmbedder;
        let a = e.embed("Replace the furnace filter every three months");
        let b = e.embed("Replace the furnace filter every three months");
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert!(e.embed("the a of").iter().all(|v| *v == 0.0));
    }

    #[test]
    fn cosine_similarity_handles_degenerate_input() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 2.0], &[2.0, 4.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn mean_pool_ignores_padding() {
        // two tokens of width 2, second one padded out
        let states = [1.0, 3.0, 100.0, 100.0];
        let pooled = mean_pool(&states, &[1, 0], 2);
        let expected = normalize(vec![1.0, 3.0]);
        assert!((pooled[0] - expected[0]).abs() < 1e-6);
        assert!((pooled[1] - expected[1]).abs() < 1e-6);
    }

    #[test]
    fn missing_model_dir_falls_back_to_hashing() {
        assert_eq!(load_embedder(None).name(), "hashing");

        let dir = tempfile::tempdir().unwrap();
        let embedder = load_embedder(Some(dir.path()));
        assert_eq!(embedder.name(), "hashing");
        assert_eq!(embedder.dimension(), EMBEDDING_DIM);
    }

    #[tokio::test]
    async fn async_helpers_match_direct_calls() {
        let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder);
        let query = embed_query(&embedder, "leaking faucet").await.unwrap();
        assert_eq!(query, HashingEmbedder.embed("leaking faucet"));

        let docs = embed_documents(&embedder, vec!["a b".into(), "boiler".into()])
            .await
            .unwrap();
        assert_eq!(docs.len(), 2);
    }

    /// Runs against a real exported model when `EMBEDDING_MODEL_DIR` is set.
    #[test]
    fn sentence_model_matches_paraphrases() {
        let Some(dir) = std::env::var_os("EMBEDDING_MODEL_DIR") else {
            return;
        };
        let model = MiniLmEmbedder::load(Path::new(&dir)).unwrap();
        let vectors = model
            .embed_documents(&["faucet dripping", "tap leaking", "circuit breaker tripped"])
            .unwrap();
        assert_eq!(vectors[0].len(), EMBEDDING_DIM);
        let paraphrase = cosine_similarity(&vectors[0], &vectors[1]);
        let unrelated = cosine_similarity(&vectors[0], &vectors[2]);
        assert!(paraphrase > 0.35, "{paraphrase}");
        assert!(paraphrase > unrelated);
    }
}
