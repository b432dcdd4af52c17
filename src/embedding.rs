//! Embedding generation for semantic search
//!
//! Every posting gets a fixed-dimension vector derived deterministically
//! from its descriptive text. The default backend is an FNV-1a feature
//! hashing embedder: no model downloads, no network, same text in, same
//! vector out. Real model backends plug in through the [`Embedder`] trait.

use crate::error::Result;
use crate::posting::{fnv1a64, Posting, FNV_OFFSET};
use crate::store::JobStore;
use log::{info, warn};
use std::sync::Arc;

/// Text-to-vector backend. Implementations must be deterministic: the
/// same input text always produces the same vector.
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Deterministic feature-hashing embedder.
///
/// Tokens are hashed with FNV-1a into one of `dimension` buckets with a
/// hash-derived sign, and the result is L2-normalized so dot products are
/// cosine similarities.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
        text.split(|c: char| !(c.is_alphanumeric() || c == '+' || c == '#'))
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase())
    }
}

impl Embedder for HashEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in Self::tokenize(text) {
            let hash = fnv1a64(token.as_bytes(), FNV_OFFSET);
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }
}

/// Cosine similarity between two vectors. Mismatched dimensions or zero
/// vectors score 0.0 rather than erroring; such pairs are simply not
/// meaningful neighbors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Deterministic concatenation of the fields a posting's embedding is
/// computed from. Queries are embedded with the same function, so this
/// ordering is part of the search contract.
pub fn searchable_text(posting: &Posting) -> String {
    let mut parts = vec![posting.title.clone()];
    if !posting.company.is_empty() {
        parts.push(format!("at {}", posting.company));
    }
    if !posting.role.is_empty() {
        parts.push(posting.role.clone());
    }
    parts.extend(posting.skills.iter().cloned());
    if let Some(description) = &posting.description {
        parts.push(description.clone());
    }
    parts.join(" ")
}

/// Outcome of one incremental embedding sweep.
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub embedded: usize,
    pub already_embedded: usize,
    pub failed_batches: usize,
}

/// Incremental, idempotent embedding sweep over the store.
///
/// Postings that already carry an embedding are skipped, so re-running
/// after a partial failure only processes the remainder. Each batch is
/// persisted as a single step; a failed batch is logged and left for the
/// next sweep, never blocking the batches around it.
pub struct EmbeddingGenerator {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn JobStore>,
    batch_size: usize,
}

impl EmbeddingGenerator {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn JobStore>, batch_size: usize) -> Self {
        Self {
            embedder,
            store,
            batch_size: batch_size.max(1),
        }
    }

    pub fn sweep(&self) -> Result<SweepReport> {
        let postings = self.store.load_all()?;
        let mut report = SweepReport::default();

        let pending: Vec<&Posting> = postings
            .iter()
            .filter(|p| {
                if p.embedding.is_some() {
                    report.already_embedded += 1;
                    false
                } else {
                    true
                }
            })
            .collect();

        if pending.is_empty() {
            return Ok(report);
        }
        info!(
            "Embedding sweep: {} postings pending in batches of {}",
            pending.len(),
            self.batch_size
        );

        for batch in pending.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|p| searchable_text(p)).collect();

            let vectors = match self.embedder.embed_batch(&texts) {
                Ok(vectors) => vectors,
                Err(e) => {
                    warn!("Embedding batch failed, will retry next sweep: {}", e);
                    report.failed_batches += 1;
                    continue;
                }
            };

            // Never persist vectors that violate the dimension invariant
            if vectors.iter().any(|v| v.len() != self.embedder.dimension()) {
                warn!(
                    "Embedding batch dropped: backend returned a vector of the wrong dimension (expected {})",
                    self.embedder.dimension()
                );
                report.failed_batches += 1;
                continue;
            }

            let updates: Vec<(String, Vec<f32>)> = batch
                .iter()
                .map(|p| p.id.clone())
                .zip(vectors)
                .collect();

            match self.store.save_embeddings(&updates) {
                Ok(()) => report.embedded += updates.len(),
                Err(e) => {
                    warn!("Persisting embedding batch failed: {}", e);
                    report.failed_batches += 1;
                }
            }
        }

        Ok(report)
    }
}
