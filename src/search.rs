//! Semantic, hybrid, and similar-to search over the current snapshot

use crate::config::SearchConfig;
use crate::embedding::{cosine_similarity, Embedder};
use crate::error::{JobTrackerError, Result};
use crate::posting::{Posting, Snapshot};
use serde::Serialize;
use std::sync::Arc;

/// Optional exact filters applied before semantic ranking. All supplied
/// filters are conjunctive; omitted filters impose no restriction.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    /// Exact city match, case-insensitive
    pub city: Option<String>,
    /// Substring match against the role keyword (or title when the
    /// posting has no role), case-insensitive
    pub role: Option<String>,
    /// Exact membership in the posting's skill set, case-insensitive
    pub skill: Option<String>,
}

impl SearchFilters {
    fn matches(&self, posting: &Posting) -> bool {
        if let Some(city) = &self.city {
            if !posting.city.eq_ignore_ascii_case(city) {
                return false;
            }
        }
        if let Some(role) = &self.role {
            let haystack = if posting.role.is_empty() {
                &posting.title
            } else {
                &posting.role
            };
            if !haystack.to_lowercase().contains(&role.to_lowercase()) {
                return false;
            }
        }
        if let Some(skill) = &self.skill {
            if !posting.skills.iter().any(|s| s.eq_ignore_ascii_case(skill)) {
                return false;
            }
        }
        true
    }
}

/// One ranked search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub posting: Posting,
    pub similarity: f32,
}

pub struct SearchEngine {
    embedder: Arc<dyn Embedder>,
    config: SearchConfig,
}

impl SearchEngine {
    pub fn new(embedder: Arc<dyn Embedder>, config: SearchConfig) -> Self {
        Self { embedder, config }
    }

    /// Semantic search: rank every posting that carries an embedding by
    /// cosine similarity to the query, descending, with stable input-order
    /// tiebreak. Results below the threshold are dropped.
    pub fn search(
        &self,
        snapshot: &Snapshot,
        query: &str,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<SearchHit>> {
        self.hybrid_search(snapshot, query, &SearchFilters::default(), limit, threshold)
    }

    /// Hybrid search: restrict candidates to postings satisfying every
    /// supplied filter, then rank exactly like [`Self::search`].
    pub fn hybrid_search(
        &self,
        snapshot: &Snapshot,
        query: &str,
        filters: &SearchFilters,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Err(JobTrackerError::InvalidQuery(
                "Search query must not be empty".to_string(),
            ));
        }

        let query_embedding = self.embedder.embed(query)?;
        let candidates = snapshot.postings.iter().filter(|p| filters.matches(p));
        Ok(self.rank(candidates, &query_embedding, None, limit, threshold))
    }

    /// Find postings similar to an existing one, excluding the posting
    /// itself. A missing posting or a posting without an embedding has no
    /// computable neighbors and yields an empty result, not an error.
    pub fn similar_to(
        &self,
        snapshot: &Snapshot,
        posting_id: &str,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<SearchHit>> {
        let Some(source) = snapshot.find(posting_id) else {
            return Ok(Vec::new());
        };
        let Some(source_embedding) = source.embedding.clone() else {
            return Ok(Vec::new());
        };

        Ok(self.rank(
            snapshot.postings.iter(),
            &source_embedding,
            Some(posting_id),
            limit,
            threshold,
        ))
    }

    /// Structured-filter listing without semantic ranking. This is the
    /// degraded-mode path when the embedding backend is unavailable, and
    /// the plain filtered listing endpoint.
    pub fn filter(&self, snapshot: &Snapshot, filters: &SearchFilters, limit: usize) -> Vec<Posting> {
        let limit = self.clamp_limit(limit);
        snapshot
            .postings
            .iter()
            .filter(|p| filters.matches(p))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Oversized limits clamp to the configured maximum; a limit of zero
    /// is honored as zero.
    pub fn clamp_limit(&self, limit: usize) -> usize {
        limit.min(self.config.max_limit)
    }

    fn rank<'a>(
        &self,
        candidates: impl Iterator<Item = &'a Posting>,
        query_embedding: &[f32],
        exclude_id: Option<&str>,
        limit: usize,
        threshold: f32,
    ) -> Vec<SearchHit> {
        let limit = self.clamp_limit(limit);
        let threshold = threshold.clamp(0.0, 1.0);

        let mut hits: Vec<SearchHit> = candidates
            .filter(|p| exclude_id != Some(p.id.as_str()))
            .filter_map(|p| {
                let embedding = p.embedding.as_ref()?;
                let similarity = cosine_similarity(query_embedding, embedding);
                (similarity >= threshold).then(|| SearchHit {
                    posting: p.clone(),
                    similarity,
                })
            })
            .collect();

        // Stable sort keeps input order for equal similarities
        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        hits
    }
}
