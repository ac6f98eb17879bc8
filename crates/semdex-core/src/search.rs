//! Semantic search over a [`VectorStore`].
//!
//! # Algorithm
//!
//! 1. Blank query or zero limit: empty response, no collaborator calls.
//! 2. Empty store: empty response, checked *before* embedding the query.
//! 3. Embed the query with the same embedder used for documents.
//! 4. Fetch `overfetch_factor × limit` candidates from the store.
//! 5. Keep candidates with similarity strictly above the threshold.
//! 6. Sort by similarity (desc), then id (asc), regardless of store order.
//! 7. Truncate to `limit`.
//! 8. Project to [`SearchHit`], dropping the embedding.

use tracing::debug;

use crate::embedding::Embedder;
use crate::error::SearchError;
use crate::models::{ScoredDocument, SearchHit, SearchResponse};
use crate::store::VectorStore;

/// Minimum similarity a candidate must exceed to be returned.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.4;

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchParams {
    /// Candidates must score strictly above this.
    pub similarity_threshold: f32,
    /// How many candidates to request per result slot.
    pub overfetch_factor: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            overfetch_factor: 2,
        }
    }
}

/// Run a semantic search.
///
/// This is the function every frontend (CLI, HTTP) delegates to.
pub async fn search(
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
    query: &str,
    limit: usize,
    params: &SearchParams,
) -> Result<SearchResponse, SearchError> {
    let query = query.trim();
    if query.is_empty() || limit == 0 {
        return Ok(SearchResponse::empty());
    }

    if store.count().await? == 0 {
        debug!("search skipped: store is empty");
        return Ok(SearchResponse::empty());
    }

    let query_vec = embedder.embed(query).await?;
    let top_k = limit.saturating_mul(params.overfetch_factor.max(1));
    let candidates = store.query(&query_vec, top_k).await?;
    let fetched = candidates.len();

    let ranked = rank_candidates(candidates, params.similarity_threshold, limit);
    debug!(query, fetched, returned = ranked.len(), "search complete");

    Ok(SearchResponse::from_hits(
        ranked.into_iter().map(SearchHit::from).collect(),
    ))
}

/// Filter, sort, and truncate raw store candidates.
///
/// A candidate survives iff its similarity is strictly greater than
/// `threshold` (NaN never survives). Ties are broken by id so the output
/// does not depend on store order.
pub fn rank_candidates(
    candidates: Vec<ScoredDocument>,
    threshold: f32,
    limit: usize,
) -> Vec<ScoredDocument> {
    let mut kept: Vec<ScoredDocument> = candidates
        .into_iter()
        .filter(|c| c.similarity > threshold)
        .collect();

    kept.sort_by(|a, b| {
        b.similarity
            .total_cmp(&a.similarity)
            .then_with(|| a.document.id.cmp(&b.document.id))
    });
    kept.truncate(limit);
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EmbedError;
    use crate::identity::identify;
    use crate::models::Document;
    use crate::store::memory::InMemoryStore;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn doc(locator: &str, embedding: Vec<f32>) -> Document {
        let now = Utc::now();
        Document {
            id: identify(locator),
            filename: locator.to_string(),
            source_locator: locator.to_string(),
            content_preview: String::new(),
            embedding,
            category: None,
            project: None,
            team: None,
            tags: BTreeSet::new(),
            size: 0,
            modified_at: now,
            created_at: now,
        }
    }

    fn candidate(locator: &str, similarity: f32) -> ScoredDocument {
        ScoredDocument {
            document: doc(locator, vec![1.0]),
            similarity,
        }
    }

    struct CountingEmbedder {
        calls: AtomicUsize,
        vector: Vec<f32>,
    }

    impl CountingEmbedder {
        fn new(vector: Vec<f32>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                vector,
            }
        }
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        fn model_name(&self) -> &str {
            "counting"
        }
        fn dims(&self) -> usize {
            self.vector.len()
        }
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.vector.clone())
        }
    }

    /// Returns candidates in a fixed (unsorted) order, ignoring the vector.
    struct ShuffledStore {
        candidates: Vec<(String, f32)>,
        requested_top_k: AtomicUsize,
    }

    #[async_trait]
    impl VectorStore for ShuffledStore {
        async fn upsert(&self, _doc: &Document) -> Result<(), crate::error::StoreError> {
            Ok(())
        }
        async fn query(
            &self,
            _vector: &[f32],
            top_k: usize,
        ) -> Result<Vec<ScoredDocument>, crate::error::StoreError> {
            self.requested_top_k.store(top_k, Ordering::SeqCst);
            Ok(self
                .candidates
                .iter()
                .map(|(loc, s)| candidate(loc, *s))
                .collect())
        }
        async fn get(&self, _id: &str) -> Result<Option<Document>, crate::error::StoreError> {
            Ok(None)
        }
        async fn delete_one(&self, _id: &str) -> Result<bool, crate::error::StoreError> {
            Ok(false)
        }
        async fn delete_all(&self) -> Result<u64, crate::error::StoreError> {
            Ok(0)
        }
        async fn count(&self) -> Result<u64, crate::error::StoreError> {
            Ok(self.candidates.len() as u64)
        }
        async fn list_all(&self) -> Result<Vec<Document>, crate::error::StoreError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn threshold_is_strict() {
        let ranked = rank_candidates(
            vec![
                candidate("/at", 0.4),
                candidate("/above", 0.400_001),
                candidate("/below", 0.399),
                candidate("/neg", -0.9),
                candidate("/nan", f32::NAN),
            ],
            0.4,
            10,
        );
        let locs: Vec<&str> = ranked
            .iter()
            .map(|c| c.document.source_locator.as_str())
            .collect();
        assert_eq!(locs, vec!["/above"]);
    }

    #[test]
    fn ranking_is_descending_and_limited() {
        let ranked = rank_candidates(
            vec![
                candidate("/c", 0.5),
                candidate("/a", 0.9),
                candidate("/d", 0.45),
                candidate("/b", 0.7),
            ],
            0.4,
            3,
        );
        let sims: Vec<f32> = ranked.iter().map(|c| c.similarity).collect();
        assert_eq!(sims, vec![0.9, 0.7, 0.5]);
    }

    #[test]
    fn ties_break_by_id() {
        let ranked = rank_candidates(
            vec![candidate("/b", 0.8), candidate("/a", 0.8)],
            0.4,
            10,
        );
        assert!(ranked[0].document.id < ranked[1].document.id);
    }

    #[tokio::test]
    async fn empty_store_skips_embedding() {
        let store = InMemoryStore::new();
        let embedder = CountingEmbedder::new(vec![1.0, 0.0]);
        let resp = search(&store, &embedder, "apple", 10, &SearchParams::default())
            .await
            .unwrap();
        assert_eq!(resp, SearchResponse::empty());
        assert_eq!(resp.count, 0);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn blank_query_skips_everything() {
        let store = InMemoryStore::new();
        store.upsert(&doc("/a", vec![1.0, 0.0])).await.unwrap();
        let embedder = CountingEmbedder::new(vec![1.0, 0.0]);
        let resp = search(&store, &embedder, "   ", 10, &SearchParams::default())
            .await
            .unwrap();
        assert_eq!(resp.count, 0);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn overfetches_and_resorts_store_output() {
        let store = ShuffledStore {
            candidates: vec![
                ("/low".to_string(), 0.41),
                ("/high".to_string(), 0.95),
                ("/out".to_string(), 0.2),
                ("/mid".to_string(), 0.6),
            ],
            requested_top_k: AtomicUsize::new(0),
        };
        let embedder = CountingEmbedder::new(vec![1.0]);
        let resp = search(&store, &embedder, "q", 2, &SearchParams::default())
            .await
            .unwrap();

        assert_eq!(store.requested_top_k.load(Ordering::SeqCst), 4);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(resp.count, 2);
        assert_eq!(resp.results[0].filename, "/high");
        assert_eq!(resp.results[1].filename, "/mid");
    }

    #[tokio::test]
    async fn results_never_exceed_limit() {
        let store = InMemoryStore::new();
        for i in 0..10 {
            store
                .upsert(&doc(&format!("/doc{}", i), vec![1.0, i as f32 * 0.01]))
                .await
                .unwrap();
        }
        let embedder = CountingEmbedder::new(vec![1.0, 0.0]);
        let resp = search(&store, &embedder, "anything", 3, &SearchParams::default())
            .await
            .unwrap();
        assert_eq!(resp.count, 3);
        assert_eq!(resp.results.len(), 3);
    }
}
