//! In-memory [`VectorStore`] implementation for tests and embedding.
//!
//! Uses a `HashMap` behind `std::sync::RwLock`. Vector search is
//! brute-force cosine similarity over all stored documents.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::error::StoreError;
use crate::models::{Document, ScoredDocument};

use super::VectorStore;

/// In-memory store keyed by document id.
pub struct InMemoryStore {
    docs: RwLock<HashMap<String, Document>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::backend("in-memory store lock poisoned")
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn upsert(&self, doc: &Document) -> Result<(), StoreError> {
        let mut docs = self.docs.write().map_err(poisoned)?;

        if let Some(other) = docs.values().find(|d| d.id != doc.id) {
            if other.dims() != doc.dims() {
                return Err(StoreError::DimensionMismatch {
                    expected: other.dims(),
                    actual: doc.dims(),
                });
            }
        }

        let mut stored = doc.clone();
        if let Some(existing) = docs.get(&doc.id) {
            stored.created_at = existing.created_at;
        }
        docs.insert(doc.id.clone(), stored);
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredDocument>, StoreError> {
        let docs = self.docs.read().map_err(poisoned)?;
        let mut scored: Vec<ScoredDocument> = docs
            .values()
            .map(|doc| ScoredDocument {
                similarity: cosine_similarity(vector, &doc.embedding),
                document: doc.clone(),
            })
            .collect();
        scored.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| a.document.id.cmp(&b.document.id))
        });
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn get(&self, id: &str) -> Result<Option<Document>, StoreError> {
        let docs = self.docs.read().map_err(poisoned)?;
        Ok(docs.get(id).cloned())
    }

    async fn delete_one(&self, id: &str) -> Result<bool, StoreError> {
        let mut docs = self.docs.write().map_err(poisoned)?;
        Ok(docs.remove(id).is_some())
    }

    async fn delete_all(&self) -> Result<u64, StoreError> {
        let mut docs = self.docs.write().map_err(poisoned)?;
        let n = docs.len() as u64;
        docs.clear();
        Ok(n)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let docs = self.docs.read().map_err(poisoned)?;
        Ok(docs.len() as u64)
    }

    async fn list_all(&self) -> Result<Vec<Document>, StoreError> {
        let docs = self.docs.read().map_err(poisoned)?;
        let mut all: Vec<Document> = docs.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(all)
    }
}
