//! Storage abstraction for semdex.
//!
//! The [`VectorStore`] trait is everything the indexer, search engine,
//! and stats aggregator need from a persistence backend. Implementations
//! must make each single-record upsert and delete atomic; nothing above
//! this layer serializes concurrent writers.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{Document, ScoredDocument};

/// Abstract vector-indexed document store.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert`](VectorStore::upsert) | Insert or fully replace a document by id |
/// | [`query`](VectorStore::query) | Top-k documents by cosine similarity |
/// | [`get`](VectorStore::get) | Fetch one document |
/// | [`delete_one`](VectorStore::delete_one) | Remove one document |
/// | [`delete_all`](VectorStore::delete_all) | Remove every document |
/// | [`count`](VectorStore::count) | Number of stored documents |
/// | [`list_all`](VectorStore::list_all) | Every document, newest first |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert `doc`, or replace every field of the existing row with the
    /// same id except `created_at`, which keeps its first value.
    ///
    /// Fails with [`StoreError::DimensionMismatch`] if the corpus already
    /// holds vectors of a different length.
    async fn upsert(&self, doc: &Document) -> Result<(), StoreError>;

    /// Return up to `top_k` documents ordered by descending cosine
    /// similarity to `vector`.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredDocument>, StoreError>;

    async fn get(&self, id: &str) -> Result<Option<Document>, StoreError>;

    /// Remove a document. Returns whether it existed.
    async fn delete_one(&self, id: &str) -> Result<bool, StoreError>;

    /// Remove every document. Returns how many were removed.
    async fn delete_all(&self) -> Result<u64, StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;

    /// Every document, ordered by `created_at` descending then id.
    async fn list_all(&self) -> Result<Vec<Document>, StoreError>;
}
