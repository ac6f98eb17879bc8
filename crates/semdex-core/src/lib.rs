//! # semdex core
//!
//! Shared, runtime-agnostic logic for semdex: the document model,
//! deterministic identity, collaborator traits, the enrichment pipeline,
//! the similarity search algorithm, and facet statistics.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or HTTP clients.
//! Concrete stores and providers live in the `semdex` app crate and are
//! injected through the traits defined here.

pub mod classify;
pub mod embedding;
pub mod error;
pub mod identity;
pub mod models;
pub mod pipeline;
pub mod search;
pub mod stats;
pub mod store;

pub use error::{ClassifyError, EmbedError, SearchError, StoreError};
pub use models::{
    Classification, ClassificationFields, Document, ScoredDocument, SearchHit, SearchResponse,
};
