//! Core data models used throughout semdex.
//!
//! A [`Document`] is the persisted unit: one per source locator, carrying a
//! content preview, the embedding vector, and optional classification
//! labels. The other types are projections of it for search results and
//! listings, so the raw vector never leaves the store through the API.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted, enriched document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Reversible encoding of `source_locator`; see [`crate::identity`].
    pub id: String,
    /// Display name derived from the tail of the locator.
    pub filename: String,
    /// Absolute path or blob URL. Never changes for a given id.
    pub source_locator: String,
    /// Extracted text truncated to the preview cap.
    pub content_preview: String,
    /// Embedding of the leading content window.
    pub embedding: Vec<f32>,
    pub category: Option<String>,
    pub project: Option<String>,
    pub team: Option<String>,
    pub tags: BTreeSet<String>,
    /// Size of the source in bytes.
    pub size: u64,
    pub modified_at: DateTime<Utc>,
    /// First time this id was stored. Stores keep the original value on re-index.
    pub created_at: DateTime<Utc>,
}

impl Document {
    /// Number of dimensions of the stored embedding.
    pub fn dims(&self) -> usize {
        self.embedding.len()
    }

    /// Apply classification labels, replacing any previous ones.
    pub fn apply_classification(&mut self, classification: &Classification) {
        match classification {
            Classification::Present(fields) => {
                self.category = fields.category.clone();
                self.project = fields.project.clone();
                self.team = fields.team.clone();
                self.tags = fields.tags.iter().cloned().collect();
            }
            Classification::Absent => {
                self.category = None;
                self.project = None;
                self.team = None;
                self.tags.clear();
            }
        }
    }
}

/// Outcome of the classification collaborator.
///
/// `Absent` covers every failure mode (transport error, malformed
/// response, provider disabled); it is never an error for the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Classification {
    #[default]
    Absent,
    Present(ClassificationFields),
}

impl Classification {
    pub fn is_present(&self) -> bool {
        matches!(self, Classification::Present(_))
    }
}

/// Labels produced by a successful classification.
///
/// Empty strings are never stored here: they are normalized to `None`
/// (or dropped, for tags) before construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassificationFields {
    pub category: Option<String>,
    pub project: Option<String>,
    pub team: Option<String>,
    pub tags: Vec<String>,
}

/// A document paired with its cosine similarity to a query vector.
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub document: Document,
    /// Cosine similarity in `[-1.0, 1.0]`.
    pub similarity: f32,
}

/// A search result as returned to clients. Excludes the embedding.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub id: String,
    pub filename: String,
    pub preview: String,
    pub category: Option<String>,
    pub project: Option<String>,
    pub team: Option<String>,
    pub tags: Vec<String>,
    pub modified_at: DateTime<Utc>,
    pub similarity: f32,
}

impl From<ScoredDocument> for SearchHit {
    fn from(scored: ScoredDocument) -> Self {
        let doc = scored.document;
        SearchHit {
            id: doc.id,
            filename: doc.filename,
            preview: doc.content_preview,
            category: doc.category,
            project: doc.project,
            team: doc.team,
            tags: doc.tags.into_iter().collect(),
            modified_at: doc.modified_at,
            similarity: scored.similarity,
        }
    }
}

/// Response of a search request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
    pub count: usize,
}

impl SearchResponse {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_hits(results: Vec<SearchHit>) -> Self {
        let count = results.len();
        Self { results, count }
    }
}

/// Listing row for the document browser.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub id: String,
    pub filename: String,
    pub locator: String,
    pub category: Option<String>,
    pub team: Option<String>,
    pub project: Option<String>,
    pub size: u64,
    pub modified_at: DateTime<Utc>,
}

impl From<&Document> for DocumentSummary {
    fn from(doc: &Document) -> Self {
        DocumentSummary {
            id: doc.id.clone(),
            filename: doc.filename.clone(),
            locator: doc.source_locator.clone(),
            category: doc.category.clone(),
            team: doc.team.clone(),
            project: doc.project.clone(),
            size: doc.size,
            modified_at: doc.modified_at,
        }
    }
}
