//! Facet summaries over the stored corpus.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::StoreError;
use crate::models::Document;
use crate::store::VectorStore;

/// Corpus overview: document count plus the distinct classification labels.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub total_documents: u64,
    pub categories: Vec<String>,
    pub teams: Vec<String>,
    pub projects: Vec<String>,
}

/// Summarize a set of documents.
///
/// Each facet lists every distinct non-empty value once, sorted.
/// Unclassified documents count toward the total but add no facet values.
pub fn summarize(docs: &[Document]) -> IndexStats {
    IndexStats {
        total_documents: docs.len() as u64,
        categories: distinct(docs.iter().map(|d| d.category.as_deref())),
        teams: distinct(docs.iter().map(|d| d.team.as_deref())),
        projects: distinct(docs.iter().map(|d| d.project.as_deref())),
    }
}

/// Load every document from `store` and summarize it.
pub async fn collect_stats(store: &dyn VectorStore) -> Result<IndexStats, StoreError> {
    let docs = store.list_all().await?;
    Ok(summarize(&docs))
}

fn distinct<'a>(values: impl Iterator<Item = Option<&'a str>>) -> Vec<String> {
    values
        .flatten()
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
