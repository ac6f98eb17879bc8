//! Classification collaborator trait and response parsing.
//!
//! A classifier labels a document with an optional category, project,
//! team, and tag set. Model output is free text that is expected to
//! contain a JSON object; [`parse_classification`] locates the outermost
//! `{ ... }` span and deserializes it into a typed schema. Anything that
//! does not fit the schema is rejected as a whole rather than partially
//! scraped.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ClassifyError;
use crate::models::{Classification, ClassificationFields};

/// Labels a document from an excerpt of its text.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify `excerpt`, which belongs to the file named `filename`.
    ///
    /// Implementations return [`Classification::Absent`] when they have
    /// nothing to say; errors are reserved for transport and parse failures.
    async fn classify(&self, excerpt: &str, filename: &str)
        -> Result<Classification, ClassifyError>;
}

/// A classifier that never produces labels.
pub struct NoopClassifier;

#[async_trait]
impl Classifier for NoopClassifier {
    async fn classify(
        &self,
        _excerpt: &str,
        _filename: &str,
    ) -> Result<Classification, ClassifyError> {
        Ok(Classification::Absent)
    }
}

#[derive(Debug, Deserialize)]
struct RawClassification {
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    project: Option<String>,
    #[serde(default)]
    team: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

/// Parse a model response into a [`Classification`].
///
/// The response may wrap the JSON object in prose or code fences. Empty
/// strings and placeholder values (`"null"`, `"none"`, `"n/a"`) become
/// absent fields; empty and duplicate tags are dropped. A response whose
/// fields are all absent parses to [`Classification::Absent`].
///
/// # Errors
///
/// [`ClassifyError::InvalidResponse`] when no object is found or the
/// object does not match the schema (e.g. `"tags": "a, b"`).
pub fn parse_classification(response: &str) -> Result<Classification, ClassifyError> {
    let start = response
        .find('{')
        .ok_or_else(|| ClassifyError::InvalidResponse("no JSON object in response".to_string()))?;
    let end = response
        .rfind('}')
        .filter(|&end| end > start)
        .ok_or_else(|| ClassifyError::InvalidResponse("unterminated JSON object".to_string()))?;

    let raw: RawClassification = serde_json::from_str(&response[start..=end])
        .map_err(|e| ClassifyError::InvalidResponse(e.to_string()))?;

    let mut tags: Vec<String> = Vec::new();
    for tag in raw.tags.unwrap_or_default() {
        if let Some(tag) = normalize_label(Some(tag)) {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
    }

    let fields = ClassificationFields {
        category: normalize_label(raw.category),
        project: normalize_label(raw.project),
        team: normalize_label(raw.team),
        tags,
    };

    if fields == ClassificationFields::default() {
        Ok(Classification::Absent)
    } else {
        Ok(Classification::Present(fields))
    }
}

fn normalize_label(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.to_ascii_lowercase().as_str() {
        "null" | "none" | "n/a" => None,
        _ => Some(trimmed.to_string()),
    }
}
