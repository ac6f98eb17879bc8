//! Enrichment pipeline: embedding and classification for one document.
//!
//! The two collaborator calls run concurrently and are awaited together,
//! so per-document latency is the slower of the two. Their failures are
//! treated differently:
//!
//! | Stage | On failure |
//! |-------|------------|
//! | embedding | [`EmbedError`] is returned; the caller skips the document |
//! | classification | logged, labels fall back to [`Classification::Absent`] |

use std::sync::Arc;

use tracing::warn;

use crate::classify::Classifier;
use crate::embedding::{check_dims, Embedder};
use crate::error::EmbedError;
use crate::models::Classification;

/// Character windows applied to extracted text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Windows {
    /// Characters stored as the document preview.
    pub preview_chars: usize,
    /// Leading characters sent to the embedder.
    pub embed_chars: usize,
    /// Leading characters sent to the classifier.
    pub classify_chars: usize,
}

impl Default for Windows {
    fn default() -> Self {
        Self {
            preview_chars: 1000,
            embed_chars: 5000,
            classify_chars: 8000,
        }
    }
}

/// Output of a successful enrichment.
#[derive(Debug, Clone)]
pub struct Enrichment {
    pub embedding: Vec<f32>,
    pub classification: Classification,
}

/// Runs the embedding and classification collaborators for extracted text.
pub struct Enricher {
    embedder: Arc<dyn Embedder>,
    classifier: Arc<dyn Classifier>,
    windows: Windows,
}

impl Enricher {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        classifier: Arc<dyn Classifier>,
        windows: Windows,
    ) -> Self {
        Self {
            embedder,
            classifier,
            windows,
        }
    }

    pub fn windows(&self) -> Windows {
        self.windows
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Enrich `content` belonging to `filename`.
    ///
    /// # Errors
    ///
    /// Only embedding failures (including a vector of the wrong length)
    /// are returned. Classification problems never surface here.
    pub async fn enrich(&self, content: &str, filename: &str) -> Result<Enrichment, EmbedError> {
        let embed_input = truncate_chars(content, self.windows.embed_chars);
        let classify_input = truncate_chars(content, self.windows.classify_chars);

        let (embedding, classification) = futures::join!(
            self.embedder.embed(embed_input),
            self.classifier.classify(classify_input, filename),
        );

        let embedding = embedding?;
        check_dims(self.embedder.dims(), &embedding)?;

        let classification = classification.unwrap_or_else(|e| {
            warn!(file = filename, error = %e, "classification failed, storing without labels");
            Classification::Absent
        });

        Ok(Enrichment {
            embedding,
            classification,
        })
    }
}

/// Borrow at most `max_chars` leading characters of `text`.
///
/// Cuts on a `char` boundary, never inside a multi-byte sequence.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClassifyError;
    use crate::models::ClassificationFields;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    struct RecordingEmbedder {
        seen: Mutex<Vec<String>>,
        fail: bool,
        dims: usize,
    }

    #[async_trait]
    impl Embedder for RecordingEmbedder {
        fn model_name(&self) -> &str {
            "recording"
        }
        fn dims(&self) -> usize {
            self.dims
        }
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
            self.seen.lock().unwrap().push(text.to_string());
            tokio::time::sleep(Duration::from_millis(50)).await;
            if self.fail {
                Err(EmbedError::Request("quota exceeded".to_string()))
            } else {
                Ok(vec![0.5, 0.5])
            }
        }
    }

    struct ScriptedClassifier {
        seen: Mutex<Vec<String>>,
        outcome: fn() -> Result<Classification, ClassifyError>,
    }

    #[async_trait]
    impl Classifier for ScriptedClassifier {
        async fn classify(
            &self,
            excerpt: &str,
            _filename: &str,
        ) -> Result<Classification, ClassifyError> {
            self.seen.lock().unwrap().push(excerpt.to_string());
            tokio::time::sleep(Duration::from_millis(50)).await;
            (self.outcome)()
        }
    }

    fn labels() -> Result<Classification, ClassifyError> {
        Ok(Classification::Present(ClassificationFields {
            category: Some("Marketing".to_string()),
            ..Default::default()
        }))
    }

    fn broken() -> Result<Classification, ClassifyError> {
        Err(ClassifyError::InvalidResponse("not json".to_string()))
    }

    fn enricher(
        fail_embed: bool,
        dims: usize,
        outcome: fn() -> Result<Classification, ClassifyError>,
    ) -> (Enricher, Arc<RecordingEmbedder>, Arc<ScriptedClassifier>) {
        let embedder = Arc::new(RecordingEmbedder {
            seen: Mutex::new(Vec::new()),
            fail: fail_embed,
            dims,
        });
        let classifier = Arc::new(ScriptedClassifier {
            seen: Mutex::new(Vec::new()),
            outcome,
        });
        let windows = Windows {
            preview_chars: 4,
            embed_chars: 5,
            classify_chars: 8,
        };
        (
            Enricher::new(embedder.clone(), classifier.clone(), windows),
            embedder,
            classifier,
        )
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 5), "héllo");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[tokio::test]
    async fn windows_are_applied_independently() {
        let (enricher, embedder, classifier) = enricher(false, 2, labels);
        let out = enricher.enrich("0123456789abcdef", "a.txt").await.unwrap();
        assert_eq!(out.embedding, vec![0.5, 0.5]);
        assert!(out.classification.is_present());
        assert_eq!(embedder.seen.lock().unwrap().as_slice(), ["01234"]);
        assert_eq!(classifier.seen.lock().unwrap().as_slice(), ["01234567"]);
    }

    #[tokio::test]
    async fn embedding_failure_is_fatal() {
        let (enricher, _, _) = enricher(true, 2, labels);
        let err = enricher.enrich("text", "a.txt").await.unwrap_err();
        assert!(matches!(err, EmbedError::Request(_)));
    }

    #[tokio::test]
    async fn classification_failure_degrades_to_absent() {
        let (enricher, _, _) = enricher(false, 2, broken);
        let out = enricher.enrich("text", "a.txt").await.unwrap();
        assert_eq!(out.embedding.len(), 2);
        assert_eq!(out.classification, Classification::Absent);
    }

    #[tokio::test]
    async fn wrong_dimension_is_an_embedding_failure() {
        let (enricher, _, _) = enricher(false, 3, labels);
        let err = enricher.enrich("text", "a.txt").await.unwrap_err();
        assert!(matches!(err, EmbedError::DimensionMismatch { expected: 3, actual: 2 }));
    }

    #[tokio::test]
    async fn calls_run_concurrently() {
        let (enricher, _, _) = enricher(false, 2, labels);
        let started = std::time::Instant::now();
        enricher.enrich("text", "a.txt").await.unwrap();
        // Each collaborator sleeps 50ms; sequential calls would take >= 100ms.
        assert!(started.elapsed() < Duration::from_millis(95));
    }
}
