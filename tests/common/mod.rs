//! Deterministic collaborators and fixtures shared by the integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use semdex::blob::LocalBlobStore;
use semdex::config::RetrievalConfig;
use semdex::indexer::Indexer;
use semdex::service::DocumentService;
use semdex::sqlite_store::SqliteStore;
use semdex::{db, migrate};
use semdex_core::classify::{Classifier, NoopClassifier};
use semdex_core::embedding::Embedder;
use semdex_core::error::{ClassifyError, EmbedError};
use semdex_core::models::{Classification, ClassificationFields};
use semdex_core::pipeline::{Enricher, Windows};
use semdex_core::store::VectorStore;

pub const VOCAB: [&str; 5] = ["apple", "banana", "car", "truck", "pie"];

/// Bag-of-words embedder over [`VOCAB`]. Text containing "poison" fails.
pub struct VocabEmbedder;

#[async_trait]
impl Embedder for VocabEmbedder {
    fn model_name(&self) -> &str {
        "vocab"
    }

    fn dims(&self) -> usize {
        VOCAB.len()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        if text.contains("poison") {
            return Err(EmbedError::Api {
                status: 500,
                body: "poisoned input".into(),
            });
        }
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        Ok(VOCAB
            .iter()
            .map(|v| words.iter().filter(|w| *w == v).count() as f32)
            .collect())
    }
}

/// Wraps [`VocabEmbedder`] and records the peak number of concurrent calls.
#[derive(Default)]
pub struct ProbeEmbedder {
    in_flight: AtomicUsize,
    pub peak: AtomicUsize,
}

#[async_trait]
impl Embedder for ProbeEmbedder {
    fn model_name(&self) -> &str {
        "probe"
    }

    fn dims(&self) -> usize {
        VOCAB.len()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        VocabEmbedder.embed(text).await
    }
}

/// Cancels `token` once `after` embeddings have been produced.
pub struct CancellingEmbedder {
    pub token: CancellationToken,
    pub after: usize,
    calls: AtomicUsize,
}

impl CancellingEmbedder {
    pub fn new(token: CancellationToken, after: usize) -> Self {
        Self {
            token,
            after,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Embedder for CancellingEmbedder {
    fn model_name(&self) -> &str {
        "cancelling"
    }

    fn dims(&self) -> usize {
        VOCAB.len()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) + 1 >= self.after {
            self.token.cancel();
        }
        VocabEmbedder.embed(text).await
    }
}

/// Always fails, as an unreachable provider would.
pub struct FailingClassifier;

#[async_trait]
impl Classifier for FailingClassifier {
    async fn classify(
        &self,
        _excerpt: &str,
        _filename: &str,
    ) -> Result<Classification, ClassifyError> {
        Err(ClassifyError::Request("connection refused".into()))
    }
}

/// Labels every document with the same fixed classification.
pub struct FixedClassifier(pub ClassificationFields);

#[async_trait]
impl Classifier for FixedClassifier {
    async fn classify(
        &self,
        _excerpt: &str,
        _filename: &str,
    ) -> Result<Classification, ClassifyError> {
        Ok(Classification::Present(self.0.clone()))
    }
}

pub fn marketing_labels() -> ClassificationFields {
    ClassificationFields {
        category: Some("Marketing".into()),
        project: Some("Launch".into()),
        team: Some("Growth".into()),
        tags: vec!["campaign".into()],
    }
}

/// A migrated SQLite store under `tmp`.
pub async fn sqlite_store(tmp: &TempDir) -> Arc<dyn VectorStore> {
    let pool = db::connect_path(&tmp.path().join("data/semdex.sqlite"))
        .await
        .unwrap();
    migrate::run_migrations(&pool).await.unwrap();
    Arc::new(SqliteStore::new(pool))
}

pub fn indexer_with(
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    classifier: Arc<dyn Classifier>,
    max_concurrent_files: usize,
) -> Indexer {
    Indexer::new(
        store,
        Enricher::new(embedder, classifier, Windows::default()),
        max_concurrent_files,
    )
}

/// A service backed by SQLite in `tmp`, the vocabulary embedder, and no classifier.
pub async fn vocab_service(tmp: &TempDir, root: &Path) -> DocumentService {
    let store = sqlite_store(tmp).await;
    let indexer = indexer_with(store, Arc::new(VocabEmbedder), Arc::new(NoopClassifier), 2);
    DocumentService::new(
        Arc::new(indexer),
        Arc::new(LocalBlobStore::new(tmp.path().join("blobs"))),
        RetrievalConfig::default(),
        root.to_path_buf(),
    )
}

/// The three-file corpus: two apple documents, one vehicle document, and a binary.
pub fn write_corpus(root: &Path) {
    std::fs::create_dir_all(root.join("notes")).unwrap();
    std::fs::write(root.join("a.txt"), "apple banana").unwrap();
    std::fs::write(root.join("b.txt"), "car truck").unwrap();
    std::fs::write(root.join("notes/c.md"), "# apple pie").unwrap();
    std::fs::write(root.join("tool.exe"), [0u8, 1, 2, 3]).unwrap();
}
