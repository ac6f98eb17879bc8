//! Outward-facing operations shared by the CLI and the HTTP API.
//!
//! [`DocumentService`] owns the wired-up collaborators (store, embedder,
//! indexer, blob store, job registry) and exposes one method per
//! operation. Frontends only translate arguments and render results.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use semdex_core::embedding::Embedder;
use semdex_core::error::{SearchError, StoreError};
use semdex_core::models::{DocumentSummary, SearchResponse};
use semdex_core::pipeline::Enricher;
use semdex_core::search::{search, SearchParams};
use semdex_core::stats::{collect_stats, IndexStats};
use semdex_core::store::VectorStore;

use crate::blob::{BlobStore, LocalBlobStore};
use crate::classify::create_classifier;
use crate::config::{Config, RetrievalConfig};
use crate::db;
use crate::embedding::create_embedder;
use crate::extract::DocumentFormat;
use crate::indexer::Indexer;
use crate::jobs::{IndexJobs, JobHandle, JobStatus};
use crate::migrate;
use crate::sqlite_store::SqliteStore;

/// `{success, message}` result of a mutating operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Envelope {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Envelope {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>, error: impl ToString) -> Self {
        Self {
            success: false,
            message: message.into(),
            error: Some(error.to_string()),
        }
    }
}

/// One uploaded file.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Result of a batch upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReport {
    pub success: bool,
    pub message: String,
    pub indexed: u64,
    pub failed: u64,
}

impl UploadReport {
    fn new(indexed: u64, failed: u64) -> Self {
        let mut message = format!("Uploaded and indexed {} file(s)", indexed);
        if failed > 0 {
            message.push_str(&format!(", {} failed", failed));
        }
        Self {
            success: indexed > 0,
            message,
            indexed,
            failed,
        }
    }
}

/// The wired-up application.
pub struct DocumentService {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    indexer: Arc<Indexer>,
    jobs: IndexJobs,
    blobs: Arc<dyn BlobStore>,
    retrieval: RetrievalConfig,
    default_root: PathBuf,
}

impl DocumentService {
    /// Assemble a service from explicit collaborators.
    pub fn new(
        indexer: Arc<Indexer>,
        blobs: Arc<dyn BlobStore>,
        retrieval: RetrievalConfig,
        default_root: PathBuf,
    ) -> Self {
        Self {
            store: indexer.store().clone(),
            embedder: indexer.enricher().embedder().clone(),
            jobs: IndexJobs::new(indexer.clone()),
            indexer,
            blobs,
            retrieval,
            default_root,
        }
    }

    /// Open the database, run migrations, and build providers from `config`.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::run_migrations(&pool).await?;
        let store: Arc<dyn VectorStore> = Arc::new(SqliteStore::new(pool));

        let enricher = Enricher::new(
            create_embedder(&config.embedding)?,
            create_classifier(&config.classification)?,
            config.indexing.windows(),
        );
        let indexer = Arc::new(Indexer::new(
            store,
            enricher,
            config.indexing.max_concurrent_files,
        ));

        Ok(Self::new(
            indexer,
            Arc::new(LocalBlobStore::new(config.blobs.dir.clone())),
            config.retrieval.clone(),
            config.indexing.root.clone(),
        ))
    }

    pub fn indexer(&self) -> &Arc<Indexer> {
        &self.indexer
    }

    pub fn default_root(&self) -> &PathBuf {
        &self.default_root
    }

    pub fn search_params(&self) -> SearchParams {
        self.retrieval.search_params()
    }

    /// Semantic search. A missing `limit` uses the configured default;
    /// larger values are clamped to the configured maximum.
    pub async fn search(
        &self,
        query: &str,
        limit: Option<usize>,
    ) -> Result<SearchResponse, SearchError> {
        let limit = self.retrieval.effective_limit(limit);
        search(
            self.store.as_ref(),
            self.embedder.as_ref(),
            query,
            limit,
            &self.search_params(),
        )
        .await
    }

    /// Start a background index run over `root` (or the configured root).
    pub fn start_index(&self, root: Option<PathBuf>, reindex: bool) -> JobHandle {
        let root = root.unwrap_or_else(|| self.default_root.clone());
        self.jobs.start(root, reindex)
    }

    pub fn job_status(&self, id: &str) -> Option<JobStatus> {
        self.jobs.status(id)
    }

    pub fn cancel_job(&self, id: &str) -> bool {
        self.jobs.cancel(id)
    }

    pub async fn stats(&self) -> Result<IndexStats, StoreError> {
        collect_stats(self.store.as_ref()).await
    }

    pub async fn count(&self) -> Result<u64, StoreError> {
        self.store.count().await
    }

    /// Every document, newest first, without embeddings.
    pub async fn list_documents(&self) -> Result<Vec<DocumentSummary>, StoreError> {
        let docs = self.store.list_all().await?;
        Ok(docs.iter().map(DocumentSummary::from).collect())
    }

    /// Delete one document. Returns whether it existed.
    pub async fn delete_one(&self, id: &str) -> Result<bool, StoreError> {
        let existed = self.store.delete_one(id).await?;
        info!(id, existed, "delete document");
        Ok(existed)
    }

    pub async fn delete_all(&self) -> Result<u64, StoreError> {
        let removed = self.store.delete_all().await?;
        info!(removed, "cleared all documents");
        Ok(removed)
    }

    /// Store each file in the blob store and index it from its blob URL.
    ///
    /// Files with an unsupported extension are counted as failed without
    /// being stored.
    pub async fn upload(&self, files: Vec<UploadFile>) -> UploadReport {
        let mut indexed = 0;
        let mut failed = 0;

        for file in files {
            if DocumentFormat::from_filename(&file.filename).is_none() {
                warn!(file = %file.filename, "upload rejected: unsupported extension");
                failed += 1;
                continue;
            }

            let blob = match self.blobs.store(&file.bytes, &file.filename).await {
                Ok(blob) => blob,
                Err(e) => {
                    warn!(file = %file.filename, error = %e, "blob store failed");
                    failed += 1;
                    continue;
                }
            };

            match self
                .indexer
                .index_buffer(&file.bytes, &file.filename, &blob.url, blob.size)
                .await
            {
                Ok(Some(doc)) => {
                    info!(file = %file.filename, url = %blob.url, id = %doc.id, "indexed upload");
                    indexed += 1;
                }
                Ok(None) => {
                    warn!(file = %file.filename, "no content extracted from upload");
                    failed += 1;
                }
                Err(e) => {
                    warn!(file = %file.filename, error = %e, "failed to index upload");
                    failed += 1;
                }
            }
        }

        UploadReport::new(indexed, failed)
    }
}
