//! Directory and upload indexing.
//!
//! # Pipeline
//!
//! ```text
//! walk root ─► filter by extension ─► read bytes ─► extract text
//!     ─► skip if empty ─► enrich (embed ∥ classify) ─► upsert
//! ```
//!
//! Files are processed by a pool of at most `max_concurrent_files`
//! in-flight futures. Every per-file failure is contained: unreadable
//! directories, corrupt files, and embedding or store errors are logged
//! and counted, and the run continues with the next file.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use semdex_core::error::{EmbedError, StoreError};
use semdex_core::identity::{filename_from_locator, identify};
use semdex_core::models::Document;
use semdex_core::pipeline::{truncate_chars, Enricher};
use semdex_core::store::VectorStore;

use crate::extract::{extract_text, DocumentFormat};
use crate::progress::{IndexProgress, IndexProgressEvent};

/// Failure to index a single source.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error(transparent)]
    Embedding(#[from] EmbedError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome counts of a directory run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexReport {
    /// Documents enriched and stored.
    pub indexed: u64,
    /// Supported files whose extracted text was empty.
    pub skipped_empty: u64,
    /// Files with an unsupported extension.
    pub unsupported: u64,
    /// Supported files that failed to read, embed, or store.
    pub failed: u64,
    /// Directory entries the walk could not read.
    pub traversal_errors: u64,
    /// The run stopped early because its token was cancelled.
    pub cancelled: bool,
}

impl IndexReport {
    pub fn success_count(&self) -> u64 {
        self.indexed
    }
}

enum FileOutcome {
    Indexed,
    Empty,
    Failed,
}

struct Discovery {
    files: Vec<PathBuf>,
    unsupported: u64,
    traversal_errors: u64,
}

/// Depth-first walk collecting supported files in a stable order.
fn discover(root: &Path) -> Discovery {
    let mut discovery = Discovery {
        files: Vec::new(),
        unsupported: 0,
        traversal_errors: 0,
    };

    for entry in WalkDir::new(root).sort_by_file_name() {
        match entry {
            Ok(entry) => {
                if !entry.file_type().is_file() {
                    continue;
                }
                if DocumentFormat::from_path(entry.path()).is_some() {
                    discovery.files.push(entry.into_path());
                } else {
                    debug!(path = %entry.path().display(), "skipping unsupported file");
                    discovery.unsupported += 1;
                }
            }
            Err(err) => {
                warn!(
                    path = ?err.path(),
                    error = %err,
                    "cannot read directory entry, skipping subtree"
                );
                discovery.traversal_errors += 1;
            }
        }
    }

    discovery
}

/// Display name for a file found under `root`: its root-relative path.
fn relative_filename(root: &Path, path: &Path, locator: &str) -> String {
    path.strip_prefix(root)
        .ok()
        .map(|p| p.to_string_lossy().into_owned())
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| filename_from_locator(locator))
}

/// Drives extraction, enrichment, and persistence.
pub struct Indexer {
    store: Arc<dyn VectorStore>,
    enricher: Enricher,
    max_concurrent_files: usize,
}

impl Indexer {
    pub fn new(
        store: Arc<dyn VectorStore>,
        enricher: Enricher,
        max_concurrent_files: usize,
    ) -> Self {
        Self {
            store,
            enricher,
            max_concurrent_files: max_concurrent_files.max(1),
        }
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn enricher(&self) -> &Enricher {
        &self.enricher
    }

    /// Index every supported file under `root`.
    ///
    /// Only a root that cannot be resolved is an error; everything below
    /// it degrades into counts on the returned [`IndexReport`]. When
    /// `cancel` fires, no new files are started and in-flight files are
    /// dropped.
    pub async fn index_directory(
        &self,
        root: &Path,
        progress: &dyn IndexProgress,
        cancel: &CancellationToken,
    ) -> Result<IndexReport, IndexError> {
        let root = tokio::fs::canonicalize(root).await?;
        let root_display = root.display().to_string();
        info!(root = %root_display, "scanning directory");
        progress.report(IndexProgressEvent::Discovering {
            root: root_display.clone(),
        });

        let walk_root = root.clone();
        let discovery = tokio::task::spawn_blocking(move || discover(&walk_root))
            .await
            .map_err(std::io::Error::other)?;

        let mut report = IndexReport {
            unsupported: discovery.unsupported,
            traversal_errors: discovery.traversal_errors,
            ..IndexReport::default()
        };
        let total = discovery.files.len() as u64;
        let mut processed = 0u64;

        let root_ref = root.as_path();
        let mut outcomes = futures::stream::iter(discovery.files)
            .map(|path| async move { self.process_file(root_ref, &path).await })
            .buffer_unordered(self.max_concurrent_files)
            .take_until(Box::pin(cancel.cancelled()));

        while let Some(outcome) = outcomes.next().await {
            match outcome {
                FileOutcome::Indexed => report.indexed += 1,
                FileOutcome::Empty => report.skipped_empty += 1,
                FileOutcome::Failed => report.failed += 1,
            }
            processed += 1;
            progress.report(IndexProgressEvent::Processing {
                root: root_display.clone(),
                processed,
                total,
                indexed: report.indexed,
            });
        }

        report.cancelled = cancel.is_cancelled() && processed < total;
        info!(
            root = %root_display,
            indexed = report.indexed,
            skipped_empty = report.skipped_empty,
            unsupported = report.unsupported,
            failed = report.failed,
            traversal_errors = report.traversal_errors,
            cancelled = report.cancelled,
            "directory scan finished"
        );
        Ok(report)
    }

    async fn process_file(&self, root: &Path, path: &Path) -> FileOutcome {
        match self.index_file(root, path).await {
            Ok(Some(_)) => FileOutcome::Indexed,
            Ok(None) => FileOutcome::Empty,
            Err(IndexError::Store(e)) => {
                error!(path = %path.display(), error = %e, "store rejected document");
                FileOutcome::Failed
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping file");
                FileOutcome::Failed
            }
        }
    }

    /// Index one file found under `root`.
    ///
    /// Returns `Ok(None)` when the file has no extractable text or an
    /// unsupported extension.
    pub async fn index_file(
        &self,
        root: &Path,
        path: &Path,
    ) -> Result<Option<Document>, IndexError> {
        let Some(format) = DocumentFormat::from_path(path) else {
            return Ok(None);
        };

        let metadata = tokio::fs::metadata(path).await?;
        let bytes = tokio::fs::read(path).await?;
        let modified_at = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        let text = extract_off_thread(bytes, format).await;
        let locator = path.to_string_lossy().into_owned();
        let filename = relative_filename(root, path, &locator);

        self.enrich_and_store(&text, filename, locator, metadata.len(), modified_at)
            .await
    }

    /// Index an uploaded buffer whose bytes already live at `locator`.
    ///
    /// The format is taken from `filename`'s extension and `modifiedAt`
    /// is the current time. Returns `Ok(None)` for unsupported or empty
    /// input.
    pub async fn index_buffer(
        &self,
        bytes: &[u8],
        filename: &str,
        locator: &str,
        size: u64,
    ) -> Result<Option<Document>, IndexError> {
        let Some(format) = DocumentFormat::from_filename(filename) else {
            debug!(file = filename, "unsupported upload");
            return Ok(None);
        };

        let text = extract_off_thread(bytes.to_vec(), format).await;
        self.enrich_and_store(&text, filename.to_string(), locator.to_string(), size, Utc::now())
            .await
    }

    async fn enrich_and_store(
        &self,
        text: &str,
        filename: String,
        locator: String,
        size: u64,
        modified_at: DateTime<Utc>,
    ) -> Result<Option<Document>, IndexError> {
        if text.trim().is_empty() {
            debug!(file = %filename, "no extractable text, skipping");
            return Ok(None);
        }

        let enrichment = self.enricher.enrich(text, &filename).await?;
        let preview_chars = self.enricher.windows().preview_chars;

        let mut doc = Document {
            id: identify(&locator),
            filename,
            source_locator: locator,
            content_preview: truncate_chars(text, preview_chars).to_string(),
            embedding: enrichment.embedding,
            category: None,
            project: None,
            team: None,
            tags: BTreeSet::new(),
            size,
            modified_at,
            created_at: Utc::now(),
        };
        doc.apply_classification(&enrichment.classification);

        self.store.upsert(&doc).await?;
        debug!(file = %doc.filename, id = %doc.id, "indexed");
        Ok(Some(doc))
    }
}

/// Run extraction on the blocking pool. A panicking parser counts as no text.
async fn extract_off_thread(bytes: Vec<u8>, format: DocumentFormat) -> String {
    match tokio::task::spawn_blocking(move || extract_text(&bytes, format)).await {
        Ok(text) => text,
        Err(e) => {
            warn!(?format, error = %e, "extractor panicked, treating as empty");
            String::new()
        }
    }
}
