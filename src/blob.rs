//! Storage for uploaded file bytes.
//!
//! An upload is written here first; the returned URL becomes the
//! document's source locator.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;

/// Where a stored blob ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub url: String,
    pub size: u64,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persist `bytes` under a name derived from `filename`.
    async fn store(&self, bytes: &[u8], filename: &str) -> Result<StoredBlob>;
}

/// Blob store backed by a local directory. URLs are `file://` URLs.
pub struct LocalBlobStore {
    dir: PathBuf,
}

impl LocalBlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Keep only the final path component and replace anything outside a
/// conservative character set.
fn sanitize_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn store(&self, bytes: &[u8], filename: &str) -> Result<StoredBlob> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create blob directory: {}", self.dir.display()))?;

        let name = format!("{}-{}", uuid::Uuid::new_v4(), sanitize_filename(filename));
        let path = self.dir.join(name);
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write blob: {}", path.display()))?;

        let absolute = tokio::fs::canonicalize(&path).await?;
        Ok(StoredBlob {
            url: format!("file://{}", absolute.display()),
            size: bytes.len() as u64,
        })
    }
}
