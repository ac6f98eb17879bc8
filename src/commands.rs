//! CLI command implementations.
//!
//! Each `run_*` function loads what it needs from the config, performs one
//! operation through [`DocumentService`] or the [`Indexer`](crate::indexer::Indexer),
//! and prints the result to stdout.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

use semdex_core::pipeline::truncate_chars;

use crate::config::Config;
use crate::progress::ProgressMode;
use crate::service::{DocumentService, UploadFile};
use crate::{db, migrate};

/// Characters of preview shown per search hit.
const EXCERPT_CHARS: usize = 200;

pub async fn run_init(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::run_migrations(&pool).await?;
    pool.close().await;
    println!("Database initialized successfully.");
    Ok(())
}

/// Index `path` (or the configured root) in the foreground. Ctrl-C stops
/// the run and reports what was indexed so far.
pub async fn run_index(
    config: &Config,
    path: Option<PathBuf>,
    reindex: bool,
    progress: ProgressMode,
) -> Result<()> {
    let service = DocumentService::from_config(config).await?;
    let root = path.unwrap_or_else(|| service.default_root().clone());

    if reindex {
        let removed = service.delete_all().await?;
        println!("cleared {} documents", removed);
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping index run");
            on_interrupt.cancel();
        }
    });

    let reporter = progress.reporter();
    let report = service
        .indexer()
        .index_directory(&root, reporter.as_ref(), &cancel)
        .await
        .with_context(|| format!("Failed to index {}", root.display()))?;

    println!("index {}", root.display());
    println!("  indexed: {}", report.indexed);
    println!("  skipped (empty): {}", report.skipped_empty);
    println!("  skipped (unsupported): {}", report.unsupported);
    println!("  failed: {}", report.failed);
    println!("  unreadable entries: {}", report.traversal_errors);
    println!("{}", if report.cancelled { "cancelled" } else { "ok" });
    Ok(())
}

pub async fn run_upload(config: &Config, files: &[PathBuf]) -> Result<()> {
    let service = DocumentService::from_config(config).await?;

    let mut uploads = Vec::with_capacity(files.len());
    for path in files {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        uploads.push(UploadFile {
            filename: display_name(path),
            bytes,
        });
    }

    let report = service.upload(uploads).await;
    println!("{}", report.message);
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub async fn run_search(config: &Config, query: &str, limit: Option<usize>) -> Result<()> {
    let service = DocumentService::from_config(config).await?;
    let response = service.search(query, limit).await?;

    if response.results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in response.results.iter().enumerate() {
        println!("{}. [{:.2}] {}", i + 1, hit.similarity, hit.filename);
        println!("    modified: {}", hit.modified_at.format("%Y-%m-%d"));
        let labels: Vec<&str> = [&hit.category, &hit.team, &hit.project]
            .into_iter()
            .filter_map(|v| v.as_deref())
            .collect();
        if !labels.is_empty() {
            println!("    labels: {}", labels.join(" / "));
        }
        if !hit.tags.is_empty() {
            println!("    tags: {}", hit.tags.join(", "));
        }
        println!(
            "    excerpt: \"{}\"",
            truncate_chars(&hit.preview, EXCERPT_CHARS).replace('\n', " ").trim()
        );
        println!("    id: {}", hit.id);
        println!();
    }
    Ok(())
}

pub async fn run_stats(config: &Config) -> Result<()> {
    let service = DocumentService::from_config(config).await?;
    let stats = service.stats().await?;

    println!("documents:  {}", stats.total_documents);
    println!("categories: {}", stats.categories.join(", "));
    println!("teams:      {}", stats.teams.join(", "));
    println!("projects:   {}", stats.projects.join(", "));
    Ok(())
}

pub async fn run_list(config: &Config) -> Result<()> {
    let service = DocumentService::from_config(config).await?;
    let docs = service.list_documents().await?;

    if docs.is_empty() {
        println!("No documents.");
        return Ok(());
    }
    for doc in docs {
        println!(
            "{}  {}  {}  {}",
            doc.modified_at.format("%Y-%m-%d"),
            doc.filename,
            doc.category.as_deref().unwrap_or("-"),
            doc.id
        );
    }
    Ok(())
}

pub async fn run_delete(config: &Config, id: &str) -> Result<()> {
    let service = DocumentService::from_config(config).await?;
    if service.delete_one(id).await? {
        println!("Document deleted successfully.");
    } else {
        anyhow::bail!("no document with id {}", id);
    }
    Ok(())
}

pub async fn run_clear(config: &Config) -> Result<()> {
    let service = DocumentService::from_config(config).await?;
    let removed = service.delete_all().await?;
    println!("Deleted {} documents.", removed);
    Ok(())
}
