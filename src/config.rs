use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use semdex_core::pipeline::Windows;
use semdex_core::search::SearchParams;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub classification: ClassificationConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    pub server: ServerConfig,
    pub blobs: BlobsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexingConfig {
    /// Directory indexed when no path is given.
    pub root: PathBuf,
    /// Files processed concurrently during a directory run. No default.
    pub max_concurrent_files: usize,
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
    #[serde(default = "default_embed_window_chars")]
    pub embed_window_chars: usize,
    #[serde(default = "default_classify_window_chars")]
    pub classify_window_chars: usize,
}

fn default_preview_chars() -> usize {
    1000
}
fn default_embed_window_chars() -> usize {
    5000
}
fn default_classify_window_chars() -> usize {
    8000
}

impl IndexingConfig {
    pub fn windows(&self) -> Windows {
        Windows {
            preview_chars: self.preview_chars,
            embed_chars: self.embed_window_chars,
            classify_chars: self.classify_window_chars,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL override (OpenAI-compatible gateway or Ollama host).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_embed_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embed_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            max_retries: default_embed_max_retries(),
            timeout_secs: default_embed_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClassificationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_classify_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_classify_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            url: None,
            max_retries: default_classify_max_retries(),
            timeout_secs: default_classify_timeout_secs(),
        }
    }
}

impl ClassificationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_embed_max_retries() -> u32 {
    5
}
fn default_embed_timeout_secs() -> u64 {
    30
}
fn default_classify_max_retries() -> u32 {
    2
}
fn default_classify_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    #[serde(default = "default_overfetch_factor")]
    pub overfetch_factor: usize,
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            overfetch_factor: default_overfetch_factor(),
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

fn default_similarity_threshold() -> f32 {
    semdex_core::search::DEFAULT_SIMILARITY_THRESHOLD
}
fn default_overfetch_factor() -> usize {
    2
}
fn default_limit() -> usize {
    20
}
fn default_max_limit() -> usize {
    100
}

impl RetrievalConfig {
    pub fn search_params(&self) -> SearchParams {
        SearchParams {
            similarity_threshold: self.similarity_threshold,
            overfetch_factor: self.overfetch_factor,
        }
    }

    /// Resolve a caller-supplied limit: missing means default, anything
    /// above `max_limit` is clamped.
    pub fn effective_limit(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.default_limit).min(self.max_limit)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BlobsConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub default: String,
    /// Per-target overrides, e.g. `semdex::indexer = "debug"`.
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

/// Parse and validate a config document.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Validate indexing
    let indexing = &config.indexing;
    if indexing.max_concurrent_files == 0 {
        anyhow::bail!("indexing.max_concurrent_files must be > 0");
    }
    if indexing.preview_chars == 0 || indexing.embed_window_chars == 0 {
        anyhow::bail!("indexing.preview_chars and indexing.embed_window_chars must be > 0");
    }
    if indexing.classify_window_chars == 0 {
        anyhow::bail!("indexing.classify_window_chars must be > 0");
    }

    // Validate retrieval
    let retrieval = &config.retrieval;
    if !(-1.0..=1.0).contains(&retrieval.similarity_threshold) {
        anyhow::bail!("retrieval.similarity_threshold must be in [-1.0, 1.0]");
    }
    if retrieval.overfetch_factor < 1 {
        anyhow::bail!("retrieval.overfetch_factor must be >= 1");
    }
    if retrieval.default_limit < 1 || retrieval.max_limit < 1 {
        anyhow::bail!("retrieval.default_limit and retrieval.max_limit must be >= 1");
    }
    if retrieval.default_limit > retrieval.max_limit {
        anyhow::bail!("retrieval.default_limit must not exceed retrieval.max_limit");
    }

    // Validate embedding
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    // Validate classification
    if config.classification.is_enabled() && config.classification.model.is_none() {
        anyhow::bail!(
            "classification.model must be specified when provider is '{}'",
            config.classification.provider
        );
    }

    match config.classification.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown classification provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    Ok(())
}
