//! Classification providers.
//!
//! Each provider sends [`build_prompt`] to a language model and hands the
//! text it gets back to the core's strict
//! [`parse_classification`](semdex_core::classify::parse_classification).
//! The pipeline downgrades any error from here to "no labels".

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use semdex_core::classify::{parse_classification, Classifier, NoopClassifier};
use semdex_core::error::ClassifyError;
use semdex_core::models::Classification;
use semdex_core::pipeline::truncate_chars;

use crate::config::ClassificationConfig;
use crate::retry::{send_json_with_retry, CallError};

/// Characters of the excerpt quoted in the prompt.
pub const PROMPT_CONTENT_CHARS: usize = 2000;

const OPENAI_DEFAULT_URL: &str = "https://api.openai.com";
const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

impl From<CallError> for ClassifyError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Network(msg) => ClassifyError::Request(msg),
            CallError::Api { status, body } => ClassifyError::Api { status, body },
            CallError::Decode(msg) => ClassifyError::InvalidResponse(msg),
        }
    }
}

/// Prompt asking for `{category, project, team, tags}` as JSON.
pub fn build_prompt(excerpt: &str, filename: &str) -> String {
    format!(
        r#"Analyze this document and provide:
1. Main topic/category
2. Project name (if mentioned)
3. Team (marketing, sales, product, etc.)
4. 3-5 relevant tags

Document: {filename}
Content: {content}

Respond in JSON format:
{{
  "category": "string",
  "project": "string or null",
  "team": "string",
  "tags": ["tag1", "tag2", "tag3"]
}}"#,
        filename = filename,
        content = truncate_chars(excerpt, PROMPT_CONTENT_CHARS),
    )
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

fn required_model(config: &ClassificationConfig, provider: &str) -> Result<String> {
    config
        .model
        .clone()
        .ok_or_else(|| anyhow::anyhow!("classification.model required for {} provider", provider))
}

// ============ OpenAI ============

/// Classifier using OpenAI chat completions in JSON mode.
pub struct OpenAIClassifier {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
    max_retries: u32,
}

impl OpenAIClassifier {
    pub fn new(config: &ClassificationConfig) -> Result<Self> {
        let model = required_model(config, "OpenAI")?;
        let api_key = match std::env::var("OPENAI_API_KEY") {
            Ok(key) => key,
            Err(_) => bail!("OPENAI_API_KEY environment variable not set"),
        };
        let base = config.url.as_deref().unwrap_or(OPENAI_DEFAULT_URL);

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            api_key,
            endpoint: format!("{}/v1/chat/completions", base.trim_end_matches('/')),
            model,
            max_retries: config.max_retries,
        })
    }
}

fn openai_message_text(json: &serde_json::Value) -> Result<&str, ClassifyError> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .ok_or_else(|| {
            ClassifyError::InvalidResponse("missing choices[0].message.content".to_string())
        })
}

#[async_trait]
impl Classifier for OpenAIClassifier {
    async fn classify(
        &self,
        excerpt: &str,
        filename: &str,
    ) -> Result<Classification, ClassifyError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": build_prompt(excerpt, filename)}],
            "response_format": {"type": "json_object"},
        });
        let json = send_json_with_retry("openai classify", self.max_retries, || {
            self.client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
        })
        .await?;

        parse_classification(openai_message_text(&json)?)
    }
}

// ============ Ollama ============

/// Classifier using Ollama `/api/generate` with `format: "json"`.
pub struct OllamaClassifier {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    max_retries: u32,
}

impl OllamaClassifier {
    pub fn new(config: &ClassificationConfig) -> Result<Self> {
        let model = required_model(config, "Ollama")?;
        let base = config.url.as_deref().unwrap_or(OLLAMA_DEFAULT_URL);

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            endpoint: format!("{}/api/generate", base.trim_end_matches('/')),
            model,
            max_retries: config.max_retries,
        })
    }
}

fn ollama_response_text(json: &serde_json::Value) -> Result<&str, ClassifyError> {
    json.get("response")
        .and_then(|r| r.as_str())
        .ok_or_else(|| ClassifyError::InvalidResponse("missing response field".to_string()))
}

#[async_trait]
impl Classifier for OllamaClassifier {
    async fn classify(
        &self,
        excerpt: &str,
        filename: &str,
    ) -> Result<Classification, ClassifyError> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": build_prompt(excerpt, filename),
            "format": "json",
            "stream": false,
        });
        let json = send_json_with_retry("ollama classify", self.max_retries, || {
            self.client.post(&self.endpoint).json(&body)
        })
        .await?;

        parse_classification(ollama_response_text(&json)?)
    }
}

/// Build the classifier selected by `config.provider`.
///
/// `disabled` maps to a classifier that always answers
/// [`Classification::Absent`].
pub fn create_classifier(config: &ClassificationConfig) -> Result<Arc<dyn Classifier>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(NoopClassifier)),
        "openai" => Ok(Arc::new(OpenAIClassifier::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaClassifier::new(config)?)),
        other => bail!("Unknown classification provider: {}", other),
    }
}
