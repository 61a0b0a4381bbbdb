use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub answer: AnswerConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Remote document feed: a single HTTP endpoint returning a JSON array
/// of raw post objects.
#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub feed_url: String,
    #[serde(default = "default_fetch_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_fetch_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_fetch_backoff_secs")]
    pub retry_backoff_secs: u64,
}

fn default_fetch_timeout_secs() -> u64 {
    60
}
fn default_fetch_attempts() -> u32 {
    3
}
fn default_fetch_backoff_secs() -> u64 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_embed_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_embed_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embed_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_embed_batch_size(),
            max_retries: default_embed_retries(),
            timeout_secs: default_embed_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "disabled".to_string()
}
fn default_embed_batch_size() -> usize {
    25
}
fn default_embed_retries() -> u32 {
    3
}
fn default_embed_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default = "default_upsert_concurrency")]
    pub upsert_concurrency: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            upsert_concurrency: default_upsert_concurrency(),
        }
    }
}

fn default_upsert_concurrency() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Candidate pool scanned before final top-k truncation. Kept wider
    /// than k so the similarity ranking can correct for index imprecision.
    #[serde(default = "default_candidate_pool")]
    pub candidate_pool: usize,
    #[serde(default = "default_k")]
    pub default_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            candidate_pool: default_candidate_pool(),
            default_k: default_k(),
        }
    }
}

fn default_candidate_pool() -> usize {
    100
}
fn default_k() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_model_id")]
    pub default_model_id: String,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_gemini_base_url")]
    pub gemini_base_url: String,
    #[serde(default = "default_qwen_base_url")]
    pub qwen_base_url: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            default_model_id: default_model_id(),
            timeout_secs: default_generation_timeout_secs(),
            openai_base_url: default_openai_base_url(),
            gemini_base_url: default_gemini_base_url(),
            qwen_base_url: default_qwen_base_url(),
        }
    }
}

fn default_model_id() -> String {
    "qwen-max".to_string()
}
fn default_generation_timeout_secs() -> u64 {
    20
}
fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}
fn default_qwen_base_url() -> String {
    "https://dashscope.aliyuncs.com/compatible-mode/v1".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnswerConfig {
    /// Maximum documents rendered into the grounding prompt, regardless
    /// of how many retrieval returned.
    #[serde(default = "default_context_docs")]
    pub context_docs: usize,
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            context_docs: default_context_docs(),
            excerpt_chars: default_excerpt_chars(),
        }
    }
}

fn default_context_docs() -> usize {
    10
}
fn default_excerpt_chars() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.source.feed_url.trim().is_empty() {
        anyhow::bail!("source.feed_url must not be empty");
    }
    if config.source.max_attempts == 0 {
        anyhow::bail!("source.max_attempts must be >= 1");
    }

    if config.embedding.is_enabled() {
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
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

    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }
    if config.sync.upsert_concurrency == 0 {
        anyhow::bail!("sync.upsert_concurrency must be >= 1");
    }
    if config.retrieval.candidate_pool == 0 {
        anyhow::bail!("retrieval.candidate_pool must be >= 1");
    }
    if config.retrieval.default_k == 0 {
        anyhow::bail!("retrieval.default_k must be >= 1");
    }
    if config.answer.context_docs == 0 {
        anyhow::bail!("answer.context_docs must be >= 1");
    }

    Ok(config)
}
