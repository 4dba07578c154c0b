//! Configuration loading for litexpand.
//! Reads litexpand.toml from the current directory or the path in LITEXPAND_CONFIG.
//! Every field has a default, so a missing file means "arXiv only, OpenAI gpt-4o".

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use litexpand_ingestion::chunker::ChunkerConfig;
use litexpand_ingestion::SourceCredentials;
use litexpand_llm::RetryPolicy;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const CONFIG_ENV: &str = "LITEXPAND_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "litexpand.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "bool_true")]
    pub stream: bool,
}

fn default_llm_base_url() -> String { "https://api.openai.com".to_string() }
fn default_llm_model()    -> String { "gpt-4o".to_string() }
fn default_max_retries()  -> u32    { 5 }
fn bool_true()            -> bool   { true }

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            api_key: None,
            temperature: None,
            max_tokens: None,
            max_retries: default_max_retries(),
            stream: bool_true(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_chunk_words")]
    pub chunk_words: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap_words: usize,
}

fn default_data_dir()      -> PathBuf { PathBuf::from("./data") }
fn default_top_k()         -> usize   { 3 }
fn default_chunk_words()   -> usize   { 200 }
fn default_chunk_overlap() -> usize   { 40 }

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            top_k: default_top_k(),
            chunk_words: default_chunk_words(),
            chunk_overlap_words: default_chunk_overlap(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
    pub semantic_scholar_api_key: Option<String>,
    pub ieee_api_key: Option<String>,
    pub acm_api_key: Option<String>,
    pub pubmed_email: Option<String>,
    pub ncbi_api_key: Option<String>,
}

fn default_http_timeout() -> u64 { 30 }

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            http_timeout_secs: default_http_timeout(),
            semantic_scholar_api_key: None,
            ieee_api_key: None,
            acm_api_key: None,
            pubmed_email: None,
            ncbi_api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_review_path")]
    pub review_path: PathBuf,
    #[serde(default = "default_transcript_path")]
    pub transcript_path: PathBuf,
}

fn default_review_path()     -> PathBuf { PathBuf::from("literature_review.txt") }
fn default_transcript_path() -> PathBuf { PathBuf::from("messages.txt") }

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            review_path: default_review_path(),
            transcript_path: default_transcript_path(),
        }
    }
}


impl Config {
    /// Load configuration from litexpand.toml.
    /// Checks LITEXPAND_CONFIG env var first, then current directory.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var(CONFIG_ENV)
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Path::new(&path))
    }

    /// Load from an explicit path, then fill credentials from the environment.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse `path`; a missing file yields the defaults.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Environment variables fill credentials the file leaves unset or blank.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let acq = &mut self.acquisition;
        fill(&mut self.llm.api_key, lookup("OPENAI_API_KEY"));
        fill(&mut acq.semantic_scholar_api_key, lookup("SEMANTIC_SCHOLAR_API_KEY"));
        fill(&mut acq.ieee_api_key, lookup("IEEE_API_KEY"));
        fill(&mut acq.acm_api_key, lookup("ACM_API_KEY"));
        fill(&mut acq.pubmed_email, lookup("PUBMED_EMAIL"));
        fill(&mut acq.ncbi_api_key, lookup("NCBI_API_KEY"));
    }

    pub fn credentials(&self) -> SourceCredentials {
        let acq = &self.acquisition;
        SourceCredentials {
            semantic_scholar_api_key: acq.semantic_scholar_api_key.clone(),
            ieee_api_key: acq.ieee_api_key.clone(),
            acm_api_key: acq.acm_api_key.clone(),
            pubmed_email: acq.pubmed_email.clone(),
            ncbi_api_key: acq.ncbi_api_key.clone(),
        }
    }

    pub fn chunker(&self) -> ChunkerConfig {
        ChunkerConfig {
            window_words: self.retrieval.chunk_words,
            overlap_words: self.retrieval.chunk_overlap_words,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default().with_max_attempts(self.llm.max_retries)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.acquisition.http_timeout_secs)
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

fn fill(slot: &mut Option<String>, from_env: Option<String>) {
    if is_blank(slot) && !is_blank(&from_env) {
        *slot = from_env;
    }
}
