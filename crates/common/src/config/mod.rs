//! Configuration management for the Verdant service
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/<env>.toml, config/local.toml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Object storage + relational store (Supabase-style) configuration
    pub store: StoreConfig,

    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Completion service configuration
    #[serde(default)]
    pub completion: CompletionConfig,

    /// External PDF parse-job service configuration
    #[serde(default)]
    pub parsing: ParsingConfig,

    /// Retrieval and context budgets
    #[serde(default)]
    pub rag: RagConfig,

    /// Fallback-answer contact details
    #[serde(default)]
    pub contact: ContactConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds. Must cover the PDF parse-job wait,
    /// which can run for minutes.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// One backing service provides binary storage, signed URLs, and the
/// documents/chunks tables (PostgREST interface).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Base URL of the store (e.g. https://xyz.supabase.co)
    pub url: String,

    /// Service-role key; server-only, grants storage access and chunk writes
    pub service_key: String,

    /// Storage bucket holding source documents
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// TTL for citation access links
    #[serde(default = "default_signed_url_ttl")]
    pub signed_url_ttl_secs: u64,

    /// Short TTL for the registration hashing fetch
    #[serde(default = "default_hash_url_ttl")]
    pub hash_url_ttl_secs: u64,

    /// Short TTL for parser fetches (DOCX/XLSX/CSV)
    #[serde(default = "default_parse_url_ttl")]
    pub parse_url_ttl_secs: u64,

    /// Rows per chunk insert batch
    #[serde(default = "default_insert_batch")]
    pub insert_batch: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// API base URL
    #[serde(default = "default_openai_base")]
    pub api_base: String,

    /// API key for the embedding service
    #[serde(default)]
    pub api_key: String,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Per-input token ceiling before clamping
    #[serde(default = "default_embed_max_tokens")]
    pub max_tokens: usize,

    /// Per-input character clamp applied when the token ceiling is exceeded
    #[serde(default = "default_embed_max_chars")]
    pub max_chars: usize,

    /// Inputs per embedding request
    #[serde(default = "default_embed_batch_size")]
    pub batch_size: usize,

    /// Request timeout in seconds
    #[serde(default = "default_client_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompletionConfig {
    /// API base URL
    #[serde(default = "default_openai_base")]
    pub api_base: String,

    /// API key for the completion service
    #[serde(default)]
    pub api_key: String,

    /// Model to use
    #[serde(default = "default_completion_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds
    #[serde(default = "default_client_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ParsingConfig {
    /// Parse-job API base URL
    #[serde(default = "default_parsing_base")]
    pub api_base: String,

    /// API key for the parse-job service
    #[serde(default)]
    pub api_key: String,

    /// Poll interval while a job is pending
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Hard wall-clock budget for one parse job
    #[serde(default = "default_parse_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RagConfig {
    /// Default and maximum retrieval width for specific questions
    #[serde(default = "default_max_matches")]
    pub max_matches: usize,

    /// Retrieval width floor for general-intent questions
    #[serde(default = "default_general_k")]
    pub general_k: usize,

    /// Absolute ceiling on retrieval width
    #[serde(default = "default_general_k_ceiling")]
    pub general_k_ceiling: usize,

    /// Per-chunk character cap at context-assembly time
    #[serde(default = "default_max_chars_per_chunk")]
    pub max_chars_per_chunk: usize,

    /// Total context token budget
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,

    /// Chunker token budget per chunk
    #[serde(default = "default_chunk_max_tokens")]
    pub chunk_max_tokens: usize,

    /// Chunker overlap carried between consecutive chunks
    #[serde(default = "default_chunk_overlap_tokens")]
    pub chunk_overlap_tokens: usize,

    /// Hard character ceiling applied to stored chunks
    #[serde(default = "default_hard_max_chars")]
    pub hard_max_chars_per_chunk: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContactConfig {
    /// Email surfaced in fallback answers
    #[serde(default = "default_support_email")]
    pub support_email: String,

    /// Scheduling link surfaced in fallback answers
    #[serde(default = "default_scheduling_url")]
    pub scheduling_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 180 }
fn default_bucket() -> String { "rag-source".to_string() }
fn default_signed_url_ttl() -> u64 { 600 }
fn default_hash_url_ttl() -> u64 { 120 }
fn default_parse_url_ttl() -> u64 { 180 }
fn default_insert_batch() -> usize { 200 }
fn default_openai_base() -> String { "https://api.openai.com/v1".to_string() }
fn default_embedding_model() -> String { "text-embedding-3-small".to_string() }
fn default_embed_max_tokens() -> usize { 7000 }
fn default_embed_max_chars() -> usize { 28_000 }
fn default_embed_batch_size() -> usize { 64 }
fn default_client_timeout() -> u64 { 30 }
fn default_completion_model() -> String { "gpt-4o-mini".to_string() }
fn default_temperature() -> f32 { 0.2 }
fn default_parsing_base() -> String { "https://api.cloud.llamaindex.ai/api/v1".to_string() }
fn default_poll_interval_ms() -> u64 { 1500 }
fn default_parse_timeout_ms() -> u64 { 120_000 }
fn default_max_matches() -> usize { 6 }
fn default_general_k() -> usize { 10 }
fn default_general_k_ceiling() -> usize { 20 }
fn default_max_chars_per_chunk() -> usize { 1800 }
fn default_max_context_tokens() -> usize { 4500 }
fn default_chunk_max_tokens() -> usize { 900 }
fn default_chunk_overlap_tokens() -> usize { 80 }
fn default_hard_max_chars() -> usize { 1800 }
fn default_support_email() -> String { "hello@verdant.example".to_string() }
fn default_scheduling_url() -> String { "https://cal.com/verdant-briefing".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "verdant".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:54321".to_string(),
            service_key: String::new(),
            bucket: default_bucket(),
            signed_url_ttl_secs: default_signed_url_ttl(),
            hash_url_ttl_secs: default_hash_url_ttl(),
            parse_url_ttl_secs: default_parse_url_ttl(),
            insert_batch: default_insert_batch(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_base: default_openai_base(),
            api_key: String::new(),
            model: default_embedding_model(),
            max_tokens: default_embed_max_tokens(),
            max_chars: default_embed_max_chars(),
            batch_size: default_embed_batch_size(),
            timeout_secs: default_client_timeout(),
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_base: default_openai_base(),
            api_key: String::new(),
            model: default_completion_model(),
            temperature: default_temperature(),
            timeout_secs: default_client_timeout(),
        }
    }
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            api_base: default_parsing_base(),
            api_key: String::new(),
            poll_interval_ms: default_poll_interval_ms(),
            timeout_ms: default_parse_timeout_ms(),
        }
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            max_matches: default_max_matches(),
            general_k: default_general_k(),
            general_k_ceiling: default_general_k_ceiling(),
            max_chars_per_chunk: default_max_chars_per_chunk(),
            max_context_tokens: default_max_context_tokens(),
            chunk_max_tokens: default_chunk_max_tokens(),
            chunk_overlap_tokens: default_chunk_overlap_tokens(),
            hard_max_chars_per_chunk: default_hard_max_chars(),
        }
    }
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            support_email: default_support_email(),
            scheduling_url: default_scheduling_url(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            embedding: EmbeddingConfig::default(),
            completion: CompletionConfig::default(),
            parsing: ParsingConfig::default(),
            rag: RagConfig::default(),
            contact: ContactConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__STORE__URL=https://xyz.supabase.co
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}
