//! Embedding service client
//!
//! Inputs are clamped to a character ceiling when their token estimate is
//! too large, then submitted in fixed-size batches. Batches run
//! sequentially; a failed batch fails the whole call and prior results are
//! discarded.

use crate::config::EmbeddingConfig;
use crate::errors::{AppError, Result};
use crate::{approx_tokens, truncate_to_char_boundary};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Marker appended to inputs clamped before embedding
pub const EMBED_TRUNCATION_MARKER: &str = " …[truncated-for-embed]";

/// Trait for embedding generation
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Generate embeddings for a batch of texts, index-aligned with the input
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;
}

/// OpenAI-compatible embedding client
pub struct OpenAiEmbeddings {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dimension: usize,
    base_url: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

impl OpenAiEmbeddings {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let dimension = match config.model.as_str() {
            "text-embedding-ada-002" => 1536,
            "text-embedding-3-small" => 1536,
            "text-embedding-3-large" => 3072,
            _ => 1536,
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("failed to build embedding client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            dimension,
            base_url: config.api_base.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddings {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                input: texts,
                model: &self.model,
            })
            .send()
            .await
            .map_err(|e| AppError::EmbedService {
                message: format!("request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::EmbedService {
                message: format!("API error {}: {}", status, body),
            });
        }

        let result: EmbeddingResponse =
            response.json().await.map_err(|e| AppError::EmbedService {
                message: format!("failed to parse response: {}", e),
            })?;

        // Response items are index-aligned with the request input
        Ok(result.data.into_iter().map(|d| d.embedding).collect())
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Clamp a single input so its token estimate stays under the ceiling
fn clamp_for_embed(text: &str, max_tokens: usize, max_chars: usize) -> String {
    if approx_tokens(text) <= max_tokens || text.len() <= max_chars {
        return text.to_string();
    }
    let mut clamped = truncate_to_char_boundary(text, max_chars).to_string();
    clamped.push_str(EMBED_TRUNCATION_MARKER);
    clamped
}

/// Embed every text, preserving order.
///
/// All-or-nothing: any batch failure discards results from prior batches.
pub async fn embed_all(
    client: &dyn EmbeddingClient,
    texts: &[String],
    config: &EmbeddingConfig,
) -> Result<Vec<Vec<f32>>> {
    let safe_inputs: Vec<String> = texts
        .iter()
        .map(|t| clamp_for_embed(t, config.max_tokens, config.max_chars))
        .collect();

    let mut out: Vec<Vec<f32>> = Vec::with_capacity(safe_inputs.len());
    for (batch_idx, batch) in safe_inputs.chunks(config.batch_size.max(1)).enumerate() {
        debug!(batch = batch_idx, count = batch.len(), model = client.model_name(), "embedding batch");
        let vectors = client.embed_batch(batch).await?;
        out.extend(vectors);
    }

    if out.len() != texts.len() {
        return Err(AppError::EmbedCountMismatch {
            expected: texts.len(),
            got: out.len(),
        });
    }

    Ok(out)
}

/// Deterministic mock embedder for tests. Vectors are seeded from the text
/// content, so equal texts embed identically and similar runs reproduce.
pub struct MockEmbeddings {
    dimension: usize,
    requests: std::sync::Mutex<Vec<Vec<String>>>,
    fail: std::sync::atomic::AtomicBool,
}

impl MockEmbeddings {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            requests: std::sync::Mutex::new(Vec::new()),
            fail: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Make subsequent embed calls fail
    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    /// Every batch submitted so far, in submission order
    pub fn requests(&self) -> Vec<Vec<String>> {
        self.requests.lock().unwrap().clone()
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        use rand::{Rng, SeedableRng};
        let seed = text
            .bytes()
            .fold(0xcbf2_9ce4_8422_2325u64, |h, b| {
                (h ^ b as u64).wrapping_mul(0x100_0000_01b3)
            });
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        (0..self.dimension).map(|_| rng.gen_range(-1.0f32..1.0f32)).collect()
    }
}

#[async_trait]
impl EmbeddingClient for MockEmbeddings {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(AppError::EmbedService {
                message: "mock failure".into(),
            });
        }
        self.requests.lock().unwrap().push(texts.to_vec());
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn model_name(&self) -> &str {
        "mock-embedding"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
