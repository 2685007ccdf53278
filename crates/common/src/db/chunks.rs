//! Chunk store with similarity search

use super::embedding_literal;
use crate::errors::{AppError, Result, StoreOp};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Insert payload for one chunk row
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub document_id: Uuid,
    pub content: String,
    pub page_or_sheet: Option<String>,
    pub section_path: Option<String>,
    pub token_count: i32,
    pub embedding: Vec<f32>,
}

/// Wire form of a chunk row; the embedding travels as a pgvector literal
#[derive(Serialize)]
struct ChunkRow<'a> {
    document_id: Uuid,
    content: &'a str,
    page_or_sheet: Option<&'a str>,
    section_path: Option<&'a str>,
    token_count: i32,
    embedding: String,
}

/// One similarity hit from `match_chunks`
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkMatch {
    pub document_id: Uuid,
    pub content: String,
    pub page_or_sheet: Option<String>,
    pub section_path: Option<String>,
    pub score: f64,
}

/// Trait for the chunks table
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Remove every chunk owned by `document_id`
    async fn delete_for_document(&self, document_id: Uuid) -> Result<()>;

    /// Insert one batch of rows (caller slices into batches)
    async fn insert_batch(&self, chunks: &[NewChunk]) -> Result<()>;

    /// Nearest-neighbor search, descending score, at most `k` rows
    async fn match_chunks(&self, query_embedding: &[f32], k: usize) -> Result<Vec<ChunkMatch>>;

    /// Chunk count for one document
    async fn count_for_document(&self, document_id: Uuid) -> Result<usize>;
}

/// PostgREST-backed chunk store; similarity search goes through the
/// `match_chunks` RPC
pub struct RestChunkStore {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
}

#[derive(Serialize)]
struct MatchRequest {
    query_embedding: String,
    match_count: usize,
}

impl RestChunkStore {
    pub fn new(base_url: &str, service_key: &str, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("failed to build chunk store client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
        })
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/chunks", self.base_url)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
    }
}

#[async_trait]
impl ChunkStore for RestChunkStore {
    async fn delete_for_document(&self, document_id: Uuid) -> Result<()> {
        let response = self
            .authed(
                self.client
                    .delete(self.table_url())
                    .query(&[("document_id", format!("eq.{}", document_id))]),
            )
            .send()
            .await
            .map_err(|e| AppError::Store {
                op: StoreOp::Delete,
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(AppError::Store {
                op: StoreOp::Delete,
                message: format!("status {}", response.status()),
            });
        }
        Ok(())
    }

    async fn insert_batch(&self, chunks: &[NewChunk]) -> Result<()> {
        let rows: Vec<ChunkRow<'_>> = chunks
            .iter()
            .map(|c| ChunkRow {
                document_id: c.document_id,
                content: &c.content,
                page_or_sheet: c.page_or_sheet.as_deref(),
                section_path: c.section_path.as_deref(),
                token_count: c.token_count,
                embedding: embedding_literal(&c.embedding),
            })
            .collect();

        let response = self
            .authed(
                self.client
                    .post(self.table_url())
                    .header("Prefer", "return=minimal")
                    .json(&rows),
            )
            .send()
            .await
            .map_err(|e| AppError::Store {
                op: StoreOp::Insert,
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(AppError::Store {
                op: StoreOp::Insert,
                message: format!("status {}", response.status()),
            });
        }
        Ok(())
    }

    async fn match_chunks(&self, query_embedding: &[f32], k: usize) -> Result<Vec<ChunkMatch>> {
        let url = format!("{}/rest/v1/rpc/match_chunks", self.base_url);
        let response = self
            .authed(self.client.post(&url).json(&MatchRequest {
                query_embedding: embedding_literal(query_embedding),
                match_count: k,
            }))
            .send()
            .await
            .map_err(|e| AppError::Store {
                op: StoreOp::MatchChunks,
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(AppError::Store {
                op: StoreOp::MatchChunks,
                message: format!("status {}", response.status()),
            });
        }

        response.json().await.map_err(|e| AppError::Store {
            op: StoreOp::MatchChunks,
            message: e.to_string(),
        })
    }

    async fn count_for_document(&self, document_id: Uuid) -> Result<usize> {
        #[derive(Deserialize)]
        struct IdRow {
            #[allow(dead_code)]
            document_id: Uuid,
        }

        let response = self
            .authed(self.client.get(self.table_url()).query(&[
                ("document_id", format!("eq.{}", document_id)),
                ("select", "document_id".to_string()),
            ]))
            .send()
            .await
            .map_err(|e| AppError::Store {
                op: StoreOp::Select,
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(AppError::Store {
                op: StoreOp::Select,
                message: format!("status {}", response.status()),
            });
        }

        let rows: Vec<IdRow> = response.json().await.map_err(|e| AppError::Store {
            op: StoreOp::Select,
            message: e.to_string(),
        })?;
        Ok(rows.len())
    }
}

/// Cosine similarity between two vectors
fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut na = 0.0f64;
    let mut nb = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += (*x as f64) * (*y as f64);
        na += (*x as f64) * (*x as f64);
        nb += (*y as f64) * (*y as f64);
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

/// In-memory chunk store for tests; similarity search is brute-force cosine
#[derive(Default)]
pub struct MockChunkStore {
    rows: std::sync::Mutex<Vec<NewChunk>>,
    fail_insert: std::sync::atomic::AtomicBool,
    last_match_count: std::sync::atomic::AtomicUsize,
}

impl MockChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent insert_batch calls fail
    pub fn fail_insert(&self, fail: bool) {
        self.fail_insert
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn all(&self) -> Vec<NewChunk> {
        self.rows.lock().unwrap().clone()
    }

    /// The `k` passed to the most recent match_chunks call
    pub fn last_match_count(&self) -> usize {
        self.last_match_count
            .load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl ChunkStore for MockChunkStore {
    async fn delete_for_document(&self, document_id: Uuid) -> Result<()> {
        self.rows
            .lock()
            .unwrap()
            .retain(|c| c.document_id != document_id);
        Ok(())
    }

    async fn insert_batch(&self, chunks: &[NewChunk]) -> Result<()> {
        if self.fail_insert.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(AppError::Store {
                op: StoreOp::Insert,
                message: "insert disabled".into(),
            });
        }
        self.rows.lock().unwrap().extend_from_slice(chunks);
        Ok(())
    }

    async fn match_chunks(&self, query_embedding: &[f32], k: usize) -> Result<Vec<ChunkMatch>> {
        self.last_match_count
            .store(k, std::sync::atomic::Ordering::SeqCst);
        let rows = self.rows.lock().unwrap();
        let mut scored: Vec<ChunkMatch> = rows
            .iter()
            .map(|c| ChunkMatch {
                document_id: c.document_id,
                content: c.content.clone(),
                page_or_sheet: c.page_or_sheet.clone(),
                section_path: c.section_path.clone(),
                score: cosine_similarity(query_embedding, &c.embedding),
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    async fn count_for_document(&self, document_id: Uuid) -> Result<usize> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.document_id == document_id)
            .count())
    }
}
