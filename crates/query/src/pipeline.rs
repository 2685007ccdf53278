//! Query pipeline
//!
//! Drives one question through intent → embed → retrieve → assemble →
//! generate → citations.

use crate::answer::{build_fallback, generate};
use crate::citations::{resolve, Citation};
use crate::context::assemble;
use crate::intent::{classify, expanded_query, QueryIntent};
use crate::retrieval::retrieve_hydrated;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};
use verdant_common::config::{ContactConfig, EmbeddingConfig, RagConfig};
use verdant_common::db::{ChunkStore, DocumentStore};
use verdant_common::errors::{AppError, Result};
use verdant_common::llm::{embed_all, CompletionClient, EmbeddingClient};
use verdant_common::storage::ObjectStorage;
use verdant_common::{metrics, AppConfig};

/// Outcome of one answered question
#[derive(Debug, Clone)]
pub struct AskReport {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub intent: QueryIntent,
}

/// Query pipeline over the collaborator seams
pub struct QueryPipeline {
    documents: Arc<dyn DocumentStore>,
    chunks: Arc<dyn ChunkStore>,
    storage: Arc<dyn ObjectStorage>,
    embeddings: Arc<dyn EmbeddingClient>,
    completion: Arc<dyn CompletionClient>,
    rag: RagConfig,
    embedding: EmbeddingConfig,
    contact: ContactConfig,
    signed_url_ttl_secs: u64,
}

impl QueryPipeline {
    pub fn new(
        config: &AppConfig,
        documents: Arc<dyn DocumentStore>,
        chunks: Arc<dyn ChunkStore>,
        storage: Arc<dyn ObjectStorage>,
        embeddings: Arc<dyn EmbeddingClient>,
        completion: Arc<dyn CompletionClient>,
    ) -> Self {
        Self {
            documents,
            chunks,
            storage,
            embeddings,
            completion,
            rag: config.rag.clone(),
            embedding: config.embedding.clone(),
            contact: config.contact.clone(),
            signed_url_ttl_secs: config.store.signed_url_ttl_secs,
        }
    }

    /// Retrieval width: the caller's hint is clamped to the default
    /// maximum, then widened for general-intent questions.
    fn effective_k(&self, requested: Option<usize>, intent: QueryIntent) -> usize {
        let base = requested
            .map(|k| k.min(self.rag.max_matches))
            .unwrap_or(self.rag.max_matches);
        if intent.is_general() {
            base.max(self.rag.general_k.min(self.rag.general_k_ceiling))
        } else {
            base
        }
    }

    /// Answer one question, returning the answer, citations, and intent.
    #[instrument(skip(self, question), fields(question_len = question.len()))]
    pub async fn ask(&self, question: &str, k_hint: Option<usize>) -> Result<AskReport> {
        let started = Instant::now();

        let intent = classify(question);
        let embed_text = if intent.is_general() {
            expanded_query(question)
        } else {
            question.to_string()
        };

        let query_vec = embed_all(&*self.embeddings, &[embed_text], &self.embedding)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::EmbedService {
                message: "empty embedding response".into(),
            })?;

        let k = self.effective_k(k_hint, intent);
        let hits = retrieve_hydrated(&*self.chunks, &*self.documents, &query_vec, k).await?;

        let assembly = assemble(hits, self.rag.max_chars_per_chunk, self.rag.max_context_tokens);

        // No usable context: answer deterministically, skip the model call
        if assembly.selected.is_empty() {
            metrics::record_question(started.elapsed().as_secs_f64(), intent.as_str(), true);
            info!(intent = intent.as_str(), "no context selected, fallback answer");
            return Ok(AskReport {
                answer: build_fallback(question, &self.contact),
                citations: Vec::new(),
                intent,
            });
        }

        let context = assembly.context();
        let (answer, fallback_used) =
            generate(&*self.completion, question, &context, intent, &self.contact).await?;

        let citations = resolve(&assembly.selected, &*self.storage, self.signed_url_ttl_secs).await;

        metrics::record_question(
            started.elapsed().as_secs_f64(),
            intent.as_str(),
            fallback_used,
        );
        info!(
            intent = intent.as_str(),
            selected = assembly.selected.len(),
            citations = citations.len(),
            fallback = fallback_used,
            "question answered"
        );

        Ok(AskReport {
            answer,
            citations,
            intent,
        })
    }
}
