//! Ingestion pipeline
//!
//! Drives one document through parse → chunk → embed → index replacement,
//! maintaining the per-document status machine:
//! `pending → parsing → ready`, with `failed` as the terminal state for any
//! stage error after parsing begins.

use crate::chunker::{chunk_markdown, enforce_hard_cap};
use crate::parser::{self, pdf::ParseJobClient, DocumentFormat};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use verdant_common::config::{EmbeddingConfig, ParsingConfig, RagConfig, StoreConfig};
use verdant_common::db::{ChunkStore, Document, DocumentStatus, DocumentStore, NewChunk};
use verdant_common::errors::{AppError, Result};
use verdant_common::llm::{embed_all, EmbeddingClient};
use verdant_common::storage::ObjectStorage;
use verdant_common::{approx_tokens, metrics, AppConfig};

/// Outcome of one successful ingestion
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub document_id: Uuid,
    pub chunk_count: usize,
}

/// Ingestion pipeline over the collaborator seams
pub struct IngestionPipeline {
    documents: Arc<dyn DocumentStore>,
    chunks: Arc<dyn ChunkStore>,
    storage: Arc<dyn ObjectStorage>,
    embeddings: Arc<dyn EmbeddingClient>,
    parse_jobs: Arc<dyn ParseJobClient>,
    rag: RagConfig,
    embedding: EmbeddingConfig,
    parsing: ParsingConfig,
    store: StoreConfig,
}

impl IngestionPipeline {
    pub fn new(
        config: &AppConfig,
        documents: Arc<dyn DocumentStore>,
        chunks: Arc<dyn ChunkStore>,
        storage: Arc<dyn ObjectStorage>,
        embeddings: Arc<dyn EmbeddingClient>,
        parse_jobs: Arc<dyn ParseJobClient>,
    ) -> Self {
        Self {
            documents,
            chunks,
            storage,
            embeddings,
            parse_jobs,
            rag: config.rag.clone(),
            embedding: config.embedding.clone(),
            parsing: config.parsing.clone(),
            store: config.store.clone(),
        }
    }

    /// Ingest one registered document.
    ///
    /// Concurrent calls for the same document are not coordinated here;
    /// callers must serialize per document identity.
    #[instrument(skip(self), fields(document_id = %document_id))]
    pub async fn ingest(&self, document_id: Uuid) -> Result<IngestReport> {
        let started = Instant::now();

        let doc = self
            .documents
            .find_by_id(document_id)
            .await?
            .ok_or_else(|| AppError::DocNotFound {
                id: document_id.to_string(),
            })?;

        let object_key = doc
            .object_key
            .clone()
            .ok_or_else(|| AppError::MissingObjectKey {
                id: document_id.to_string(),
            })?;

        self.documents
            .set_status(doc.id, DocumentStatus::Parsing)
            .await?;

        let chunk_count = match self.run_stages(&doc, &object_key).await {
            Ok(count) => count,
            Err(e) => {
                warn!(stage = e.stage(), error = %e, "ingestion failed");
                // Best effort; the stage error is what surfaces
                if let Err(update_err) = self
                    .documents
                    .set_status(doc.id, DocumentStatus::Failed)
                    .await
                {
                    warn!(error = %update_err, "could not mark document failed");
                }
                return Err(e);
            }
        };

        metrics::record_ingestion(started.elapsed().as_secs_f64(), chunk_count, &doc.file_type);
        info!(chunks = chunk_count, "index complete");

        Ok(IngestReport {
            document_id: doc.id,
            chunk_count,
        })
    }

    async fn run_stages(&self, doc: &Document, object_key: &str) -> Result<usize> {
        let bytes = self.storage.download(object_key).await?;
        if bytes.is_empty() {
            return Err(AppError::EmptyBytes);
        }

        let units = self.parse_units(doc, object_key, bytes).await?;
        if units.is_empty() {
            return Err(AppError::NoUnits);
        }
        info!(units = units.len(), "units produced");

        let raw: Vec<String> = units
            .iter()
            .flat_map(|u| {
                chunk_markdown(u, self.rag.chunk_max_tokens, self.rag.chunk_overlap_tokens)
            })
            .collect();
        let chunks = enforce_hard_cap(raw, self.rag.hard_max_chars_per_chunk);
        if chunks.is_empty() {
            return Err(AppError::NoChunks);
        }

        let vectors = embed_all(&*self.embeddings, &chunks, &self.embedding).await?;

        // Replace the document's chunk set: delete, then batched inserts
        self.chunks.delete_for_document(doc.id).await?;

        let rows: Vec<NewChunk> = chunks
            .iter()
            .zip(vectors)
            .map(|(content, embedding)| NewChunk {
                document_id: doc.id,
                content: content.clone(),
                page_or_sheet: None,
                section_path: None,
                token_count: approx_tokens(content) as i32,
                embedding,
            })
            .collect();

        for batch in rows.chunks(self.store.insert_batch.max(1)) {
            self.chunks.insert_batch(batch).await?;
        }

        self.documents.mark_ready(doc.id, Utc::now()).await?;
        Ok(rows.len())
    }

    async fn parse_units(
        &self,
        doc: &Document,
        object_key: &str,
        bytes: Vec<u8>,
    ) -> Result<Vec<String>> {
        match DocumentFormat::from_extension(&doc.file_type)? {
            DocumentFormat::Pdf => {
                parser::pdf::parse_pdf(&*self.parse_jobs, &bytes, &doc.filename, &self.parsing)
                    .await
            }
            DocumentFormat::Docx => {
                let url = self
                    .storage
                    .create_signed_url(object_key, self.store.parse_url_ttl_secs)
                    .await?;
                parser::docx::parse_docx(&url).await
            }
            DocumentFormat::Xlsx => {
                let url = self
                    .storage
                    .create_signed_url(object_key, self.store.parse_url_ttl_secs)
                    .await?;
                parser::sheet::parse_xlsx(&url).await
            }
            DocumentFormat::Csv => {
                let url = self
                    .storage
                    .create_signed_url(object_key, self.store.parse_url_ttl_secs)
                    .await?;
                parser::sheet::parse_csv(&url, &doc.filename).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::pdf::{MockParseJob, ParseJobState};
    use verdant_common::db::{MockChunkStore, MockDocumentStore, NewDocument};
    use verdant_common::llm::MockEmbeddings;
    use verdant_common::storage::MockStorage;

    struct Harness {
        documents: Arc<MockDocumentStore>,
        chunks: Arc<MockChunkStore>,
        storage: Arc<MockStorage>,
        pipeline: IngestionPipeline,
    }

    fn harness(parse_job: MockParseJob) -> Harness {
        let mut config = AppConfig::default();
        config.parsing.poll_interval_ms = 1;
        config.parsing.timeout_ms = 50;

        let documents = Arc::new(MockDocumentStore::new());
        let chunks = Arc::new(MockChunkStore::new());
        let storage = Arc::new(MockStorage::new());
        let embeddings = Arc::new(MockEmbeddings::new(8));

        let pipeline = IngestionPipeline::new(
            &config,
            documents.clone(),
            chunks.clone(),
            storage.clone(),
            embeddings,
            Arc::new(parse_job),
        );

        Harness {
            documents,
            chunks,
            storage,
            pipeline,
        }
    }

    fn seed_pdf(h: &Harness, key: &str) -> Uuid {
        h.storage.put(key, b"%PDF-1.7".to_vec());
        h.documents.seed(NewDocument {
            title: "report".into(),
            filename: "report.pdf".into(),
            file_type: "pdf".into(),
            source_url: None,
            object_key: Some(key.to_string()),
            content_hash: "hash-1".into(),
            status: DocumentStatus::Pending,
            metadata: serde_json::json!({}),
        })
    }

    const THREE_PAGES: &str =
        r#"{"pages": [{"markdown": "alpha content"}, {"markdown": "beta content"}, {"markdown": "gamma content"}]}"#;

    #[tokio::test]
    async fn test_three_page_pdf_end_to_end() {
        let h = harness(MockParseJob::immediate(THREE_PAGES));
        let id = seed_pdf(&h, "docs/report.pdf");

        let report = h.pipeline.ingest(id).await.unwrap();

        assert_eq!(report.chunk_count, 3);
        assert_eq!(h.chunks.count_for_document(id).await.unwrap(), 3);

        let doc = h.documents.get(id).unwrap();
        assert_eq!(doc.status, DocumentStatus::Ready);
        assert!(doc.last_indexed_at.is_some());

        for chunk in h.chunks.all() {
            assert!(chunk.content.len() <= 1800);
            assert_eq!(chunk.token_count, approx_tokens(&chunk.content) as i32);
            assert_eq!(chunk.embedding.len(), 8);
        }
    }

    #[tokio::test]
    async fn test_reingest_replaces_chunk_set() {
        let h = harness(MockParseJob::immediate(THREE_PAGES));
        let id = seed_pdf(&h, "docs/report.pdf");

        h.pipeline.ingest(id).await.unwrap();
        assert_eq!(h.chunks.count_for_document(id).await.unwrap(), 3);

        // Second run with the same parser output: no stale chunks survive
        let report = h.pipeline.ingest(id).await.unwrap();
        assert_eq!(report.chunk_count, 3);
        assert_eq!(h.chunks.count_for_document(id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_unknown_document() {
        let h = harness(MockParseJob::immediate(THREE_PAGES));
        let err = h.pipeline.ingest(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::DocNotFound { .. }));
    }

    #[tokio::test]
    async fn test_missing_object_key() {
        let h = harness(MockParseJob::immediate(THREE_PAGES));
        let id = h.documents.seed(NewDocument {
            title: "orphan".into(),
            filename: "orphan.pdf".into(),
            file_type: "pdf".into(),
            source_url: None,
            object_key: None,
            content_hash: "h".into(),
            status: DocumentStatus::Pending,
            metadata: serde_json::json!({}),
        });

        let err = h.pipeline.ingest(id).await.unwrap_err();
        assert!(matches!(err, AppError::MissingObjectKey { .. }));
        // Never entered parsing
        assert_eq!(h.documents.get(id).unwrap().status, DocumentStatus::Pending);
    }

    #[tokio::test]
    async fn test_empty_download_fails_and_marks_failed() {
        let h = harness(MockParseJob::immediate(THREE_PAGES));
        let id = seed_pdf(&h, "docs/report.pdf");
        h.storage.put("docs/report.pdf", Vec::new());

        let err = h.pipeline.ingest(id).await.unwrap_err();
        assert!(matches!(err, AppError::EmptyBytes));
        assert_eq!(h.documents.get(id).unwrap().status, DocumentStatus::Failed);
    }

    #[tokio::test]
    async fn test_slides_rejected_before_parsing_service() {
        let h = harness(MockParseJob::immediate(THREE_PAGES));
        h.storage.put("docs/deck.pptx", b"PK".to_vec());
        let id = h.documents.seed(NewDocument {
            title: "deck".into(),
            filename: "deck.pptx".into(),
            file_type: "pptx".into(),
            source_url: None,
            object_key: Some("docs/deck.pptx".into()),
            content_hash: "h".into(),
            status: DocumentStatus::Pending,
            metadata: serde_json::json!({}),
        });

        let err = h.pipeline.ingest(id).await.unwrap_err();
        assert!(matches!(err, AppError::UnsupportedFormat { .. }));
        assert_eq!(h.documents.get(id).unwrap().status, DocumentStatus::Failed);
    }

    #[tokio::test]
    async fn test_parse_job_failure_marks_failed() {
        let h = harness(MockParseJob::new(
            vec![ParseJobState::Failed {
                error: "corrupt".into(),
            }],
            "",
        ));
        let id = seed_pdf(&h, "docs/report.pdf");

        let err = h.pipeline.ingest(id).await.unwrap_err();
        assert!(matches!(err, AppError::ParseJobFailed { .. }));
        assert_eq!(h.documents.get(id).unwrap().status, DocumentStatus::Failed);
    }

    #[tokio::test]
    async fn test_insert_failure_marks_failed() {
        let h = harness(MockParseJob::immediate(THREE_PAGES));
        let id = seed_pdf(&h, "docs/report.pdf");
        h.chunks.fail_insert(true);

        let err = h.pipeline.ingest(id).await.unwrap_err();
        assert_eq!(err.stage(), "chunks.insert");
        assert_eq!(h.documents.get(id).unwrap().status, DocumentStatus::Failed);
    }

    #[tokio::test]
    async fn test_long_page_is_split_and_capped() {
        let long_page = format!(
            r#"{{"markdown": "{}"}}"#,
            "sustainability report line\\n".repeat(600)
        );
        let h = harness(MockParseJob::immediate(&long_page));
        let id = seed_pdf(&h, "docs/report.pdf");

        let report = h.pipeline.ingest(id).await.unwrap();
        assert!(report.chunk_count > 1);
        for chunk in h.chunks.all() {
            assert!(chunk.content.len() <= 1800);
        }
    }
}
