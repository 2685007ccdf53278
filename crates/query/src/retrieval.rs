//! Similarity retrieval with document hydration
//!
//! Wraps the chunk store's nearest-neighbor search and attaches document
//! metadata (filename, storage key) through one batched lookup.

use std::collections::HashMap;
use tracing::{debug, warn};
use uuid::Uuid;
use verdant_common::db::{ChunkStore, DocumentStore};
use verdant_common::errors::Result;

/// One retrieval hit, hydrated with its document's metadata
#[derive(Debug, Clone)]
pub struct RetrievalHit {
    pub document_id: Uuid,
    pub content: String,
    pub page_or_sheet: Option<String>,
    pub section_path: Option<String>,
    pub score: f64,
    pub filename: Option<String>,
    pub object_key: Option<String>,
}

/// Retrieve the top-k chunks for a query vector and hydrate them.
///
/// A failed metadata lookup degrades the hits (no filename/key) rather than
/// failing the query.
pub async fn retrieve_hydrated(
    chunks: &dyn ChunkStore,
    documents: &dyn DocumentStore,
    query_embedding: &[f32],
    k: usize,
) -> Result<Vec<RetrievalHit>> {
    let matches = chunks.match_chunks(query_embedding, k).await?;
    debug!(hits = matches.len(), k, "chunks matched");

    let mut ids: Vec<Uuid> = Vec::new();
    for m in &matches {
        if !ids.contains(&m.document_id) {
            ids.push(m.document_id);
        }
    }

    let meta: HashMap<Uuid, (String, Option<String>)> = match documents.find_by_ids(&ids).await {
        Ok(docs) => docs
            .into_iter()
            .map(|d| (d.id, (d.filename, d.object_key)))
            .collect(),
        Err(e) => {
            warn!(error = %e, "document hydration failed; hits keep null metadata");
            HashMap::new()
        }
    };

    Ok(matches
        .into_iter()
        .map(|m| {
            let (filename, object_key) = meta
                .get(&m.document_id)
                .map(|(f, k)| (Some(f.clone()), k.clone()))
                .unwrap_or((None, None));
            RetrievalHit {
                document_id: m.document_id,
                content: m.content,
                page_or_sheet: m.page_or_sheet,
                section_path: m.section_path,
                score: m.score,
                filename,
                object_key,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdant_common::db::{DocumentStatus, MockChunkStore, MockDocumentStore, NewChunk, NewDocument};

    fn seed_doc(store: &MockDocumentStore, filename: &str, key: &str) -> Uuid {
        store.seed(NewDocument {
            title: filename.to_string(),
            filename: filename.to_string(),
            file_type: "pdf".to_string(),
            source_url: None,
            object_key: Some(key.to_string()),
            content_hash: "h".to_string(),
            status: DocumentStatus::Ready,
            metadata: serde_json::json!({}),
        })
    }

    fn chunk(doc: Uuid, content: &str, embedding: Vec<f32>) -> NewChunk {
        NewChunk {
            document_id: doc,
            content: content.to_string(),
            page_or_sheet: Some("p1".to_string()),
            section_path: None,
            token_count: 1,
            embedding,
        }
    }

    #[tokio::test]
    async fn test_hits_are_ranked_and_hydrated() {
        let documents = MockDocumentStore::new();
        let chunks = MockChunkStore::new();

        let doc_a = seed_doc(&documents, "a.pdf", "docs/a.pdf");
        let doc_b = seed_doc(&documents, "b.pdf", "docs/b.pdf");
        chunks
            .insert_batch(&[
                chunk(doc_a, "near", vec![1.0, 0.0]),
                chunk(doc_b, "far", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let hits = retrieve_hydrated(&chunks, &documents, &[1.0, 0.1], 5)
            .await
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].content, "near");
        assert!(hits[0].score >= hits[1].score);
        assert_eq!(hits[0].filename.as_deref(), Some("a.pdf"));
        assert_eq!(hits[0].object_key.as_deref(), Some("docs/a.pdf"));
    }

    #[tokio::test]
    async fn test_k_bounds_hit_count() {
        let documents = MockDocumentStore::new();
        let chunks = MockChunkStore::new();
        let doc = seed_doc(&documents, "a.pdf", "docs/a.pdf");

        let rows: Vec<NewChunk> = (0..10)
            .map(|i| chunk(doc, &format!("c{}", i), vec![1.0, i as f32 / 10.0]))
            .collect();
        chunks.insert_batch(&rows).await.unwrap();

        let hits = retrieve_hydrated(&chunks, &documents, &[1.0, 0.0], 3)
            .await
            .unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_document_keeps_null_metadata() {
        let documents = MockDocumentStore::new();
        let chunks = MockChunkStore::new();

        chunks
            .insert_batch(&[chunk(Uuid::new_v4(), "orphan", vec![1.0])])
            .await
            .unwrap();

        let hits = retrieve_hydrated(&chunks, &documents, &[1.0], 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].filename.is_none());
        assert!(hits[0].object_key.is_none());
    }
}
