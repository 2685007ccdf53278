//! Document registration and ingestion handlers
//!
//! Registration: hash the stored object, upsert its metadata row by
//! (filename, object key), then index it. A changed content hash forces
//! re-indexing; an unchanged hash on an already-indexed document is a no-op.

use crate::handlers::{redact, ApiError, Rid};
use crate::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;
use verdant_common::db::{DocumentStatus, DocumentStore, NewDocument};
use verdant_common::errors::{AppError, ErrorCode};
use verdant_common::storage::ObjectStorage;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(rename = "objectKey", default)]
    pub object_key: String,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub ok: bool,
    pub rid: String,
    #[serde(rename = "documentId")]
    pub document_id: Uuid,
    #[serde(rename = "indexResult")]
    pub index_result: IndexResult,
}

#[derive(Serialize)]
pub struct IndexResult {
    pub ok: bool,
    pub chunks: usize,
}

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    #[serde(rename = "documentId")]
    pub document_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct IngestResponse {
    pub ok: bool,
    pub rid: String,
    pub chunks: usize,
}

/// Register a stored object and index it
pub async fn register(
    State(state): State<AppState>,
    Rid(rid): Rid,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    if request.object_key.trim().is_empty() {
        return Err(ApiError::new(
            &rid,
            AppError::validation(ErrorCode::MissingObjectKey, "objectKey required"),
        ));
    }
    let object_key = request.object_key.trim();

    let bytes = fetch_for_hashing(&state, object_key)
        .await
        .map_err(|e| ApiError::new(&rid, e))?;

    let (document_id, needs_index) =
        upsert_document(&*state.documents, &*state.storage, object_key, &bytes)
            .await
            .map_err(|e| ApiError::new(&rid, e))?;

    let chunks = if needs_index {
        let report = state
            .ingestion
            .ingest(document_id)
            .await
            .map_err(|e| ApiError::new(&rid, e))?;
        report.chunk_count
    } else {
        // Content unchanged and already indexed; report the current count
        state
            .chunks
            .count_for_document(document_id)
            .await
            .map_err(|e| ApiError::new(&rid, e))?
    };

    Ok(Json(RegisterResponse {
        ok: true,
        rid,
        document_id,
        index_result: IndexResult { ok: true, chunks },
    }))
}

/// Index (or re-index) an already-registered document
pub async fn ingest(
    State(state): State<AppState>,
    Rid(rid): Rid,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
    let document_id = request.document_id.ok_or_else(|| {
        ApiError::new(
            &rid,
            AppError::validation(ErrorCode::MissingDocumentId, "documentId required"),
        )
    })?;

    let report = state
        .ingestion
        .ingest(document_id)
        .await
        .map_err(|e| ApiError::new(&rid, e))?;

    Ok(Json(IngestResponse {
        ok: true,
        rid,
        chunks: report.chunk_count,
    }))
}

/// Fetch the object through a short-TTL link for hashing
async fn fetch_for_hashing(state: &AppState, object_key: &str) -> Result<Vec<u8>, AppError> {
    let signed_url = state
        .storage
        .create_signed_url(object_key, state.config.store.hash_url_ttl_secs)
        .await?;
    tracing::debug!(url = %redact(&signed_url), "hashing fetch");

    let response = reqwest::get(&signed_url)
        .await
        .map_err(|e| AppError::FetchFailed {
            message: e.to_string(),
        })?;
    if !response.status().is_success() {
        return Err(AppError::FetchFailed {
            message: format!("status {}", response.status()),
        });
    }
    let bytes = response.bytes().await.map_err(|e| AppError::FetchFailed {
        message: e.to_string(),
    })?;
    if bytes.is_empty() {
        return Err(AppError::EmptyBytes);
    }
    Ok(bytes.to_vec())
}

/// Upsert the metadata row for the object with the given bytes.
/// Returns the document id and whether indexing is needed.
async fn upsert_document(
    documents: &dyn DocumentStore,
    storage: &dyn ObjectStorage,
    object_key: &str,
    bytes: &[u8],
) -> Result<(Uuid, bool), AppError> {
    let content_hash = hex::encode(Sha256::digest(bytes));
    tracing::debug!(hash_prefix = &content_hash[..16], "content hashed");

    let filename = object_key.rsplit('/').next().unwrap_or(object_key);
    let file_type = filename
        .rsplit('.')
        .next()
        .filter(|ext| *ext != filename)
        .unwrap_or("")
        .to_lowercase();
    let title = filename
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(filename);
    let source_url = storage.get_public_url(object_key);

    match documents.find_by_key(filename, object_key).await? {
        None => {
            let doc = documents
                .insert(NewDocument {
                    title: title.to_string(),
                    filename: filename.to_string(),
                    file_type,
                    source_url: Some(source_url),
                    object_key: Some(object_key.to_string()),
                    content_hash,
                    status: DocumentStatus::Pending,
                    metadata: serde_json::json!({}),
                })
                .await?;
            Ok((doc.id, true))
        }
        Some(existing) => {
            if existing.content_hash != content_hash {
                tracing::info!(document_id = %existing.id, "content changed, reset to pending");
                documents
                    .reset_for_reindex(existing.id, &content_hash)
                    .await?;
                Ok((existing.id, true))
            } else {
                // Unchanged bytes: idempotent unless the last index never completed
                let needs_index = existing.status != DocumentStatus::Ready;
                Ok((existing.id, needs_index))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use verdant_common::db::MockDocumentStore;
    use verdant_common::storage::MockStorage;

    #[tokio::test]
    async fn test_first_registration_inserts_pending() {
        let documents = MockDocumentStore::new();
        let storage = MockStorage::new();

        let (id, needs_index) =
            upsert_document(&documents, &storage, "reports/q3 report.pdf", b"pdf bytes")
                .await
                .unwrap();

        assert!(needs_index);
        let doc = documents.get(id).unwrap();
        assert_eq!(doc.filename, "q3 report.pdf");
        assert_eq!(doc.title, "q3 report");
        assert_eq!(doc.file_type, "pdf");
        assert_eq!(doc.status, DocumentStatus::Pending);
        assert_eq!(doc.object_key.as_deref(), Some("reports/q3 report.pdf"));
        assert!(doc.source_url.unwrap().contains("reports/q3 report.pdf"));
    }

    #[tokio::test]
    async fn test_reregistration_unchanged_bytes_is_noop() {
        let documents = MockDocumentStore::new();
        let storage = MockStorage::new();

        let (id, _) = upsert_document(&documents, &storage, "docs/a.pdf", b"same bytes")
            .await
            .unwrap();
        documents.mark_ready(id, Utc::now()).await.unwrap();
        let hash_before = documents.get(id).unwrap().content_hash;

        let (same_id, needs_index) =
            upsert_document(&documents, &storage, "docs/a.pdf", b"same bytes")
                .await
                .unwrap();

        assert_eq!(same_id, id);
        assert!(!needs_index);
        let doc = documents.get(id).unwrap();
        assert_eq!(doc.status, DocumentStatus::Ready);
        assert_eq!(doc.content_hash, hash_before);
    }

    #[tokio::test]
    async fn test_reregistration_changed_bytes_resets_pending() {
        let documents = MockDocumentStore::new();
        let storage = MockStorage::new();

        let (id, _) = upsert_document(&documents, &storage, "docs/a.pdf", b"version one")
            .await
            .unwrap();
        documents.mark_ready(id, Utc::now()).await.unwrap();

        let (same_id, needs_index) =
            upsert_document(&documents, &storage, "docs/a.pdf", b"version two")
                .await
                .unwrap();

        assert_eq!(same_id, id);
        assert!(needs_index);
        let doc = documents.get(id).unwrap();
        assert_eq!(doc.status, DocumentStatus::Pending);
        assert_eq!(doc.content_hash, hex::encode(Sha256::digest(b"version two")));
    }

    #[tokio::test]
    async fn test_unchanged_bytes_but_never_indexed_reindexes() {
        let documents = MockDocumentStore::new();
        let storage = MockStorage::new();

        let (id, _) = upsert_document(&documents, &storage, "docs/a.pdf", b"bytes")
            .await
            .unwrap();
        // Still pending: a previous index attempt never completed

        let (_, needs_index) = upsert_document(&documents, &storage, "docs/a.pdf", b"bytes")
            .await
            .unwrap();

        assert!(needs_index);
        assert_eq!(documents.get(id).unwrap().status, DocumentStatus::Pending);
    }

    #[tokio::test]
    async fn test_extension_less_key() {
        let documents = MockDocumentStore::new();
        let storage = MockStorage::new();

        let (id, _) = upsert_document(&documents, &storage, "docs/README", b"text")
            .await
            .unwrap();

        let doc = documents.get(id).unwrap();
        assert_eq!(doc.filename, "README");
        assert_eq!(doc.title, "README");
        assert_eq!(doc.file_type, "");
    }
}
