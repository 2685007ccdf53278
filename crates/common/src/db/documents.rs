//! Document metadata store

use super::DocumentStatus;
use crate::errors::{AppError, Result, StoreOp};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// A registered document row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub title: String,
    pub filename: String,
    pub file_type: String,
    pub source_url: Option<String>,
    pub object_key: Option<String>,
    pub content_hash: String,
    pub status: DocumentStatus,
    pub last_indexed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Insert payload for a new document row
#[derive(Debug, Clone, Serialize)]
pub struct NewDocument {
    pub title: String,
    pub filename: String,
    pub file_type: String,
    pub source_url: Option<String>,
    pub object_key: Option<String>,
    pub content_hash: String,
    pub status: DocumentStatus,
    pub metadata: serde_json::Value,
}

/// Trait for the document metadata table
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Document>>;

    /// Batched lookup used to hydrate retrieval hits
    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Document>>;

    /// Upsert identity: (filename, object_key)
    async fn find_by_key(&self, filename: &str, object_key: &str) -> Result<Option<Document>>;

    async fn insert(&self, doc: NewDocument) -> Result<Document>;

    async fn set_status(&self, id: Uuid, status: DocumentStatus) -> Result<()>;

    /// Record a changed content hash and force re-indexing
    async fn reset_for_reindex(&self, id: Uuid, content_hash: &str) -> Result<()>;

    /// Mark indexing complete
    async fn mark_ready(&self, id: Uuid, indexed_at: DateTime<Utc>) -> Result<()>;
}

/// PostgREST-backed document store
pub struct RestDocumentStore {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl RestDocumentStore {
    pub fn new(base_url: &str, service_key: &str, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("failed to build document store client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
        })
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/documents", self.base_url)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
    }

    async fn select(&self, query: &[(&str, String)]) -> Result<Vec<Document>> {
        let response = self
            .authed(self.client.get(self.table_url()).query(query))
            .send()
            .await
            .map_err(|e| store_err(StoreOp::Select, e))?;

        if !response.status().is_success() {
            return Err(AppError::Store {
                op: StoreOp::Select,
                message: format!("status {}", response.status()),
            });
        }

        response
            .json()
            .await
            .map_err(|e| store_err(StoreOp::Select, e))
    }

    async fn patch(&self, id: Uuid, body: serde_json::Value) -> Result<()> {
        let response = self
            .authed(
                self.client
                    .patch(self.table_url())
                    .query(&[("id", format!("eq.{}", id))])
                    .json(&body),
            )
            .send()
            .await
            .map_err(|e| store_err(StoreOp::Update, e))?;

        if !response.status().is_success() {
            return Err(AppError::Store {
                op: StoreOp::Update,
                message: format!("status {}", response.status()),
            });
        }
        Ok(())
    }
}

fn store_err(op: StoreOp, e: impl std::fmt::Display) -> AppError {
    AppError::Store {
        op,
        message: e.to_string(),
    }
}

#[async_trait]
impl DocumentStore for RestDocumentStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Document>> {
        let rows = self.select(&[("id", format!("eq.{}", id))]).await?;
        Ok(rows.into_iter().next())
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Document>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let joined = ids
            .iter()
            .map(Uuid::to_string)
            .collect::<Vec<_>>()
            .join(",");
        self.select(&[("id", format!("in.({})", joined))]).await
    }

    async fn find_by_key(&self, filename: &str, object_key: &str) -> Result<Option<Document>> {
        let rows = self
            .select(&[
                ("filename", format!("eq.{}", filename)),
                ("object_key", format!("eq.{}", object_key)),
            ])
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert(&self, doc: NewDocument) -> Result<Document> {
        let response = self
            .authed(
                self.client
                    .post(self.table_url())
                    .header("Prefer", "return=representation")
                    .json(&doc),
            )
            .send()
            .await
            .map_err(|e| store_err(StoreOp::Insert, e))?;

        if !response.status().is_success() {
            return Err(AppError::Store {
                op: StoreOp::Insert,
                message: format!("status {}", response.status()),
            });
        }

        let mut rows: Vec<Document> = response
            .json()
            .await
            .map_err(|e| store_err(StoreOp::Insert, e))?;

        rows.pop().ok_or_else(|| AppError::Store {
            op: StoreOp::Insert,
            message: "insert returned no row".into(),
        })
    }

    async fn set_status(&self, id: Uuid, status: DocumentStatus) -> Result<()> {
        self.patch(id, serde_json::json!({ "status": status })).await
    }

    async fn reset_for_reindex(&self, id: Uuid, content_hash: &str) -> Result<()> {
        self.patch(
            id,
            serde_json::json!({ "content_hash": content_hash, "status": DocumentStatus::Pending }),
        )
        .await
    }

    async fn mark_ready(&self, id: Uuid, indexed_at: DateTime<Utc>) -> Result<()> {
        self.patch(
            id,
            serde_json::json!({
                "status": DocumentStatus::Ready,
                "last_indexed_at": indexed_at.to_rfc3339(),
            }),
        )
        .await
    }
}

/// In-memory document store for tests
#[derive(Default)]
pub struct MockDocumentStore {
    rows: std::sync::Mutex<Vec<Document>>,
}

impl MockDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document directly, returning its id
    pub fn seed(&self, doc: NewDocument) -> Uuid {
        let id = Uuid::new_v4();
        self.rows.lock().unwrap().push(Document {
            id,
            title: doc.title,
            filename: doc.filename,
            file_type: doc.file_type,
            source_url: doc.source_url,
            object_key: doc.object_key,
            content_hash: doc.content_hash,
            status: doc.status,
            last_indexed_at: None,
            metadata: doc.metadata,
        });
        id
    }

    pub fn get(&self, id: Uuid) -> Option<Document> {
        self.rows.lock().unwrap().iter().find(|d| d.id == id).cloned()
    }
}

#[async_trait]
impl DocumentStore for MockDocumentStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Document>> {
        Ok(self.get(id))
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Document>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().filter(|d| ids.contains(&d.id)).cloned().collect())
    }

    async fn find_by_key(&self, filename: &str, object_key: &str) -> Result<Option<Document>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|d| d.filename == filename && d.object_key.as_deref() == Some(object_key))
            .cloned())
    }

    async fn insert(&self, doc: NewDocument) -> Result<Document> {
        let id = self.seed(doc);
        Ok(self.get(id).unwrap())
    }

    async fn set_status(&self, id: Uuid, status: DocumentStatus) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        match rows.iter_mut().find(|d| d.id == id) {
            Some(doc) => {
                doc.status = status;
                Ok(())
            }
            None => Err(AppError::Store {
                op: StoreOp::Update,
                message: format!("no document {}", id),
            }),
        }
    }

    async fn reset_for_reindex(&self, id: Uuid, content_hash: &str) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        match rows.iter_mut().find(|d| d.id == id) {
            Some(doc) => {
                doc.content_hash = content_hash.to_string();
                doc.status = DocumentStatus::Pending;
                Ok(())
            }
            None => Err(AppError::Store {
                op: StoreOp::Update,
                message: format!("no document {}", id),
            }),
        }
    }

    async fn mark_ready(&self, id: Uuid, indexed_at: DateTime<Utc>) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        match rows.iter_mut().find(|d| d.id == id) {
            Some(doc) => {
                doc.status = DocumentStatus::Ready;
                doc.last_indexed_at = Some(indexed_at);
                Ok(())
            }
            None => Err(AppError::Store {
                op: StoreOp::Update,
                message: format!("no document {}", id),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_doc(filename: &str, key: &str, hash: &str) -> NewDocument {
        NewDocument {
            title: filename.trim_end_matches(".pdf").to_string(),
            filename: filename.to_string(),
            file_type: "pdf".to_string(),
            source_url: None,
            object_key: Some(key.to_string()),
            content_hash: hash.to_string(),
            status: DocumentStatus::Pending,
            metadata: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn test_mock_upsert_key() {
        let store = MockDocumentStore::new();
        let doc = store.insert(new_doc("a.pdf", "docs/a.pdf", "h1")).await.unwrap();

        let found = store.find_by_key("a.pdf", "docs/a.pdf").await.unwrap();
        assert_eq!(found.unwrap().id, doc.id);

        let missing = store.find_by_key("a.pdf", "docs/other.pdf").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_mock_status_transitions() {
        let store = MockDocumentStore::new();
        let doc = store.insert(new_doc("a.pdf", "docs/a.pdf", "h1")).await.unwrap();

        store.set_status(doc.id, DocumentStatus::Parsing).await.unwrap();
        assert_eq!(store.get(doc.id).unwrap().status, DocumentStatus::Parsing);

        store.mark_ready(doc.id, Utc::now()).await.unwrap();
        let ready = store.get(doc.id).unwrap();
        assert_eq!(ready.status, DocumentStatus::Ready);
        assert!(ready.last_indexed_at.is_some());

        store.reset_for_reindex(doc.id, "h2").await.unwrap();
        let reset = store.get(doc.id).unwrap();
        assert_eq!(reset.status, DocumentStatus::Pending);
        assert_eq!(reset.content_hash, "h2");
    }
}
