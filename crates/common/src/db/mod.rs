//! Document metadata and chunk store access
//!
//! Both tables live behind a PostgREST-style interface on the backing store;
//! all access goes through the `DocumentStore` and `ChunkStore` traits so
//! pipelines can run against in-memory mocks in tests.

pub mod chunks;
pub mod documents;

pub use chunks::{ChunkMatch, ChunkStore, MockChunkStore, NewChunk, RestChunkStore};
pub use documents::{Document, DocumentStore, MockDocumentStore, NewDocument, RestDocumentStore};

use serde::{Deserialize, Serialize};

/// Document indexing lifecycle.
///
/// `pending` → `parsing` → `ready`; a failure after entering `parsing`
/// moves the document to `failed` instead of leaving it stuck. A changed
/// content hash on re-registration resets any state back to `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Parsing,
    Ready,
    Failed,
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Parsing => "parsing",
            DocumentStatus::Ready => "ready",
            DocumentStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Render an embedding as a pgvector literal string `[x,y,...]`
pub fn embedding_literal(embedding: &[f32]) -> String {
    let mut out = String::with_capacity(embedding.len() * 8 + 2);
    out.push('[');
    for (i, v) in embedding.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&v.to_string());
    }
    out.push(']');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_literal() {
        assert_eq!(embedding_literal(&[1.0, -0.5, 2.25]), "[1,-0.5,2.25]");
        assert_eq!(embedding_literal(&[]), "[]");
    }

    #[test]
    fn test_status_serde_roundtrip() {
        let json = serde_json::to_string(&DocumentStatus::Parsing).unwrap();
        assert_eq!(json, "\"parsing\"");
        let back: DocumentStatus = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(back, DocumentStatus::Failed);
    }
}
