//! Citation resolution
//!
//! One citation candidate per selected hit, deduplicated by document so an
//! answer never cites the same file twice, then signed into time-limited
//! access links. Signing runs concurrently per document and failures leave
//! the citation with a null URL instead of dropping it.

use crate::context::SelectedHit;
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashSet;
use tracing::warn;
use uuid::Uuid;
use verdant_common::storage::ObjectStorage;

/// A resolved citation; `url` is None when the source is identified but not
/// currently linkable.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    #[serde(rename = "ref")]
    pub reference: String,
    pub document_id: Uuid,
    pub filename: Option<String>,
    pub page_or_sheet: Option<String>,
    pub section_path: Option<String>,
    pub url: Option<String>,
}

/// Resolve citations for the hits that made it into the context window
pub async fn resolve(
    selected: &[SelectedHit],
    storage: &dyn ObjectStorage,
    ttl_secs: u64,
) -> Vec<Citation> {
    // Dedup by document, keeping the highest-ranked occurrence
    let mut seen: HashSet<Uuid> = HashSet::new();
    let mut candidates: Vec<(&SelectedHit, Option<String>)> = Vec::new();
    for s in selected {
        if seen.insert(s.hit.document_id) {
            candidates.push((s, s.hit.object_key.clone()));
        }
    }

    let signed = join_all(candidates.iter().map(|(s, object_key)| async move {
        match object_key {
            Some(key) => match storage.create_signed_url(key, ttl_secs).await {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!(document_id = %s.hit.document_id, error = %e, "signing failed");
                    None
                }
            },
            None => None,
        }
    }))
    .await;

    candidates
        .into_iter()
        .zip(signed)
        .map(|((s, _), url)| Citation {
            reference: format!("#{}", s.index + 1),
            document_id: s.hit.document_id,
            filename: s.hit.filename.clone(),
            page_or_sheet: s.hit.page_or_sheet.clone(),
            section_path: s.hit.section_path.clone(),
            url,
        })
        .collect()
}
