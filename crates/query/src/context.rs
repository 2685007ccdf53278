//! Budget-constrained context assembly
//!
//! Selects retrieval hits in rank order, truncates each to the per-chunk
//! cap, and stops hard at the first block that would overflow the total
//! token budget. Hits past the cutoff are dropped, never reordered.

use crate::retrieval::RetrievalHit;
use tracing::debug;
use verdant_common::{approx_tokens, truncate_to_char_boundary};

/// Marker appended to hit content cropped by the per-chunk cap
pub const CONTEXT_TRUNCATION_MARKER: &str = " …[truncated]";

/// Separator between rendered context blocks
pub const BLOCK_SEPARATOR: &str = "\n\n---\n\n";

/// A hit accepted into the context window
#[derive(Debug, Clone)]
pub struct SelectedHit {
    /// Zero-based retrieval rank; the block label is `#rank+1`
    pub index: usize,
    pub hit: RetrievalHit,
    pub block: String,
    pub block_tokens: usize,
}

/// Result of one assembly pass
#[derive(Debug, Clone, Default)]
pub struct Assembly {
    pub selected: Vec<SelectedHit>,
    pub used_tokens: usize,
    pub truncated_count: usize,
}

impl Assembly {
    /// The assembled context string handed to the completion service
    pub fn context(&self) -> String {
        self.selected
            .iter()
            .map(|s| s.block.as_str())
            .collect::<Vec<_>>()
            .join(BLOCK_SEPARATOR)
    }
}

/// Assemble context from ranked hits under a token budget
pub fn assemble(hits: Vec<RetrievalHit>, per_chunk_chars: usize, budget_tokens: usize) -> Assembly {
    let mut assembly = Assembly::default();

    for (index, hit) in hits.into_iter().enumerate() {
        if hit.content.is_empty() {
            continue;
        }

        let mut content = hit.content.clone();
        if content.len() > per_chunk_chars {
            content = truncate_to_char_boundary(&content, per_chunk_chars).to_string();
            content.push_str(CONTEXT_TRUNCATION_MARKER);
            assembly.truncated_count += 1;
        }

        let block = format!(
            "[#{}] ({}) {}\n{}",
            index + 1,
            hit.page_or_sheet.as_deref().unwrap_or("n/a"),
            hit.section_path.as_deref().unwrap_or(""),
            content
        );
        let block_tokens = approx_tokens(&block);

        if assembly.used_tokens + block_tokens > budget_tokens {
            debug!(
                at_hit = index + 1,
                would_use = assembly.used_tokens + block_tokens,
                budget = budget_tokens,
                "context budget reached"
            );
            break;
        }

        assembly.used_tokens += block_tokens;
        assembly.selected.push(SelectedHit {
            index,
            hit,
            block,
            block_tokens,
        });
    }

    debug!(
        selected = assembly.selected.len(),
        truncated = assembly.truncated_count,
        approx_tokens = assembly.used_tokens,
        "context assembled"
    );

    assembly
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn hit(content: &str, locator: Option<&str>, section: Option<&str>) -> RetrievalHit {
        RetrievalHit {
            document_id: Uuid::new_v4(),
            content: content.to_string(),
            page_or_sheet: locator.map(str::to_string),
            section_path: section.map(str::to_string),
            score: 0.9,
            filename: Some("doc.pdf".to_string()),
            object_key: Some("docs/doc.pdf".to_string()),
        }
    }

    #[test]
    fn test_block_rendering() {
        let assembly = assemble(vec![hit("body text", Some("p3"), Some("Intro"))], 1800, 4500);
        assert_eq!(assembly.selected.len(), 1);
        assert_eq!(assembly.selected[0].block, "[#1] (p3) Intro\nbody text");
    }

    #[test]
    fn test_missing_locator_renders_na() {
        let assembly = assemble(vec![hit("text", None, None)], 1800, 4500);
        assert_eq!(assembly.selected[0].block, "[#1] (n/a) \ntext");
    }

    #[test]
    fn test_per_chunk_truncation_marker() {
        let assembly = assemble(vec![hit(&"x".repeat(3000), None, None)], 1800, 4500);
        assert_eq!(assembly.truncated_count, 1);
        let block = &assembly.selected[0].block;
        assert!(block.ends_with(CONTEXT_TRUNCATION_MARKER));
        assert!(block.len() < 3000);
    }

    #[test]
    fn test_budget_is_never_exceeded() {
        let hits: Vec<RetrievalHit> = (0..10).map(|_| hit(&"y".repeat(1000), None, None)).collect();
        let assembly = assemble(hits, 1800, 800);

        assert!(assembly.used_tokens <= 800);
        let sum: usize = assembly.selected.iter().map(|s| s.block_tokens).sum();
        assert_eq!(sum, assembly.used_tokens);
    }

    #[test]
    fn test_cutoff_is_a_rank_prefix() {
        let hits: Vec<RetrievalHit> = (0..6).map(|_| hit(&"z".repeat(1000), None, None)).collect();
        let assembly = assemble(hits, 1800, 600);

        // Accepted hits are exactly ranks 0..n, nothing skipped
        for (pos, selected) in assembly.selected.iter().enumerate() {
            assert_eq!(selected.index, pos);
        }
        assert!(assembly.selected.len() < 6);
    }

    #[test]
    fn test_empty_content_is_skipped_not_cutoff() {
        let hits = vec![hit("", None, None), hit("real", None, None)];
        let assembly = assemble(hits, 1800, 4500);
        assert_eq!(assembly.selected.len(), 1);
        // Label keeps the original retrieval rank
        assert_eq!(assembly.selected[0].index, 1);
        assert!(assembly.selected[0].block.starts_with("[#2]"));
    }

    #[test]
    fn test_context_join_separator() {
        let assembly = assemble(vec![hit("one", None, None), hit("two", None, None)], 1800, 4500);
        let context = assembly.context();
        assert!(context.contains("one"));
        assert!(context.contains(BLOCK_SEPARATOR));
        assert!(context.contains("two"));
    }
}
