//! Text chunking
//!
//! Splits one markdown unit into token-bounded chunks for embedding.
//! Top-level headings are chunk boundaries; a section that fits the budget
//! is exactly one chunk. Oversized sections accumulate lines and carry a
//! character-slice overlap into the next chunk.

use tracing::debug;
use verdant_common::{approx_tokens, truncate_to_char_boundary};

/// Marker appended to chunks cropped by the hard character ceiling
pub const TRIM_MARKER: &str = " …[trimmed]";

/// Split one markdown unit into chunks of at most `max_tokens` estimated
/// tokens, with `overlap_tokens` of trailing context carried forward.
pub fn chunk_markdown(unit: &str, max_tokens: usize, overlap_tokens: usize) -> Vec<String> {
    let mut chunks = Vec::new();

    for block in split_on_headings(unit) {
        if approx_tokens(&block) <= max_tokens {
            chunks.push(block);
            continue;
        }

        let mut buf: Vec<String> = Vec::new();
        let mut tokens = 0usize;

        for line in block.split('\n') {
            let line_tokens = (line.len() + 1).div_ceil(4);
            if tokens + line_tokens > max_tokens && !buf.is_empty() {
                let emitted = buf.join("\n");
                let carry = tail_chars(&emitted, overlap_tokens * 4).to_string();
                chunks.push(emitted);
                buf = vec![carry, line.to_string()];
                tokens = approx_tokens(&buf.join("\n"));
            } else {
                buf.push(line.to_string());
                tokens += line_tokens;
            }
        }

        if !buf.is_empty() {
            chunks.push(buf.join("\n"));
        }
    }

    debug!(
        input_len = unit.len(),
        chunk_count = chunks.len(),
        max_tokens,
        "unit chunked"
    );

    chunks
}

/// Crop any chunk above the hard ceiling, marker included in the ceiling.
pub fn enforce_hard_cap(chunks: Vec<String>, hard_max_chars: usize) -> Vec<String> {
    chunks
        .into_iter()
        .map(|c| {
            if c.len() <= hard_max_chars {
                return c;
            }
            let keep = hard_max_chars.saturating_sub(TRIM_MARKER.len());
            let mut cropped = truncate_to_char_boundary(&c, keep).to_string();
            cropped.push_str(TRIM_MARKER);
            cropped
        })
        .collect()
}

/// Split on top-level heading boundaries: a newline followed by `# `.
/// A heading is never separated from the section that follows it.
fn split_on_headings(md: &str) -> Vec<String> {
    let mut blocks: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in md.split('\n') {
        if line.starts_with("# ") && !current.is_empty() {
            blocks.push(current.join("\n"));
            current = Vec::new();
        }
        current.push(line);
    }
    blocks.push(current.join("\n"));
    blocks
}

/// Trailing slice of at most `max_bytes`, starting on a char boundary
fn tail_chars(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut start = text.len() - max_bytes;
    while start < text.len() && !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdant_common::approx_tokens;

    #[test]
    fn test_small_section_is_one_chunk() {
        let unit = "# Intro\nA short section.";
        let chunks = chunk_markdown(unit, 900, 80);
        assert_eq!(chunks, vec![unit.to_string()]);
    }

    #[test]
    fn test_splits_on_heading_boundaries() {
        let unit = "# One\nalpha\n# Two\nbeta\n# Three\ngamma";
        let chunks = chunk_markdown(unit, 900, 80);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], "# One\nalpha");
        assert_eq!(chunks[1], "# Two\nbeta");
        assert_eq!(chunks[2], "# Three\ngamma");
    }

    #[test]
    fn test_heading_stays_with_section() {
        let chunks = chunk_markdown("# Only\nbody", 900, 80);
        assert!(chunks[0].starts_with("# Only"));
    }

    #[test]
    fn test_oversized_section_respects_budget() {
        let line = "word ".repeat(40); // ~50 tokens per line
        let unit = format!("# Big\n{}", vec![line.as_str(); 30].join("\n"));
        let chunks = chunk_markdown(&unit, 100, 10);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            // Budget plus the carried overlap slice
            assert!(approx_tokens(chunk) <= 100 + 10 + 51);
        }
    }

    #[test]
    fn test_overlap_carries_tail_of_previous_chunk() {
        let line = "x".repeat(360); // 90 tokens + newline
        let unit = format!("# Big\n{}\n{}\n{}", line, line, line);
        let chunks = chunk_markdown(&unit, 100, 20);

        assert!(chunks.len() >= 2);
        let tail: String = chunks[0].chars().rev().take(80).collect::<String>();
        let tail: String = tail.chars().rev().collect();
        assert!(chunks[1].starts_with(&tail));
    }

    #[test]
    fn test_hard_cap_with_marker_stays_under_ceiling() {
        let chunks = enforce_hard_cap(vec!["y".repeat(5000)], 1800);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].len() <= 1800);
        assert!(chunks[0].ends_with(TRIM_MARKER));
    }

    #[test]
    fn test_hard_cap_leaves_small_chunks_alone() {
        let chunks = enforce_hard_cap(vec!["small".to_string()], 1800);
        assert_eq!(chunks[0], "small");
    }

    #[test]
    fn test_every_chunk_under_ceiling_for_messy_input() {
        let unit = format!(
            "# A\n{}\n# B\n{}",
            "long ".repeat(2000),
            "data ".repeat(1500)
        );
        let chunks = enforce_hard_cap(chunk_markdown(&unit, 900, 80), 1800);
        assert!(!chunks.is_empty());
        for chunk in chunks {
            assert!(chunk.len() <= 1800);
        }
    }
}
