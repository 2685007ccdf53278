//! DOCX parsing
//!
//! Fetches the document from a time-limited access URL and extracts
//! paragraph text into a single markdown unit.

use super::fetch_bytes;
use docx_rs::{DocumentChild, ParagraphChild, RunChild};
use tracing::debug;
use verdant_common::errors::{AppError, Result};

/// Fetch a DOCX from a signed URL and convert it
pub async fn parse_docx(url: &str) -> Result<Vec<String>> {
    let bytes = fetch_bytes(url).await?;
    debug!(size = bytes.len(), "docx fetched");
    docx_to_units(&bytes)
}

/// Convert DOCX bytes into one `# Document` unit
pub fn docx_to_units(bytes: &[u8]) -> Result<Vec<String>> {
    let docx = docx_rs::read_docx(bytes).map_err(|e| AppError::ParseConversionError {
        message: e.to_string(),
    })?;

    let mut paragraphs: Vec<String> = Vec::new();
    for child in docx.document.children {
        if let DocumentChild::Paragraph(p) = child {
            let mut text = String::new();
            for child in p.children {
                if let ParagraphChild::Run(run) = child {
                    for child in run.children {
                        if let RunChild::Text(t) = child {
                            text.push_str(&t.text);
                        }
                    }
                }
            }
            paragraphs.push(text);
        }
    }

    let body = paragraphs.join("\n");
    debug!(len = body.len(), "docx converted");

    Ok(vec![format!("# Document\n\n{}", body)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use docx_rs::{Docx, Paragraph, Run};

    fn build_docx(paragraphs: &[&str]) -> Vec<u8> {
        let mut docx = Docx::new();
        for p in paragraphs {
            docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(*p)));
        }
        let mut out = Vec::new();
        docx.build().pack(&mut std::io::Cursor::new(&mut out)).unwrap();
        out
    }

    #[test]
    fn test_docx_single_unit_with_heading() {
        let bytes = build_docx(&["First paragraph.", "Second paragraph."]);
        let units = docx_to_units(&bytes).unwrap();

        assert_eq!(units.len(), 1);
        assert!(units[0].starts_with("# Document\n\n"));
        assert!(units[0].contains("First paragraph."));
        assert!(units[0].contains("Second paragraph."));
    }

    #[test]
    fn test_docx_invalid_bytes_is_conversion_error() {
        let err = docx_to_units(b"not a zip archive").unwrap_err();
        assert!(matches!(err, AppError::ParseConversionError { .. }));
    }
}
