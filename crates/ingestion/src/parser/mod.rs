//! Format-specific document parsing
//!
//! Every parser returns ordered markdown units, one per logical
//! page/sheet/section, each opening with an H1 so the chunker can split on
//! structural boundaries.

pub mod docx;
pub mod pdf;
pub mod sheet;

use verdant_common::errors::{AppError, Result};

/// Supported document formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Xlsx,
    Csv,
}

impl DocumentFormat {
    /// Resolve a file extension; slide decks and unknown types fail fast
    /// with a corrective instruction.
    pub fn from_extension(ext: &str) -> Result<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Ok(DocumentFormat::Pdf),
            "docx" => Ok(DocumentFormat::Docx),
            "xlsx" => Ok(DocumentFormat::Xlsx),
            "csv" => Ok(DocumentFormat::Csv),
            "ppt" | "pptx" => Err(AppError::UnsupportedFormat {
                extension: ext.to_string(),
                hint: "Export slides to PDF and re-upload.".to_string(),
            }),
            other => Err(AppError::UnsupportedFormat {
                extension: other.to_string(),
                hint: "Supported types: pdf, docx, xlsx, csv.".to_string(),
            }),
        }
    }
}

/// Fetch bytes from a time-limited access URL (DOCX/XLSX/CSV path)
pub(crate) async fn fetch_bytes(url: &str) -> Result<Vec<u8>> {
    let response = reqwest::get(url).await.map_err(|e| AppError::ParseFetchError {
        message: e.to_string(),
    })?;

    if !response.status().is_success() {
        return Err(AppError::ParseFetchError {
            message: format!("status {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(|e| AppError::ParseFetchError {
        message: e.to_string(),
    })?;

    Ok(bytes.to_vec())
}
