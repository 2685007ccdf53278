//! Verdant ingestion pipeline
//!
//! Converts registered documents into retrievable chunks:
//! parse (format-specific) → chunk (token-bounded, overlapping) →
//! embed (batched) → atomic index replacement.

pub mod chunker;
pub mod parser;
pub mod pipeline;

pub use chunker::{chunk_markdown, enforce_hard_cap};
pub use parser::pdf::{LlamaParseClient, MockParseJob, ParseJobClient, ParseJobState};
pub use parser::DocumentFormat;
pub use pipeline::{IngestReport, IngestionPipeline};
