//! Verdant query pipeline
//!
//! Answers natural-language questions over the indexed corpus:
//! intent classification → query embedding → similarity retrieval →
//! budget-constrained context assembly → grounded generation with a
//! deterministic fallback → citation resolution.

pub mod answer;
pub mod citations;
pub mod context;
pub mod intent;
pub mod pipeline;
pub mod retrieval;

pub use citations::Citation;
pub use intent::{classify, QueryIntent};
pub use pipeline::{AskReport, QueryPipeline};
pub use retrieval::RetrievalHit;
