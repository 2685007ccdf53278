//! Language-model service clients
//!
//! Two single-purpose collaborators: text embeddings and chat completions.
//! Both are opaque HTTP services with a fixed request/response contract; the
//! traits here are the seam the pipelines test through.

pub mod completion;
pub mod embeddings;

pub use completion::{CompletionClient, MockCompletion, OpenAiCompletion};
pub use embeddings::{embed_all, EmbeddingClient, MockEmbeddings, OpenAiEmbeddings};
