//! Embedding provider implementations

mod jina;

pub use jina::{DEFAULT_JINA_BASE_URL, DEFAULT_JINA_MODEL, JinaEmbeddingProvider};

// Re-export HTTP client for use by embedding providers
pub use super::llm::{HttpClient, HttpClientTrait};
