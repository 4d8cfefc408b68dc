//! Infrastructure services

mod answer_generator;
mod chat_service;
mod content_cache_service;
mod conversation_service;
mod embedding_service;
mod ingestion_service;
mod rag_service;
mod search_gateway;

pub use answer_generator::{AnswerGenerator, GenerationSettings, build_prompt};
pub use chat_service::ChatService;
pub use content_cache_service::{CacheStats, CacheTtls, ContentCacheService};
pub use conversation_service::ConversationService;
pub use embedding_service::{DEFAULT_WARM_QUERIES, EmbeddingService, RetryPolicy};
pub use ingestion_service::{IngestionReport, IngestionService, parse_articles};
pub use rag_service::{QuerySettings, RagService, build_context};
pub use search_gateway::SearchGateway;
