//! Domain layer - Core business logic and entities

pub mod cache;
pub mod conversation;
pub mod embedding;
pub mod error;
pub mod events;
pub mod llm;
pub mod rag;
pub mod vector;

pub use cache::{Cache, CacheExt, CacheNamespace, ClearScope, ContentKeyGenerator};
pub use conversation::{ChatMessage, MessageRole, Session};
pub use embedding::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse};
pub use error::DomainError;
pub use events::{ChatEvent, ChatEventPublisher};
pub use llm::{FinishReason, LlmProvider, LlmRequest, LlmRequestBuilder, LlmResponse, Usage};
pub use rag::{QueryResult, Source, TokenSink};
pub use vector::{ArticlePayload, CollectionSpec, IndexPoint, SearchHit, VectorIndex};
