//! News RAG Gateway
//!
//! Retrieval-augmented question answering over a news corpus with:
//! - A content-addressed cache (in-memory or Redis) for embeddings, search
//!   results and full answers
//! - Remote embedding, vector index and generative model providers
//! - Session-scoped conversation history with a sliding TTL

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;
use std::time::Duration;

use domain::DomainError;
use domain::cache::Cache;
use domain::embedding::EmbeddingProvider;
use domain::llm::LlmProvider;
use domain::vector::{CollectionSpec, VectorIndex};
use infrastructure::{
    cache::{CacheConfig, CacheFactory, CacheType},
    embedding::JinaEmbeddingProvider,
    events::BroadcastEventBus,
    llm::{GeminiProvider, HttpClient},
    services::{
        AnswerGenerator, CacheTtls, ChatService, ContentCacheService, ConversationService,
        EmbeddingService, GenerationSettings, IngestionService, QuerySettings, RagService,
        RetryPolicy, SearchGateway,
    },
    vector::{InMemoryVectorIndex, QdrantIndex},
};
use tracing::{info, warn};

/// Fully wired services of one process
#[derive(Debug)]
pub struct App {
    pub cache: Arc<ContentCacheService>,
    pub embeddings: Arc<EmbeddingService>,
    pub search: Arc<SearchGateway>,
    pub rag: Arc<RagService>,
    pub conversations: Arc<ConversationService>,
    pub chat: Arc<ChatService>,
    pub ingestion: Arc<IngestionService>,
    pub events: BroadcastEventBus,
}

/// Builds every service from configuration
pub async fn create_app(config: &AppConfig) -> anyhow::Result<App> {
    let store = create_cache_store(config).await?;

    let cache = Arc::new(ContentCacheService::with_ttls(
        store.clone(),
        cache_ttls(config),
    ));

    let embeddings = Arc::new(
        EmbeddingService::new(create_embedding_provider(config)?, cache.clone())
            .with_model(config.embedding.model.clone())
            .with_retry(RetryPolicy::new(
                config.embedding.max_attempts,
                Duration::from_millis(config.embedding.retry_base_delay_ms),
            )),
    );

    let search = Arc::new(SearchGateway::new(
        create_vector_index(config)?,
        CollectionSpec::new(
            &config.vector.collection,
            collection_dimensions(config, &embeddings)?,
        ),
    ));

    let generator = Arc::new(AnswerGenerator::new(
        create_llm_provider(config)?,
        GenerationSettings {
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            top_k: config.llm.top_k,
            top_p: config.llm.top_p,
            max_output_tokens: config.llm.max_output_tokens,
            token_delay: Duration::from_millis(config.rag.token_delay_ms),
        },
    ));

    let rag = Arc::new(
        RagService::new(cache.clone(), embeddings.clone(), search.clone(), generator)
            .with_settings(QuerySettings {
                search_limit: config.rag.search_limit,
                excerpt_chars: config.rag.excerpt_chars,
                token_delay: Duration::from_millis(config.rag.token_delay_ms),
            }),
    );

    let conversations = Arc::new(ConversationService::new(store, config.session.ttl()));
    let events = BroadcastEventBus::new();
    let chat = Arc::new(ChatService::new(
        conversations.clone(),
        rag.clone(),
        Arc::new(events.clone()),
    ));
    let ingestion = Arc::new(IngestionService::new(embeddings.clone(), search.clone()));

    info!(
        cache_backend = %config.cache.backend,
        vector_backend = %config.vector.backend,
        collection = %config.vector.collection,
        "Application initialized"
    );

    Ok(App {
        cache,
        embeddings,
        search,
        rag,
        conversations,
        chat,
        ingestion,
        events,
    })
}

/// Vector size of the collection; must match what the embedding model emits
fn collection_dimensions(
    config: &AppConfig,
    embeddings: &EmbeddingService,
) -> Result<usize, DomainError> {
    let configured = config.embedding.dimensions;

    match embeddings.dimensions() {
        Some(model_dimensions) if model_dimensions != configured => {
            Err(DomainError::configuration(format!(
                "embedding.dimensions is {} but model '{}' produces {}-dimensional vectors",
                configured,
                embeddings.model(),
                model_dimensions
            )))
        }
        _ => Ok(configured),
    }
}

fn cache_ttls(config: &AppConfig) -> CacheTtls {
    CacheTtls {
        embedding: Duration::from_secs(config.cache.embedding_ttl_secs),
        query: Duration::from_secs(config.cache.query_ttl_secs),
        negative_query: Duration::from_secs(config.cache.negative_query_ttl_secs),
        search: Duration::from_secs(config.cache.search_ttl_secs),
    }
}

async fn create_cache_store(config: &AppConfig) -> anyhow::Result<Arc<dyn Cache>> {
    let cache_type: CacheType = config.cache.backend.parse()?;

    let mut cache_config = match cache_type {
        CacheType::InMemory => CacheConfig::in_memory(),
        CacheType::Redis => {
            let url = config.cache.redis_url.clone().ok_or_else(|| {
                anyhow::anyhow!("cache.redis_url is required for the redis backend")
            })?;
            CacheConfig::redis(url)
        }
    }
    .with_max_capacity(config.cache.max_capacity);

    if let Some(prefix) = &config.cache.key_prefix {
        cache_config = cache_config.with_key_prefix(prefix.clone());
    }

    Ok(CacheFactory::new().create(&cache_config).await?)
}

fn create_embedding_provider(config: &AppConfig) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    if config.embedding.api_key.is_empty() {
        warn!("embedding.api_key is not set; embedding requests will be rejected");
    }

    let client = HttpClient::with_timeout(Duration::from_secs(config.embedding.timeout_secs))?;

    Ok(Arc::new(JinaEmbeddingProvider::with_base_url(
        client,
        config.embedding.api_key.clone(),
        config.embedding.base_url.clone(),
    )))
}

fn create_vector_index(config: &AppConfig) -> anyhow::Result<Arc<dyn VectorIndex>> {
    match config.vector.backend.to_lowercase().as_str() {
        "qdrant" => {
            let client = HttpClient::with_timeout(Duration::from_secs(config.vector.timeout_secs))?;
            let mut index = QdrantIndex::new(client, config.vector.url.clone());

            if let Some(key) = &config.vector.api_key {
                index = index.with_api_key(key.clone());
            }

            Ok(Arc::new(index))
        }
        "in_memory" | "memory" => Ok(Arc::new(InMemoryVectorIndex::new())),
        other => Err(anyhow::anyhow!(
            "Unknown vector backend: {}. Valid backends: qdrant, in_memory",
            other
        )),
    }
}

fn create_llm_provider(config: &AppConfig) -> anyhow::Result<Arc<dyn LlmProvider>> {
    if config.llm.api_key.is_empty() {
        warn!("llm.api_key is not set; answer generation will fall back");
    }

    let client = HttpClient::with_timeout(Duration::from_secs(config.llm.timeout_secs))?;

    Ok(Arc::new(GeminiProvider::with_base_url(
        client,
        config.llm.api_key.clone(),
        config.llm.base_url.clone(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_memory_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.vector.backend = "in_memory".to_string();
        config
    }

    #[tokio::test]
    async fn test_create_app_with_in_memory_backends() {
        let app = create_app(&in_memory_config()).await.unwrap();

        assert!(app.cache.health_check().await);
        assert!(app.search.initialize().await.unwrap());
        assert_eq!(app.search.collection().dimensions, 768);
        assert_eq!(app.embeddings.model(), "jina-embeddings-v2-base-en");
        assert_eq!(app.cache.ttls().negative_query, Duration::from_secs(1800));
    }

    #[tokio::test]
    async fn test_dimensions_must_match_embedding_model() {
        let mut config = in_memory_config();
        config.embedding.model = "jina-embeddings-v3".to_string();

        let err = create_app(&config).await.unwrap_err();
        assert!(err.to_string().contains("1024"));

        config.embedding.dimensions = 1024;
        let app = create_app(&config).await.unwrap();
        assert_eq!(app.search.collection().dimensions, 1024);
    }

    #[tokio::test]
    async fn test_unlisted_model_uses_configured_dimensions() {
        let mut config = in_memory_config();
        config.embedding.model = "custom-embedding".to_string();
        config.embedding.dimensions = 384;

        let app = create_app(&config).await.unwrap();
        assert_eq!(app.search.collection().dimensions, 384);
    }

    #[tokio::test]
    async fn test_unknown_backends_are_rejected() {
        let mut config = in_memory_config();
        config.vector.backend = "pinecone".to_string();
        assert!(create_app(&config).await.is_err());

        let mut config = in_memory_config();
        config.cache.backend = "memcached".to_string();
        assert!(create_app(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_redis_backend_requires_url() {
        let mut config = in_memory_config();
        config.cache.backend = "redis".to_string();

        let err = create_app(&config).await.unwrap_err();
        assert!(err.to_string().contains("redis_url"));
    }
}
