use std::time::Duration;

use serde::Deserialize;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub cache: CacheSettings,
    pub embedding: EmbeddingSettings,
    pub vector: VectorSettings,
    pub llm: LlmSettings,
    pub rag: RagSettings,
    pub session: SessionSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

/// Cache store backend and TTL policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// `in_memory` or `redis`
    pub backend: String,
    pub redis_url: Option<String>,
    pub key_prefix: Option<String>,
    pub max_capacity: u64,
    pub embedding_ttl_secs: u64,
    pub query_ttl_secs: u64,
    /// TTL of the "nothing found" answer
    pub negative_query_ttl_secs: u64,
    pub search_ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: "in_memory".to_string(),
            redis_url: None,
            key_prefix: None,
            max_capacity: 10_000,
            embedding_ttl_secs: 86_400,
            query_ttl_secs: 3_600,
            negative_query_ttl_secs: 1_800,
            search_ttl_secs: 1_800,
        }
    }
}

/// Remote embedding provider
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub dimensions: usize,
    pub max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.jina.ai".to_string(),
            api_key: String::new(),
            model: "jina-embeddings-v2-base-en".to_string(),
            dimensions: 768,
            max_attempts: 3,
            retry_base_delay_ms: 1_000,
            timeout_secs: 30,
        }
    }
}

/// Vector index
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VectorSettings {
    /// `qdrant` or `in_memory`
    pub backend: String,
    pub url: String,
    pub api_key: Option<String>,
    pub collection: String,
    pub timeout_secs: u64,
}

impl Default for VectorSettings {
    fn default() -> Self {
        Self {
            backend: "qdrant".to_string(),
            url: "http://localhost:6333".to_string(),
            api_key: None,
            collection: "news_articles".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Generative model
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key: String::new(),
            model: "gemini-1.5-flash".to_string(),
            temperature: 0.7,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 1024,
            timeout_secs: 60,
        }
    }
}

/// Query pipeline
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    pub search_limit: usize,
    /// Characters of article content used when no summary exists
    pub excerpt_chars: usize,
    /// Pause between replayed tokens
    pub token_delay_ms: u64,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            search_limit: 5,
            excerpt_chars: 300,
            token_delay_ms: 0,
        }
    }
}

/// Conversation store
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub ttl_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self { ttl_secs: 3_600 }
    }
}

impl SessionSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
