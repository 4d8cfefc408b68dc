//! Application configuration loaded from files and environment

mod app_config;

pub use app_config::{
    AppConfig, CacheSettings, EmbeddingSettings, LlmSettings, LogFormat, LoggingConfig,
    RagSettings, SessionSettings, VectorSettings,
};
