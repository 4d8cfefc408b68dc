//! Embedding resolver
//!
//! Cache-aside lookups in front of the remote embedding provider. Batches
//! are split into cached and missing texts; only the missing ones are sent,
//! in a single provider call, and each fresh vector is written back.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::ContentCacheService;
use crate::domain::embedding::{EmbeddingProvider, EmbeddingRequest};
use crate::domain::DomainError;
use crate::infrastructure::observability::record_provider_call;

/// Popular queries warmed when no explicit texts are given
pub const DEFAULT_WARM_QUERIES: [&str; 10] = [
    "latest news today",
    "breaking news",
    "technology updates",
    "political developments",
    "business news",
    "sports news",
    "health news",
    "climate change news",
    "economic updates",
    "international news",
];

const HEALTH_PROBE_TEXT: &str = "health check";

/// Linear backoff: the wait after failed attempt `n` is `base_delay * n`
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay after the given failed attempt (1-indexed)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Resolves texts to vectors through the cache and the provider
#[derive(Debug)]
pub struct EmbeddingService {
    provider: Arc<dyn EmbeddingProvider>,
    cache: Arc<ContentCacheService>,
    model: String,
    retry: RetryPolicy,
}

impl EmbeddingService {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, cache: Arc<ContentCacheService>) -> Self {
        let model = provider.default_model().to_string();

        Self {
            provider,
            cache,
            model,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Vector size produced by the configured model, when the provider knows it
    pub fn dimensions(&self) -> Option<usize> {
        self.provider.dimensions(&self.model)
    }

    /// Vector for one text; served from the cache when present
    pub async fn resolve(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        validate_text(text)?;

        if let Some(vector) = self.cache.get_embedding(text).await {
            return Ok(vector);
        }

        let vector = self
            .embed_remote(vec![text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| DomainError::internal("Provider returned no embedding"))?;

        self.cache.set_embedding(text, &vector).await;
        Ok(vector)
    }

    /// Vectors for many texts, aligned with the input order
    ///
    /// One batched cache read and at most one provider call.
    pub async fn resolve_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        for text in texts {
            validate_text(text)?;
        }

        let mut vectors = self.cache.get_embeddings(texts).await;

        let missing: Vec<usize> = vectors
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_none())
            .map(|(idx, _)| idx)
            .collect();

        debug!(
            requested = texts.len(),
            cached = texts.len() - missing.len(),
            missing = missing.len(),
            "Resolving embedding batch"
        );

        if !missing.is_empty() {
            let missing_texts: Vec<String> = missing.iter().map(|&idx| texts[idx].clone()).collect();
            let fresh = self.embed_remote(missing_texts).await?;

            for (&idx, vector) in missing.iter().zip(fresh) {
                self.cache.set_embedding(&texts[idx], &vector).await;
                vectors[idx] = Some(vector);
            }
        }

        vectors
            .into_iter()
            .map(|v| v.ok_or_else(|| DomainError::internal("Embedding batch left a gap")))
            .collect()
    }

    /// Pre-computes embeddings; an empty list warms the default popular queries
    pub async fn warm(&self, texts: &[String]) -> Result<usize, DomainError> {
        let texts: Vec<String> = if texts.is_empty() {
            DEFAULT_WARM_QUERIES.iter().map(|t| t.to_string()).collect()
        } else {
            texts.to_vec()
        };

        let vectors = self.resolve_batch(&texts).await?;
        info!(count = vectors.len(), "Warmed embedding cache");

        Ok(vectors.len())
    }

    /// Resolves a probe text end to end
    pub async fn health_check(&self) -> bool {
        match self.resolve(HEALTH_PROBE_TEXT).await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Embedding health check failed");
                false
            }
        }
    }

    async fn embed_remote(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, DomainError> {
        let provider = self.provider.provider_name();
        let expected = texts.len();
        let mut attempt = 1;

        loop {
            let request = EmbeddingRequest::batch(self.model.clone(), texts.clone());
            let start = Instant::now();

            let result = self.provider.embed(request).await.and_then(|response| {
                response
                    .into_ordered_vectors(expected)
                    .map_err(|message| DomainError::provider(provider, message))
            });
            record_provider_call(provider, result.is_ok(), start.elapsed());

            match result {
                Ok(vectors) => return Ok(vectors),
                Err(e) if attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(
                        provider,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Embedding request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(provider, attempts = attempt, error = %e, "Embedding request failed");
                    return Err(e);
                }
            }
        }
    }
}

fn validate_text(text: &str) -> Result<(), DomainError> {
    if text.trim().is_empty() {
        return Err(DomainError::validation("Text to embed must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::MockCache;
    use crate::domain::embedding::MockEmbeddingProvider;

    struct Fixture {
        provider: Arc<MockEmbeddingProvider>,
        cache: Arc<MockCache>,
        service: EmbeddingService,
    }

    fn fixture(provider: MockEmbeddingProvider) -> Fixture {
        let provider = Arc::new(provider);
        let cache = Arc::new(MockCache::new());
        let service = EmbeddingService::new(
            provider.clone(),
            Arc::new(ContentCacheService::new(cache.clone())),
        )
        .with_retry(RetryPolicy::new(3, Duration::ZERO));

        Fixture {
            provider,
            cache,
            service,
        }
    }

    fn strings(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.delay_after(1), Duration::from_secs(1));
        assert_eq!(policy.delay_after(2), Duration::from_secs(2));
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_resolve_caches_result() {
        let f = fixture(MockEmbeddingProvider::new("mock", 4));

        let first = f.service.resolve("inflation outlook").await.unwrap();
        let second = f.service.resolve("inflation outlook").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first, f.provider.vector_for("inflation outlook"));
        assert_eq!(f.provider.calls(), 1);
        assert_eq!(f.cache.writes(), 1);
    }

    #[tokio::test]
    async fn test_resolve_rejects_empty_text_before_any_call() {
        let f = fixture(MockEmbeddingProvider::new("mock", 4));

        let err = f.service.resolve("   ").await.unwrap_err();

        assert!(err.is_validation());
        assert_eq!(f.provider.calls(), 0);
        assert_eq!(f.cache.reads(), 0);
    }

    #[tokio::test]
    async fn test_resolve_retries_transient_failures() {
        let f = fixture(MockEmbeddingProvider::new("mock", 4).failing_times(2));

        let vector = f.service.resolve("markets").await.unwrap();

        assert_eq!(vector.len(), 4);
        assert_eq!(f.provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_resolve_gives_up_after_max_attempts() {
        let f = fixture(MockEmbeddingProvider::new("mock", 4).with_error("HTTP 500"));

        let err = f.service.resolve("markets").await.unwrap_err();

        assert!(matches!(err, DomainError::Provider { .. }));
        assert_eq!(f.provider.calls(), 3);
        assert_eq!(f.cache.writes(), 0);
    }

    #[tokio::test]
    async fn test_resolve_works_when_cache_is_down() {
        let f = fixture(MockEmbeddingProvider::new("mock", 4));
        f.cache.set_error(Some("connection refused".to_string()));

        let vector = f.service.resolve("markets").await.unwrap();

        assert_eq!(vector, f.provider.vector_for("markets"));
        assert_eq!(f.provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_resolve_batch_only_sends_missing_texts() {
        let f = fixture(MockEmbeddingProvider::new("mock", 4));
        f.service.resolve("b").await.unwrap();

        let texts = strings(&["a", "b", "c"]);
        let vectors = f.service.resolve_batch(&texts).await.unwrap();

        assert_eq!(vectors.len(), 3);
        for (text, vector) in texts.iter().zip(&vectors) {
            assert_eq!(vector, &f.provider.vector_for(text));
        }
        assert_eq!(f.provider.calls(), 2);
        assert_eq!(f.provider.requests()[1], strings(&["a", "c"]));
        assert_eq!(f.cache.batch_reads(), 1);
        assert_eq!(f.cache.writes(), 3);
    }

    #[tokio::test]
    async fn test_resolve_batch_fully_cached_makes_no_call() {
        let f = fixture(MockEmbeddingProvider::new("mock", 4));
        let texts = strings(&["a", "b"]);
        f.service.resolve_batch(&texts).await.unwrap();

        let again = f.service.resolve_batch(&texts).await.unwrap();

        assert_eq!(again.len(), 2);
        assert_eq!(f.provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_resolve_batch_reorders_by_index() {
        let f = fixture(MockEmbeddingProvider::new("mock", 4).with_reversed_response());
        let texts = strings(&["first", "second", "third"]);

        let vectors = f.service.resolve_batch(&texts).await.unwrap();

        assert_eq!(vectors[0], f.provider.vector_for("first"));
        assert_eq!(vectors[2], f.provider.vector_for("third"));
    }

    #[tokio::test]
    async fn test_resolve_batch_empty_input() {
        let f = fixture(MockEmbeddingProvider::new("mock", 4));

        assert!(f.service.resolve_batch(&[]).await.unwrap().is_empty());
        assert_eq!(f.cache.batch_reads(), 0);
        assert_eq!(f.provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_warm_defaults_to_popular_queries() {
        let f = fixture(MockEmbeddingProvider::new("mock", 4));

        let warmed = f.service.warm(&[]).await.unwrap();

        assert_eq!(warmed, DEFAULT_WARM_QUERIES.len());
        assert_eq!(f.provider.requests()[0][0], "latest news today");
        assert_eq!(f.cache.keys().len(), DEFAULT_WARM_QUERIES.len());
    }

    #[tokio::test]
    async fn test_warm_explicit_texts() {
        let f = fixture(MockEmbeddingProvider::new("mock", 4));

        let warmed = f.service.warm(&strings(&["one", "two"])).await.unwrap();

        assert_eq!(warmed, 2);
        assert_eq!(f.provider.requests(), vec![strings(&["one", "two"])]);
    }

    #[tokio::test]
    async fn test_health_check() {
        let healthy = fixture(MockEmbeddingProvider::new("mock", 4));
        let failing = fixture(MockEmbeddingProvider::new("mock", 4).with_error("down"));

        assert!(healthy.service.health_check().await);
        assert!(!failing.service.health_check().await);
        assert_eq!(healthy.service.dimensions(), Some(4));
        assert_eq!(healthy.service.model(), "mock-embedding");
    }

    mod order_props {
        use super::*;
        use proptest::prelude::*;

        fn arb_texts() -> impl Strategy<Value = Vec<String>> {
            proptest::collection::hash_set("[a-z]{1,8}( [a-z]{1,8}){0,2}", 1..10)
                .prop_map(|set| set.into_iter().collect())
        }

        proptest! {
            /// Output order follows input order for any hit pattern and any
            /// provider response order
            #[test]
            fn prop_resolve_batch_preserves_input_order(
                texts in arb_texts(),
                mask in proptest::collection::vec(any::<bool>(), 10),
                reversed in any::<bool>(),
            ) {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .unwrap();

                let provider = MockEmbeddingProvider::new("mock", 4);
                let provider = if reversed { provider.with_reversed_response() } else { provider };
                let f = fixture(provider);

                let (vectors, precache_calls) = runtime.block_on(async {
                    for (text, cached) in texts.iter().zip(&mask) {
                        if *cached {
                            f.service.resolve(text).await.unwrap();
                        }
                    }
                    let precache_calls = f.provider.calls();
                    (f.service.resolve_batch(&texts).await.unwrap(), precache_calls)
                });

                prop_assert_eq!(vectors.len(), texts.len());
                for (text, vector) in texts.iter().zip(&vectors) {
                    prop_assert_eq!(vector, &f.provider.vector_for(text));
                }

                let any_missing = texts.iter().zip(&mask).any(|(_, cached)| !cached);
                let batch_calls = f.provider.calls() - precache_calls;
                prop_assert_eq!(batch_calls, usize::from(any_missing));
            }
        }
    }
}
