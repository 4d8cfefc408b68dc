//! Content-addressed cache store
//!
//! Every read and write is keyed by `namespace prefix + truncated SHA-256` of
//! the content. Failures of the backing store never reach the caller: reads
//! degrade to a miss, writes and clears are logged and dropped.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::domain::cache::{
    Cache, CacheExt, CacheNamespace, ClearScope, ContentKeyGenerator, canonical_search_content,
};
use crate::domain::conversation::{CHAT_KEY_PREFIX, SESSION_KEY_PREFIX};
use crate::domain::rag::QueryResult;
use crate::domain::vector::SearchHit;
use crate::infrastructure::observability::{CacheOutcome, record_cache_lookup};

/// TTL policy per namespace
#[derive(Debug, Clone, PartialEq)]
pub struct CacheTtls {
    pub embedding: Duration,
    pub query: Duration,
    /// Used for the "nothing found" query result
    pub negative_query: Duration,
    pub search: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            embedding: Duration::from_secs(24 * 3600),
            query: Duration::from_secs(3600),
            negative_query: Duration::from_secs(1800),
            search: Duration::from_secs(1800),
        }
    }
}

/// Key counts per namespace
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub total_keys: usize,
    pub embeddings: usize,
    pub queries: usize,
    pub searches: usize,
    pub sessions: usize,
    pub chat_histories: usize,
}

/// Fail-soft cache facade used by the query pipeline
#[derive(Debug)]
pub struct ContentCacheService {
    cache: Arc<dyn Cache>,
    keys: ContentKeyGenerator,
    ttls: CacheTtls,
}

impl ContentCacheService {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self::with_ttls(cache, CacheTtls::default())
    }

    pub fn with_ttls(cache: Arc<dyn Cache>, ttls: CacheTtls) -> Self {
        Self {
            cache,
            keys: ContentKeyGenerator::new(),
            ttls,
        }
    }

    pub fn ttls(&self) -> &CacheTtls {
        &self.ttls
    }

    /// Derived key of `content` in `namespace`
    pub fn key(&self, namespace: CacheNamespace, content: &str) -> String {
        self.keys.generate(namespace, content)
    }

    /// Reads a value; any store or decoding error is reported as a miss
    pub async fn get<V>(&self, namespace: CacheNamespace, content: &str) -> Option<V>
    where
        V: DeserializeOwned + Send,
    {
        let key = self.key(namespace, content);

        match self.cache.get::<V>(&key).await {
            Ok(Some(value)) => {
                debug!(namespace = %namespace, key = %key, "Cache hit");
                record_cache_lookup(namespace, CacheOutcome::Hit, 1);
                Some(value)
            }
            Ok(None) => {
                debug!(namespace = %namespace, key = %key, "Cache miss");
                record_cache_lookup(namespace, CacheOutcome::Miss, 1);
                None
            }
            Err(e) => {
                warn!(namespace = %namespace, key = %key, error = %e, "Cache read failed, treating as miss");
                record_cache_lookup(namespace, CacheOutcome::Error, 1);
                None
            }
        }
    }

    /// Writes a value; failures are logged and swallowed
    pub async fn set<V>(&self, namespace: CacheNamespace, content: &str, value: &V, ttl: Duration)
    where
        V: Serialize + Send + Sync,
    {
        let key = self.key(namespace, content);

        if let Err(e) = self.cache.set(&key, value, ttl).await {
            warn!(namespace = %namespace, key = %key, error = %e, "Cache write failed");
        }
    }

    /// Reads several values in one round trip, aligned with `contents`
    pub async fn get_many<V>(&self, namespace: CacheNamespace, contents: &[String]) -> Vec<Option<V>>
    where
        V: DeserializeOwned,
    {
        if contents.is_empty() {
            return Vec::new();
        }

        let keys: Vec<String> = contents.iter().map(|c| self.key(namespace, c)).collect();

        let raw = match self.cache.get_many_raw(&keys).await {
            Ok(raw) if raw.len() == keys.len() => raw,
            Ok(raw) => {
                warn!(
                    namespace = %namespace,
                    expected = keys.len(),
                    received = raw.len(),
                    "Batched cache read returned misaligned values"
                );
                record_cache_lookup(namespace, CacheOutcome::Error, keys.len() as u64);
                return contents.iter().map(|_| None).collect();
            }
            Err(e) => {
                warn!(namespace = %namespace, error = %e, "Batched cache read failed, treating as misses");
                record_cache_lookup(namespace, CacheOutcome::Error, keys.len() as u64);
                return contents.iter().map(|_| None).collect();
            }
        };

        let values: Vec<Option<V>> = raw
            .into_iter()
            .zip(&keys)
            .map(|(data, key)| {
                data.and_then(|data| match serde_json::from_str(&data) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                        None
                    }
                })
            })
            .collect();

        let hits = values.iter().filter(|v| v.is_some()).count() as u64;
        record_cache_lookup(namespace, CacheOutcome::Hit, hits);
        record_cache_lookup(namespace, CacheOutcome::Miss, values.len() as u64 - hits);
        debug!(namespace = %namespace, requested = values.len(), hits, "Batched cache read");

        values
    }

    /// Removes every key of the scope, returning how many were deleted
    ///
    /// Conversation keys are never touched, even for [`ClearScope::All`].
    pub async fn clear(&self, scope: ClearScope) -> usize {
        let mut removed = 0;

        for namespace in scope.namespaces() {
            match self.cache.delete_pattern(&namespace.pattern()).await {
                Ok(count) => removed += count,
                Err(e) => warn!(namespace = %namespace, error = %e, "Cache clear failed"),
            }
        }

        debug!(scope = %scope, removed, "Cleared cache");
        removed
    }

    /// Key counts, or `None` when the store cannot be reached
    pub async fn stats(&self) -> Option<CacheStats> {
        match self.collect_stats().await {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!(error = %e, "Failed to collect cache stats");
                None
            }
        }
    }

    async fn collect_stats(&self) -> Result<CacheStats, crate::domain::DomainError> {
        Ok(CacheStats {
            total_keys: self.cache.count_pattern("*").await?,
            embeddings: self
                .cache
                .count_pattern(&CacheNamespace::Embedding.pattern())
                .await?,
            queries: self.cache.count_pattern(&CacheNamespace::Query.pattern()).await?,
            searches: self.cache.count_pattern(&CacheNamespace::Search.pattern()).await?,
            sessions: self
                .cache
                .count_pattern(&format!("{}*", SESSION_KEY_PREFIX))
                .await?,
            chat_histories: self
                .cache
                .count_pattern(&format!("{}*", CHAT_KEY_PREFIX))
                .await?,
        })
    }

    pub async fn health_check(&self) -> bool {
        match self.cache.ping().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Cache health check failed");
                false
            }
        }
    }

    // Typed accessors per namespace

    pub async fn get_embedding(&self, text: &str) -> Option<Vec<f32>> {
        self.get(CacheNamespace::Embedding, text).await
    }

    pub async fn set_embedding(&self, text: &str, vector: &[f32]) {
        self.set(CacheNamespace::Embedding, text, &vector, self.ttls.embedding)
            .await
    }

    pub async fn get_embeddings(&self, texts: &[String]) -> Vec<Option<Vec<f32>>> {
        self.get_many(CacheNamespace::Embedding, texts).await
    }

    pub async fn get_query_result(&self, query: &str) -> Option<QueryResult> {
        self.get(CacheNamespace::Query, query).await
    }

    pub async fn set_query_result(&self, query: &str, result: &QueryResult, ttl: Duration) {
        self.set(CacheNamespace::Query, query, result, ttl).await
    }

    pub async fn get_search_results(&self, vector: &[f32], limit: usize) -> Option<Vec<SearchHit>> {
        self.get(CacheNamespace::Search, &canonical_search_content(vector, limit))
            .await
    }

    pub async fn set_search_results(&self, vector: &[f32], limit: usize, hits: &[SearchHit]) {
        self.set(
            CacheNamespace::Search,
            &canonical_search_content(vector, limit),
            &hits,
            self.ttls.search,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::MockCache;
    use crate::domain::rag::Source;

    fn service(cache: Arc<MockCache>) -> ContentCacheService {
        ContentCacheService::new(cache)
    }

    #[tokio::test]
    async fn test_set_then_get_uses_derived_key() {
        let cache = Arc::new(MockCache::new());
        let service = service(cache.clone());

        service.set_embedding("hello", &[0.1, 0.2]).await;

        assert_eq!(cache.keys(), vec!["embedding:2cf24dba5fb0a30e".to_string()]);
        assert_eq!(service.get_embedding("hello").await, Some(vec![0.1, 0.2]));
        assert_eq!(
            cache.ttl("embedding:2cf24dba5fb0a30e").await.unwrap(),
            Some(Duration::from_secs(86_400))
        );
    }

    #[tokio::test]
    async fn test_same_text_different_namespaces_do_not_collide() {
        let service = service(Arc::new(MockCache::new()));

        assert_ne!(
            service.key(CacheNamespace::Embedding, "x"),
            service.key(CacheNamespace::Query, "x")
        );
        assert_eq!(
            service.key(CacheNamespace::Query, "x"),
            service.key(CacheNamespace::Query, "x")
        );
    }

    #[tokio::test]
    async fn test_read_failure_is_a_miss() {
        let service = service(Arc::new(MockCache::new().with_error("connection refused")));

        assert!(service.get_embedding("hello").await.is_none());
        assert!(service.get_query_result("q").await.is_none());
    }

    #[tokio::test]
    async fn test_write_failure_is_swallowed() {
        let cache = Arc::new(MockCache::new().with_error("read-only replica"));
        let service = service(cache.clone());

        service
            .set_query_result("q", &QueryResult::no_results(), Duration::from_secs(5))
            .await;

        cache.set_error(None);
        assert!(cache.keys().is_empty());
    }

    #[tokio::test]
    async fn test_get_many_is_one_batched_read() {
        let cache = Arc::new(MockCache::new());
        let service = service(cache.clone());
        service.set_embedding("b", &[2.0]).await;

        let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let values = service.get_embeddings(&texts).await;

        assert_eq!(values, vec![None, Some(vec![2.0]), None]);
        assert_eq!(cache.batch_reads(), 1);
        assert_eq!(cache.reads(), 0);
    }

    #[tokio::test]
    async fn test_get_many_failure_returns_all_misses() {
        let service = service(Arc::new(MockCache::new().with_error("down")));
        let texts = vec!["a".to_string(), "b".to_string()];

        let values = service.get_embeddings(&texts).await;
        assert_eq!(values, vec![None, None]);
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_a_miss() {
        let cache = Arc::new(MockCache::new());
        let service = service(cache.clone());
        let key = service.key(CacheNamespace::Embedding, "a");
        cache
            .set_raw(&key, "\"not a vector\"", Duration::from_secs(60))
            .await
            .unwrap();

        assert!(service.get_embedding("a").await.is_none());
        assert_eq!(service.get_embeddings(&["a".to_string()]).await, vec![None]);
    }

    #[tokio::test]
    async fn test_search_results_keyed_by_vector_and_limit() {
        let service = service(Arc::new(MockCache::new()));
        let hits = vec![SearchHit {
            document_id: "1".to_string(),
            score: 0.9,
            title: "t".to_string(),
            content: "c".to_string(),
            url: "u".to_string(),
            published_at: None,
            source: None,
            summary: None,
        }];

        service.set_search_results(&[0.5, 0.25], 5, &hits).await;

        assert_eq!(service.get_search_results(&[0.5, 0.25], 5).await, Some(hits));
        assert!(service.get_search_results(&[0.5, 0.25], 3).await.is_none());
        assert!(service.get_search_results(&[0.5, 0.26], 5).await.is_none());
    }

    #[tokio::test]
    async fn test_query_result_round_trip_with_custom_ttl() {
        let cache = Arc::new(MockCache::new());
        let service = service(cache.clone());
        let result = QueryResult::new(
            "answer",
            vec![Source {
                title: "t".to_string(),
                url: "u".to_string(),
                source: None,
                published_at: None,
                relevance_score: 0.7,
            }],
            1,
        );

        service
            .set_query_result("q", &result, Duration::from_secs(42))
            .await;

        assert_eq!(service.get_query_result("q").await, Some(result));
        let key = service.key(CacheNamespace::Query, "q");
        assert_eq!(cache.ttl(&key).await.unwrap(), Some(Duration::from_secs(42)));
    }

    #[tokio::test]
    async fn test_clear_scopes() {
        let cache = Arc::new(
            MockCache::new()
                .with_entry("embedding:1", &1, None)
                .with_entry("query:1", &1, None)
                .with_entry("query:2", &1, None)
                .with_entry("search:1", &1, None)
                .with_entry("session:s1", &1, None),
        );
        let service = service(cache.clone());

        assert_eq!(service.clear("queries".parse().unwrap()).await, 2);
        assert_eq!(service.clear(ClearScope::All).await, 2);
        assert_eq!(cache.keys(), vec!["session:s1".to_string()]);
    }

    #[tokio::test]
    async fn test_clear_failure_returns_zero() {
        let service = service(Arc::new(MockCache::new().with_error("down")));
        assert_eq!(service.clear(ClearScope::All).await, 0);
    }

    #[tokio::test]
    async fn test_stats() {
        let cache = Arc::new(
            MockCache::new()
                .with_entry("embedding:1", &1, None)
                .with_entry("embedding:2", &1, None)
                .with_entry("query:1", &1, None)
                .with_entry("session:s1", &1, None),
        );
        cache.list_push("chat:s1", "{}").await.unwrap();
        let service = service(cache);

        let stats = service.stats().await.unwrap();
        assert_eq!(stats.embeddings, 2);
        assert_eq!(stats.queries, 1);
        assert_eq!(stats.searches, 0);
        assert_eq!(stats.sessions, 1);
        assert_eq!(stats.chat_histories, 1);
        assert_eq!(stats.total_keys, 5);
    }

    #[tokio::test]
    async fn test_stats_and_health_when_unreachable() {
        let service = service(Arc::new(MockCache::new().with_error("down")));

        assert!(service.stats().await.is_none());
        assert!(!service.health_check().await);
    }

    #[tokio::test]
    async fn test_health_check() {
        assert!(service(Arc::new(MockCache::new())).health_check().await);
    }
}
