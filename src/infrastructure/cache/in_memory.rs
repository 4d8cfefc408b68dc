//! In-memory cache implementation using moka

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache as MokaCache;
use tokio::sync::Mutex;

use crate::domain::DomainError;
use crate::domain::cache::{Cache, glob_to_regex};

/// Configuration for in-memory cache
#[derive(Debug, Clone)]
pub struct InMemoryCacheConfig {
    /// Maximum number of entries
    pub max_capacity: u64,
}

impl Default for InMemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
        }
    }
}

impl InMemoryCacheConfig {
    /// Creates a new configuration with specified max capacity
    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = capacity;
        self
    }
}

#[derive(Debug, Clone)]
enum StoredValue {
    Text(String),
    List(Vec<String>),
}

/// Cache entry stored in moka
#[derive(Debug, Clone)]
struct CacheEntry {
    value: StoredValue,
    /// Expiration timestamp (millis since epoch), `None` for persistent keys
    expires_at: Option<u64>,
}

impl CacheEntry {
    fn is_expired(&self, now: u64) -> bool {
        matches!(self.expires_at, Some(at) if now >= at)
    }

    fn remaining(&self, now: u64) -> Option<Duration> {
        self.expires_at
            .map(|at| Duration::from_millis(at.saturating_sub(now)))
    }
}

/// Hands each entry's own deadline to moka so expired entries are evicted
/// without being read and stop counting against the capacity
struct EntryExpiry;

impl Expiry<String, CacheEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.remaining(InMemoryCache::current_time_millis())
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.remaining(InMemoryCache::current_time_millis())
    }
}

/// Thread-safe in-memory store with per-entry TTL and append-only lists
///
/// moka evicts entries once their deadline passes; reads still check the
/// deadline because eviction runs on moka's maintenance schedule. Every
/// write (plain sets, deletes, list appends, TTL updates) is serialized
/// through a single mutex so read-modify-write steps cannot be undone.
#[derive(Debug)]
pub struct InMemoryCache {
    cache: MokaCache<String, CacheEntry>,
    write_lock: Mutex<()>,
}

impl InMemoryCache {
    /// Creates a new in-memory cache with default configuration
    pub fn new() -> Self {
        Self::with_config(InMemoryCacheConfig::default())
    }

    /// Creates a new in-memory cache with the given configuration
    pub fn with_config(config: InMemoryCacheConfig) -> Self {
        let cache = MokaCache::builder()
            .max_capacity(config.max_capacity)
            .expire_after(EntryExpiry)
            .build();

        Self {
            cache,
            write_lock: Mutex::new(()),
        }
    }

    fn current_time_millis() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    fn deadline(ttl: Duration) -> u64 {
        Self::current_time_millis() + ttl.as_millis() as u64
    }

    /// Returns the live entry for `key`, dropping it if expired
    async fn live_entry(&self, key: &str) -> Option<CacheEntry> {
        let entry = self.cache.get(key).await?;

        if entry.is_expired(Self::current_time_millis()) {
            self.cache.remove(key).await;
            return None;
        }

        Some(entry)
    }

    async fn matching_keys(&self, pattern: &str) -> Result<Vec<String>, DomainError> {
        let regex = glob_to_regex(pattern)?;

        self.cache.run_pending_tasks().await;

        let cache_clone = self.cache.clone();
        let now = Self::current_time_millis();

        tokio::task::spawn_blocking(move || {
            cache_clone
                .iter()
                .filter(|(_, entry)| !entry.is_expired(now))
                .filter_map(|(k, _)| {
                    let key_str: &str = k.as_ref();
                    regex.is_match(key_str).then(|| key_str.to_string())
                })
                .collect()
        })
        .await
        .map_err(|e| DomainError::cache(format!("Failed to iterate cache: {}", e)))
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError> {
        match self.live_entry(key).await {
            Some(CacheEntry {
                value: StoredValue::Text(data),
                ..
            }) => Ok(Some(data)),
            Some(_) => Err(DomainError::cache(format!(
                "Key '{}' does not hold a string value",
                key
            ))),
            None => Ok(None),
        }
    }

    async fn get_many_raw(&self, keys: &[String]) -> Result<Vec<Option<String>>, DomainError> {
        let mut values = Vec::with_capacity(keys.len());

        for key in keys {
            let value = match self.live_entry(key).await {
                Some(CacheEntry {
                    value: StoredValue::Text(data),
                    ..
                }) => Some(data),
                _ => None,
            };
            values.push(value);
        }

        Ok(values)
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError> {
        let entry = CacheEntry {
            value: StoredValue::Text(value.to_string()),
            expires_at: Some(Self::deadline(ttl)),
        };

        let _guard = self.write_lock.lock().await;
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        let _guard = self.write_lock.lock().await;
        let existed = self.live_entry(key).await.is_some();
        self.cache.remove(key).await;
        Ok(existed)
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<usize, DomainError> {
        let keys_to_delete = self.matching_keys(pattern).await?;
        let _guard = self.write_lock.lock().await;
        let mut deleted = 0;

        for key in keys_to_delete {
            if self.cache.remove(&key).await.is_some() {
                deleted += 1;
            }
        }

        Ok(deleted)
    }

    async fn count_pattern(&self, pattern: &str) -> Result<usize, DomainError> {
        Ok(self.matching_keys(pattern).await?.len())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, DomainError> {
        let _guard = self.write_lock.lock().await;

        match self.live_entry(key).await {
            Some(mut entry) => {
                entry.expires_at = Some(Self::deadline(ttl));
                self.cache.insert(key.to_string(), entry).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, DomainError> {
        let now = Self::current_time_millis();

        Ok(self
            .live_entry(key)
            .await
            .and_then(|entry| entry.remaining(now)))
    }

    async fn list_push(&self, key: &str, value: &str) -> Result<usize, DomainError> {
        let _guard = self.write_lock.lock().await;

        let mut entry = self.live_entry(key).await.unwrap_or(CacheEntry {
            value: StoredValue::List(Vec::new()),
            expires_at: None,
        });

        let len = match &mut entry.value {
            StoredValue::List(items) => {
                items.push(value.to_string());
                items.len()
            }
            StoredValue::Text(_) => {
                return Err(DomainError::cache(format!(
                    "Key '{}' does not hold a list",
                    key
                )));
            }
        };

        self.cache.insert(key.to_string(), entry).await;
        Ok(len)
    }

    async fn list_range(&self, key: &str) -> Result<Vec<String>, DomainError> {
        match self.live_entry(key).await {
            Some(CacheEntry {
                value: StoredValue::List(items),
                ..
            }) => Ok(items),
            Some(_) => Err(DomainError::cache(format!(
                "Key '{}' does not hold a list",
                key
            ))),
            None => Ok(Vec::new()),
        }
    }

    async fn ping(&self) -> Result<(), DomainError> {
        Ok(())
    }
}
