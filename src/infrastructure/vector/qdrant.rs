//! Qdrant vector index over its REST API

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::domain::DomainError;
use crate::domain::vector::{CollectionInfo, CollectionSpec, IndexPoint, ScoredPoint, VectorIndex};
use crate::infrastructure::llm::HttpClientTrait;

pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6333";

/// Qdrant REST client
#[derive(Debug)]
pub struct QdrantIndex<C: HttpClientTrait> {
    client: C,
    base_url: String,
    api_key: Option<String>,
}

impl<C: HttpClientTrait> QdrantIndex<C> {
    pub fn new(client: C, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let api_key = api_key.into();
        self.api_key = (!api_key.is_empty()).then_some(api_key);
        self
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        let mut headers = vec![("Content-Type", "application/json")];

        if let Some(key) = &self.api_key {
            headers.push(("api-key", key.as_str()));
        }

        headers
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/collections/{}", self.base_url, collection)
    }

    fn unwrap_result<T: DeserializeOwned>(json: serde_json::Value) -> Result<T, DomainError> {
        let envelope: QdrantEnvelope<T> = serde_json::from_value(json).map_err(|e| {
            DomainError::vector_index(format!("Failed to parse Qdrant response: {}", e))
        })?;

        Ok(envelope.result)
    }
}

fn index_error(e: DomainError) -> DomainError {
    match e {
        DomainError::Provider { message, .. } => DomainError::vector_index(message),
        other => other,
    }
}

#[async_trait]
impl<C: HttpClientTrait> VectorIndex for QdrantIndex<C> {
    fn index_type(&self) -> &'static str {
        "qdrant"
    }

    async fn list_collections(&self) -> Result<Vec<String>, DomainError> {
        let url = format!("{}/collections", self.base_url);
        let json = self
            .client
            .get_json(&url, self.headers())
            .await
            .map_err(index_error)?;

        let result: QdrantCollections = Self::unwrap_result(json)?;
        Ok(result.collections.into_iter().map(|c| c.name).collect())
    }

    async fn create_collection(&self, spec: &CollectionSpec) -> Result<(), DomainError> {
        let body = serde_json::json!({
            "vectors": {
                "size": spec.dimensions,
                "distance": spec.metric.as_str(),
            }
        });

        self.client
            .put_json(&self.collection_url(&spec.name), self.headers(), &body)
            .await
            .map_err(index_error)?;

        debug!(collection = %spec.name, dimensions = spec.dimensions, "Created Qdrant collection");
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: Vec<IndexPoint>) -> Result<usize, DomainError> {
        if points.is_empty() {
            return Ok(0);
        }

        let count = points.len();
        let url = format!("{}/points?wait=true", self.collection_url(collection));
        let body = serde_json::json!({ "points": points });

        self.client
            .put_json(&url, self.headers(), &body)
            .await
            .map_err(index_error)?;

        Ok(count)
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, DomainError> {
        let url = format!("{}/points/search", self.collection_url(collection));
        let body = serde_json::json!({
            "vector": vector,
            "limit": limit,
            "with_payload": true,
        });

        let json = self
            .client
            .post_json(&url, self.headers(), &body)
            .await
            .map_err(index_error)?;

        Self::unwrap_result(json)
    }

    async fn collection_info(&self, collection: &str) -> Result<CollectionInfo, DomainError> {
        let json = self
            .client
            .get_json(&self.collection_url(collection), self.headers())
            .await
            .map_err(index_error)?;

        let result: QdrantCollectionInfo = Self::unwrap_result(json)?;

        Ok(CollectionInfo {
            points_count: result.points_count.unwrap_or(0),
            status: result.status,
        })
    }
}

// Qdrant API types

#[derive(Debug, Deserialize)]
struct QdrantEnvelope<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct QdrantCollections {
    collections: Vec<QdrantCollectionName>,
}

#[derive(Debug, Deserialize)]
struct QdrantCollectionName {
    name: String,
}

#[derive(Debug, Deserialize)]
struct QdrantCollectionInfo {
    status: String,
    points_count: Option<u64>,
}
