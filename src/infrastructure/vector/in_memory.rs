//! In-memory vector index for development and testing

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::DomainError;
use crate::domain::embedding::cosine_similarity;
use crate::domain::vector::{CollectionInfo, CollectionSpec, IndexPoint, ScoredPoint, VectorIndex};

#[derive(Debug)]
struct StoredCollection {
    spec: CollectionSpec,
    points: Vec<IndexPoint>,
}

/// Brute-force cosine index kept in process memory
#[derive(Debug, Default)]
pub struct InMemoryVectorIndex {
    collections: RwLock<HashMap<String, StoredCollection>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn missing(collection: &str) -> DomainError {
        DomainError::vector_index(format!("Collection '{}' not found", collection))
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    fn index_type(&self) -> &'static str {
        "in_memory"
    }

    async fn list_collections(&self) -> Result<Vec<String>, DomainError> {
        let mut names: Vec<String> = self.collections.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn create_collection(&self, spec: &CollectionSpec) -> Result<(), DomainError> {
        let mut collections = self.collections.write().await;

        if collections.contains_key(&spec.name) {
            return Err(DomainError::vector_index(format!(
                "Collection '{}' already exists",
                spec.name
            )));
        }

        collections.insert(
            spec.name.clone(),
            StoredCollection {
                spec: spec.clone(),
                points: Vec::new(),
            },
        );
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: Vec<IndexPoint>) -> Result<usize, DomainError> {
        let mut collections = self.collections.write().await;
        let stored = collections
            .get_mut(collection)
            .ok_or_else(|| Self::missing(collection))?;

        if let Some(bad) = points
            .iter()
            .find(|p| p.vector.len() != stored.spec.dimensions)
        {
            return Err(DomainError::vector_index(format!(
                "Point {} has {} dimensions, collection expects {}",
                bad.id,
                bad.vector.len(),
                stored.spec.dimensions
            )));
        }

        let count = points.len();

        for point in points {
            match stored.points.iter_mut().find(|p| p.id == point.id) {
                Some(existing) => *existing = point,
                None => stored.points.push(point),
            }
        }

        Ok(count)
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, DomainError> {
        let collections = self.collections.read().await;
        let stored = collections
            .get(collection)
            .ok_or_else(|| Self::missing(collection))?;

        let mut scored: Vec<ScoredPoint> = stored
            .points
            .iter()
            .map(|point| ScoredPoint {
                id: point.id.clone(),
                score: cosine_similarity(&point.vector, vector),
                payload: Some(point.payload.clone()),
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(limit);

        Ok(scored)
    }

    async fn collection_info(&self, collection: &str) -> Result<CollectionInfo, DomainError> {
        let collections = self.collections.read().await;
        let stored = collections
            .get(collection)
            .ok_or_else(|| Self::missing(collection))?;

        Ok(CollectionInfo {
            points_count: stored.points.len() as u64,
            status: "green".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::vector::{ArticlePayload, PointId};

    fn point(id: u64, vector: Vec<f32>, title: &str) -> IndexPoint {
        IndexPoint {
            id: PointId::Num(id),
            vector,
            payload: ArticlePayload {
                title: title.to_string(),
                ..Default::default()
            },
        }
    }

    async fn seeded() -> InMemoryVectorIndex {
        let index = InMemoryVectorIndex::new();
        index
            .create_collection(&CollectionSpec::new("news", 2))
            .await
            .unwrap();
        index
            .upsert(
                "news",
                vec![
                    point(1, vec![1.0, 0.0], "east"),
                    point(2, vec![0.0, 1.0], "north"),
                    point(3, vec![0.7, 0.7], "north-east"),
                ],
            )
            .await
            .unwrap();
        index
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity() {
        let index = seeded().await;

        let results = index.search("news", &[1.0, 0.1], 2).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].payload.as_ref().unwrap().title, "east");
        assert_eq!(results[1].payload.as_ref().unwrap().title, "north-east");
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let index = seeded().await;

        index
            .upsert("news", vec![point(1, vec![0.0, 1.0], "moved")])
            .await
            .unwrap();

        let info = index.collection_info("news").await.unwrap();
        assert_eq!(info.points_count, 3);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let index = seeded().await;

        let result = index.upsert("news", vec![point(9, vec![1.0], "bad")]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_duplicate_collection_rejected() {
        let index = seeded().await;

        assert!(index.create_collection(&CollectionSpec::new("news", 2)).await.is_err());
        assert_eq!(index.list_collections().await.unwrap(), vec!["news"]);
    }

    #[tokio::test]
    async fn test_missing_collection() {
        let index = InMemoryVectorIndex::new();
        assert!(index.search("nope", &[1.0], 5).await.is_err());
        assert!(index.collection_info("nope").await.is_err());
    }
}
