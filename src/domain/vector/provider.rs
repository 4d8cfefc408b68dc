//! Vector index trait

use std::fmt::Debug;

use async_trait::async_trait;

use super::point::{CollectionInfo, CollectionSpec, IndexPoint, ScoredPoint};
use crate::domain::DomainError;

/// Remote vector index operations (Qdrant and compatible stores)
#[async_trait]
pub trait VectorIndex: Send + Sync + Debug {
    /// Get the index type name
    fn index_type(&self) -> &'static str;

    /// Names of the existing collections
    async fn list_collections(&self) -> Result<Vec<String>, DomainError>;

    /// Creates a collection; fails if it already exists
    async fn create_collection(&self, spec: &CollectionSpec) -> Result<(), DomainError>;

    /// Inserts or replaces points, returning how many were written
    async fn upsert(&self, collection: &str, points: Vec<IndexPoint>) -> Result<usize, DomainError>;

    /// Nearest points to `vector`, best match first
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, DomainError>;

    /// Point count and status of a collection
    async fn collection_info(&self, collection: &str) -> Result<CollectionInfo, DomainError>;
}
