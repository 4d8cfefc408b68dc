//! Similarity search gateway over the news collection

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::domain::vector::{CollectionInfo, CollectionSpec, IndexPoint, SearchHit, VectorIndex};
use crate::domain::DomainError;
use crate::infrastructure::observability::record_provider_call;

/// Thin wrapper binding a vector index to one collection
#[derive(Debug)]
pub struct SearchGateway {
    index: Arc<dyn VectorIndex>,
    collection: CollectionSpec,
}

impl SearchGateway {
    pub fn new(index: Arc<dyn VectorIndex>, collection: CollectionSpec) -> Self {
        Self { index, collection }
    }

    pub fn collection(&self) -> &CollectionSpec {
        &self.collection
    }

    /// Creates the collection unless it already exists; returns whether it was created
    pub async fn initialize(&self) -> Result<bool, DomainError> {
        let existing = self.index.list_collections().await?;

        if existing.iter().any(|name| name == &self.collection.name) {
            debug!(collection = %self.collection.name, "Collection already exists");
            return Ok(false);
        }

        self.index.create_collection(&self.collection).await?;
        info!(
            collection = %self.collection.name,
            dimensions = self.collection.dimensions,
            metric = %self.collection.metric,
            "Created collection"
        );

        Ok(true)
    }

    /// Nearest documents to `vector`, best first; errors propagate
    pub async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<SearchHit>, DomainError> {
        if vector.is_empty() {
            return Err(DomainError::validation("Search vector must not be empty"));
        }
        if limit == 0 {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let result = self
            .index
            .search(&self.collection.name, vector, limit)
            .await;
        record_provider_call(self.index.index_type(), result.is_ok(), start.elapsed());

        let hits: Vec<SearchHit> = result?.into_iter().map(SearchHit::from).collect();
        debug!(collection = %self.collection.name, limit, found = hits.len(), "Similarity search");

        Ok(hits)
    }

    /// Stores prepared points, returning how many were written
    pub async fn upsert(&self, points: Vec<IndexPoint>) -> Result<usize, DomainError> {
        if points.is_empty() {
            return Ok(0);
        }

        if let Some(point) = points
            .iter()
            .find(|p| p.vector.len() != self.collection.dimensions)
        {
            return Err(DomainError::validation(format!(
                "Point {} has {} dimensions, collection expects {}",
                point.id,
                point.vector.len(),
                self.collection.dimensions
            )));
        }

        let written = self.index.upsert(&self.collection.name, points).await?;
        info!(collection = %self.collection.name, written, "Upserted points");

        Ok(written)
    }

    /// Point count and status; unknown when the index cannot be reached
    pub async fn collection_info(&self) -> CollectionInfo {
        match self.index.collection_info(&self.collection.name).await {
            Ok(info) => info,
            Err(e) => {
                warn!(collection = %self.collection.name, error = %e, "Failed to read collection info");
                CollectionInfo::unknown()
            }
        }
    }

    pub async fn health_check(&self) -> bool {
        match self.index.list_collections().await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Vector index health check failed");
                false
            }
        }
    }
}
