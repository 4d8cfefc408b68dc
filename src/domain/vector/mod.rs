//! Vector index domain - Similarity search over article embeddings

mod point;
mod provider;

pub use point::{
    ArticlePayload, CollectionInfo, CollectionSpec, DistanceMetric, IndexPoint, NewsArticle,
    PointId, ScoredPoint, SearchHit,
};
pub use provider::VectorIndex;

#[cfg(test)]
pub use provider::mock::MockVectorIndex;
