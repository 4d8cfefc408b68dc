//! Vector index data types

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Similarity metric of a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Euclid,
    Dot,
}

impl DistanceMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cosine => "Cosine",
            Self::Euclid => "Euclid",
            Self::Dot => "Dot",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape of a collection: name, vector size and metric
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSpec {
    pub name: String,
    pub dimensions: usize,
    pub metric: DistanceMetric,
}

impl CollectionSpec {
    pub fn new(name: impl Into<String>, dimensions: usize) -> Self {
        Self {
            name: name.into(),
            dimensions,
            metric: DistanceMetric::Cosine,
        }
    }
}

/// Point identifier accepted by the index (unsigned integer or UUID string)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointId {
    Num(u64),
    Uuid(String),
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{}", n),
            Self::Uuid(s) => f.write_str(s),
        }
    }
}

/// News article payload stored next to each vector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticlePayload {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// A point to write into the index
#[derive(Debug, Clone, Serialize)]
pub struct IndexPoint {
    pub id: PointId,
    pub vector: Vec<f32>,
    pub payload: ArticlePayload,
}

/// A point returned by a similarity search
#[derive(Debug, Clone, Deserialize)]
pub struct ScoredPoint {
    pub id: PointId,
    pub score: f32,
    #[serde(default)]
    pub payload: Option<ArticlePayload>,
}

/// Summary of a collection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionInfo {
    pub points_count: u64,
    pub status: String,
}

impl CollectionInfo {
    pub fn unknown() -> Self {
        Self {
            points_count: 0,
            status: "unknown".to_string(),
        }
    }
}

/// Snapshot of a retrieved document at search time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub document_id: String,
    pub score: f32,
    pub title: String,
    pub content: String,
    pub url: String,
    pub published_at: Option<String>,
    pub source: Option<String>,
    pub summary: Option<String>,
}

impl From<ScoredPoint> for SearchHit {
    fn from(point: ScoredPoint) -> Self {
        let payload = point.payload.unwrap_or_default();

        Self {
            document_id: point.id.to_string(),
            score: point.score,
            title: payload.title,
            content: payload.content,
            url: payload.url,
            published_at: payload.published_at,
            source: payload.source,
            summary: payload.summary,
        }
    }
}

/// A cleaned news article ready to be embedded and indexed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsArticle {
    #[serde(default)]
    pub id: Option<PointId>,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

impl NewsArticle {
    /// Text sent to the embedding provider
    pub fn embedding_text(&self) -> String {
        format!("{}\n\n{}", self.title, self.content)
    }

    /// Explicit id, or one derived from the url (title and content when no url)
    ///
    /// Derived ids are stable, so re-ingesting an article replaces its point.
    pub fn point_id(&self) -> PointId {
        if let Some(id) = &self.id {
            return id.clone();
        }

        let mut hasher = Sha256::new();
        if self.url.is_empty() {
            hasher.update(self.title.as_bytes());
            hasher.update(self.content.as_bytes());
        } else {
            hasher.update(self.url.as_bytes());
        }
        let digest = hasher.finalize();

        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        PointId::Num(u64::from_be_bytes(bytes))
    }

    pub fn into_point(self, vector: Vec<f32>) -> IndexPoint {
        IndexPoint {
            id: self.point_id(),
            vector,
            payload: ArticlePayload {
                title: self.title,
                content: self.content,
                url: self.url,
                published_at: self.published_at,
                source: self.source,
                summary: self.summary,
            },
        }
    }
}
