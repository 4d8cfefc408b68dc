//! Ingestion of already-cleaned news articles into the vector index

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{EmbeddingService, SearchGateway};
use crate::domain::vector::{IndexPoint, NewsArticle};
use crate::domain::DomainError;

const DEFAULT_BATCH_SIZE: usize = 10;

/// Outcome of one ingestion run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionReport {
    /// Articles handed to the run
    pub received: usize,
    /// Articles written to the index
    pub stored: usize,
    /// Articles dropped because their batch could not be embedded
    pub failed: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// Accepts either a bare array of articles or `{"articles": [...]}`
pub fn parse_articles(json: &str) -> Result<Vec<NewsArticle>, DomainError> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ArticleFile {
        List(Vec<NewsArticle>),
        Wrapped { articles: Vec<NewsArticle> },
    }

    let file: ArticleFile = serde_json::from_str(json)
        .map_err(|e| DomainError::validation(format!("Invalid article file: {}", e)))?;

    Ok(match file {
        ArticleFile::List(articles) | ArticleFile::Wrapped { articles } => articles,
    })
}

/// Embeds articles batch by batch and upserts everything that succeeded
#[derive(Debug)]
pub struct IngestionService {
    embeddings: Arc<EmbeddingService>,
    search: Arc<SearchGateway>,
    batch_size: usize,
}

impl IngestionService {
    pub fn new(embeddings: Arc<EmbeddingService>, search: Arc<SearchGateway>) -> Self {
        Self {
            embeddings,
            search,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// A failed embedding batch is skipped; a failed upsert fails the run
    pub async fn ingest(&self, articles: Vec<NewsArticle>) -> Result<IngestionReport, DomainError> {
        let mut report = IngestionReport {
            received: articles.len(),
            ..Default::default()
        };

        if articles.is_empty() {
            return Ok(report);
        }

        let total_batches = articles.len().div_ceil(self.batch_size);
        let mut points: Vec<IndexPoint> = Vec::with_capacity(articles.len());

        for (batch_idx, batch) in articles.chunks(self.batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(NewsArticle::embedding_text).collect();

            match self.embeddings.resolve_batch(&texts).await {
                Ok(vectors) => {
                    points.extend(
                        batch
                            .iter()
                            .cloned()
                            .zip(vectors)
                            .map(|(article, vector)| article.into_point(vector)),
                    );
                    info!(batch = batch_idx + 1, total_batches, "Embedded article batch");
                }
                Err(e) => {
                    warn!(batch = batch_idx + 1, total_batches, error = %e, "Skipping article batch");
                    report.failed += batch.len();
                    report.errors.push(format!("batch {}: {}", batch_idx + 1, e));
                }
            }
        }

        report.stored = self.search.upsert(points).await?;
        info!(
            received = report.received,
            stored = report.stored,
            failed = report.failed,
            "Ingestion finished"
        );

        Ok(report)
    }
}
