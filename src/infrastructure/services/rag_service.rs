//! Retrieval-augmented query pipeline
//!
//! One pass per call: full-result probe, embed, search probe, empty-result
//! policy, context assembly, generation, source projection, write-through.
//! Embedding and search failures propagate; generation failures resolve to a
//! fallback answer; cache failures never surface.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument};

use super::{AnswerGenerator, ContentCacheService, EmbeddingService, SearchGateway};
use crate::domain::rag::{QueryResult, Source, TokenSink, replay_tokens};
use crate::domain::vector::SearchHit;
use crate::domain::DomainError;
use crate::infrastructure::observability::record_query;

/// Pipeline tuning
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySettings {
    pub search_limit: usize,
    /// Characters of article content used when a hit has no summary
    pub excerpt_chars: usize,
    /// Pause between tokens replayed from a cached answer
    pub token_delay: Duration,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            search_limit: 5,
            excerpt_chars: 300,
            token_delay: Duration::ZERO,
        }
    }
}

/// Numbered excerpts in rank order, separated by blank lines
pub fn build_context(hits: &[SearchHit], excerpt_chars: usize) -> String {
    hits.iter()
        .enumerate()
        .map(|(idx, hit)| {
            let excerpt = match hit.summary.as_deref() {
                Some(summary) if !summary.trim().is_empty() => summary.to_string(),
                _ => hit.content.chars().take(excerpt_chars).collect(),
            };
            format!("[{}] {}\n{}", idx + 1, hit.title, excerpt)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Coordinates the cache, embedding, search and generation components
#[derive(Debug)]
pub struct RagService {
    cache: Arc<ContentCacheService>,
    embeddings: Arc<EmbeddingService>,
    search: Arc<SearchGateway>,
    generator: Arc<AnswerGenerator>,
    settings: QuerySettings,
}

impl RagService {
    pub fn new(
        cache: Arc<ContentCacheService>,
        embeddings: Arc<EmbeddingService>,
        search: Arc<SearchGateway>,
        generator: Arc<AnswerGenerator>,
    ) -> Self {
        Self {
            cache,
            embeddings,
            search,
            generator,
            settings: QuerySettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: QuerySettings) -> Self {
        self.settings = settings;
        self
    }

    /// Answers a question, streaming the answer to `sink` when given
    #[instrument(skip(self, sink), fields(streaming = sink.is_some()))]
    pub async fn process_query(
        &self,
        query: &str,
        sink: Option<&dyn TokenSink>,
    ) -> Result<QueryResult, DomainError> {
        if query.trim().is_empty() {
            return Err(DomainError::validation("Query must not be empty"));
        }

        let start = Instant::now();
        let result = self.run(query, sink).await;

        let outcome = match &result {
            Ok((_, outcome)) => *outcome,
            Err(_) => "error",
        };
        record_query(outcome, start.elapsed());
        info!(
            outcome,
            duration_ms = start.elapsed().as_millis() as u64,
            "Processed query"
        );

        result.map(|(result, _)| result)
    }

    async fn run(
        &self,
        query: &str,
        sink: Option<&dyn TokenSink>,
    ) -> Result<(QueryResult, &'static str), DomainError> {
        if let Some(cached) = self.cache.get_query_result(query).await {
            debug!("Serving cached query result");
            self.replay(&cached.answer, sink).await;
            return Ok((cached, "cached"));
        }

        let vector = self.embeddings.resolve(query).await?;
        let hits = self.find_hits(&vector).await?;

        if hits.is_empty() {
            let result = QueryResult::no_results();
            self.replay(&result.answer, sink).await;
            self.cache
                .set_query_result(query, &result, self.cache.ttls().negative_query)
                .await;
            return Ok((result, "no_results"));
        }

        let context = build_context(&hits, self.settings.excerpt_chars);
        let answer = self.generator.generate(query, &context, sink).await;

        let sources: Vec<Source> = hits.iter().map(Source::from).collect();
        let result = QueryResult::new(answer.text, sources, hits.len());

        // A degraded answer is kept only as long as a negative result
        let (ttl, outcome) = if answer.degraded {
            (self.cache.ttls().negative_query, "fallback")
        } else {
            (self.cache.ttls().query, "answered")
        };
        self.cache.set_query_result(query, &result, ttl).await;

        Ok((result, outcome))
    }

    async fn find_hits(&self, vector: &[f32]) -> Result<Vec<SearchHit>, DomainError> {
        let limit = self.settings.search_limit;

        if let Some(hits) = self.cache.get_search_results(vector, limit).await {
            debug!(hits = hits.len(), "Serving cached search results");
            return Ok(hits);
        }

        let hits = self.search.search(vector, limit).await?;
        self.cache.set_search_results(vector, limit, &hits).await;

        Ok(hits)
    }

    async fn replay(&self, answer: &str, sink: Option<&dyn TokenSink>) {
        if let Some(sink) = sink {
            replay_tokens(answer, sink, self.settings.token_delay).await;
        }
    }
}
