//! Query results and cited sources

use serde::{Deserialize, Serialize};

use crate::domain::vector::SearchHit;

/// Answer returned when the index holds nothing relevant to the question
pub const NO_RESULTS_ANSWER: &str =
    "I couldn't find any relevant information in the news database to answer your question.";

/// Answer returned when the generative model could not produce a response
pub const FALLBACK_ANSWER: &str =
    "I apologize, but I'm having trouble generating a response right now. Please try again later.";

/// A cited document derived from a search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub title: String,
    pub url: String,
    /// Originating feed of the article
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    /// Raw similarity score reported by the index
    pub relevance_score: f32,
}

impl From<&SearchHit> for Source {
    fn from(hit: &SearchHit) -> Self {
        Self {
            title: hit.title.clone(),
            url: hit.url.clone(),
            source: hit.source.clone(),
            published_at: hit.published_at.clone(),
            relevance_score: hit.score,
        }
    }
}

/// Final outcome of one pass through the query pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default, alias = "retrievedDocs")]
    pub retrieved_doc_count: usize,
}

impl QueryResult {
    pub fn new(answer: impl Into<String>, sources: Vec<Source>, retrieved_doc_count: usize) -> Self {
        Self {
            answer: answer.into(),
            sources,
            retrieved_doc_count,
        }
    }

    /// The negative result used when search returns no hits
    pub fn no_results() -> Self {
        Self::new(NO_RESULTS_ANSWER, Vec::new(), 0)
    }
}

/// Text produced by the answer generator
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAnswer {
    pub text: String,
    /// Set when the text is the fallback rather than a model response
    pub degraded: bool,
}

impl GeneratedAnswer {
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            degraded: false,
        }
    }

    pub fn fallback() -> Self {
        Self {
            text: FALLBACK_ANSWER.to_string(),
            degraded: true,
        }
    }
}
