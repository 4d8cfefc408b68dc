//! Retrieval-augmented query domain

mod result;
mod stream;

pub use result::{FALLBACK_ANSWER, GeneratedAnswer, NO_RESULTS_ANSWER, QueryResult, Source};
pub use stream::{TokenSink, replay_tokens, tokenize_answer};
