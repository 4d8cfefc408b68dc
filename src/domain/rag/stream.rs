//! Incremental token delivery

use std::time::Duration;

use unicode_segmentation::UnicodeSegmentation;

/// Receives answer tokens in left-to-right order
pub trait TokenSink: Send + Sync {
    fn on_token(&self, token: &str);
}

impl<F> TokenSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn on_token(&self, token: &str) {
        self(token)
    }
}

/// Splits an answer on word boundaries, attaching trailing whitespace to the
/// preceding token. Concatenating the tokens reproduces the input exactly.
pub fn tokenize_answer(answer: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut end = 0;

    for (offset, segment) in answer.split_word_bound_indices() {
        let is_space = segment.chars().all(char::is_whitespace);

        if is_space || start == end {
            end = offset + segment.len();
        } else {
            tokens.push(&answer[start..end]);
            start = offset;
            end = offset + segment.len();
        }
    }

    if end > start {
        tokens.push(&answer[start..end]);
    }

    tokens
}

/// Delivers an already complete answer to a sink token by token
pub async fn replay_tokens(answer: &str, sink: &dyn TokenSink, delay: Duration) -> usize {
    let tokens = tokenize_answer(answer);

    for token in &tokens {
        sink.on_token(token);

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    tokens.len()
}
