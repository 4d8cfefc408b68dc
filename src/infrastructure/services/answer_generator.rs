//! Answer generation from retrieved context

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::domain::llm::{LlmProvider, LlmRequest};
use crate::domain::rag::{GeneratedAnswer, TokenSink, replay_tokens};
use crate::infrastructure::observability::record_provider_call;

/// Sampling parameters and replay pacing for the generative model
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub model: String,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
    /// Pause between tokens replayed to a sink
    pub token_delay: Duration,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "gemini-1.5-flash".to_string(),
            temperature: 0.7,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 1024,
            token_delay: Duration::ZERO,
        }
    }
}

/// Grounded prompt sent to the model
pub fn build_prompt(query: &str, context: &str) -> String {
    format!(
        "You are a helpful news assistant. Answer the user's question based on the provided news \
         context. Be accurate, concise, and cite relevant information from the sources.\n\n\
         Context from recent news articles:\n{context}\n\n\
         User Question: {query}\n\n\
         Please provide a comprehensive answer based on the news context above. If the context \
         doesn't contain enough information to fully answer the question, mention that and \
         provide what information is available."
    )
}

/// Produces an answer and never fails; model errors turn into the fallback text
#[derive(Debug)]
pub struct AnswerGenerator {
    provider: Arc<dyn LlmProvider>,
    settings: GenerationSettings,
}

impl AnswerGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>, settings: GenerationSettings) -> Self {
        Self { provider, settings }
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// Generates an answer; with a sink, the final text is replayed token by token
    pub async fn generate(
        &self,
        query: &str,
        context: &str,
        sink: Option<&dyn TokenSink>,
    ) -> GeneratedAnswer {
        let answer = self.complete(query, context).await;

        if let Some(sink) = sink {
            let tokens = replay_tokens(&answer.text, sink, self.settings.token_delay).await;
            debug!(tokens, degraded = answer.degraded, "Replayed answer tokens");
        }

        answer
    }

    async fn complete(&self, query: &str, context: &str) -> GeneratedAnswer {
        let request = LlmRequest::builder()
            .prompt(build_prompt(query, context))
            .temperature(self.settings.temperature)
            .top_k(self.settings.top_k)
            .top_p(self.settings.top_p)
            .max_output_tokens(self.settings.max_output_tokens)
            .build();

        let provider = self.provider.provider_name();
        let start = Instant::now();
        let result = self.provider.generate(&self.settings.model, request).await;
        record_provider_call(provider, result.is_ok(), start.elapsed());

        match result {
            Ok(response) if !response.text.trim().is_empty() => {
                debug!(
                    provider,
                    model = %response.model,
                    finish_reason = ?response.finish_reason,
                    "Generated answer"
                );
                GeneratedAnswer::model(response.text)
            }
            Ok(_) => {
                warn!(provider, "Model returned an empty answer, using fallback");
                GeneratedAnswer::fallback()
            }
            Err(e) => {
                warn!(provider, error = %e, "Answer generation failed, using fallback");
                GeneratedAnswer::fallback()
            }
        }
    }
}
