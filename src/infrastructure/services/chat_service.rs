//! Chat turns: record the question, answer it, record and announce the reply

use std::sync::Arc;

use tracing::debug;

use super::{ConversationService, RagService};
use crate::domain::conversation::{ChatMessage, Session, validate_session_id};
use crate::domain::events::{ChatEvent, ChatEventPublisher};
use crate::domain::rag::TokenSink;
use crate::domain::DomainError;

pub struct ChatService {
    conversations: Arc<ConversationService>,
    rag: Arc<RagService>,
    events: Arc<dyn ChatEventPublisher>,
}

impl std::fmt::Debug for ChatService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatService")
            .field("conversations", &self.conversations)
            .field("rag", &self.rag)
            .finish_non_exhaustive()
    }
}

impl ChatService {
    pub fn new(
        conversations: Arc<ConversationService>,
        rag: Arc<RagService>,
        events: Arc<dyn ChatEventPublisher>,
    ) -> Self {
        Self {
            conversations,
            rag,
            events,
        }
    }

    /// Runs one chat turn and returns the assistant message
    ///
    /// The user turn is recorded before the pipeline runs, so a failed query
    /// still leaves the question in the transcript.
    pub async fn send_message(
        &self,
        session_id: &str,
        text: &str,
        sink: Option<&dyn TokenSink>,
    ) -> Result<ChatMessage, DomainError> {
        validate_session_id(session_id)?;
        if text.trim().is_empty() {
            return Err(DomainError::validation("Message is required"));
        }

        self.conversations
            .append(session_id, &ChatMessage::user(text))
            .await?;

        let result = self.rag.process_query(text, sink).await?;
        let reply = ChatMessage::assistant(result.answer, result.sources);
        self.conversations.append(session_id, &reply).await?;

        let receivers = self.events.publish(ChatEvent::MessageAdded {
            session_id: session_id.to_string(),
            message: reply.clone(),
        });
        debug!(session_id, receivers, "Published chat reply");

        Ok(reply)
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Session, DomainError> {
        self.conversations
            .get_session(session_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Session '{}' not found", session_id)))
    }

    pub async fn history(&self, session_id: &str) -> Result<Vec<ChatMessage>, DomainError> {
        self.conversations.history(session_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use mockall::predicate::function;
    use tokio_test::assert_ok;

    use crate::domain::cache::MockCache;
    use crate::domain::conversation::MessageRole;
    use crate::domain::embedding::MockEmbeddingProvider;
    use crate::domain::events::MockChatEventPublisher;
    use crate::domain::llm::MockLlmProvider;
    use crate::domain::vector::{ArticlePayload, CollectionSpec, MockVectorIndex, PointId, ScoredPoint};
    use crate::infrastructure::services::{
        AnswerGenerator, ContentCacheService, EmbeddingService, GenerationSettings, RetryPolicy,
        SearchGateway,
    };

    fn chat(
        index: MockVectorIndex,
        llm: MockLlmProvider,
        events: MockChatEventPublisher,
    ) -> (Arc<MockLlmProvider>, ChatService) {
        let cache = Arc::new(MockCache::new());
        let content_cache = Arc::new(ContentCacheService::new(cache.clone()));
        let llm = Arc::new(llm);

        let rag = RagService::new(
            content_cache.clone(),
            Arc::new(
                EmbeddingService::new(Arc::new(MockEmbeddingProvider::new("mock", 4)), content_cache)
                    .with_retry(RetryPolicy::new(1, Duration::ZERO)),
            ),
            Arc::new(SearchGateway::new(
                Arc::new(index),
                CollectionSpec::new("news_articles", 4),
            )),
            Arc::new(AnswerGenerator::new(llm.clone(), GenerationSettings::default())),
        );

        let service = ChatService::new(
            Arc::new(ConversationService::new(cache, Duration::from_secs(3600))),
            Arc::new(rag),
            Arc::new(events),
        );

        (llm, service)
    }

    fn one_hit() -> MockVectorIndex {
        MockVectorIndex::new().with_results(vec![ScoredPoint {
            id: PointId::Num(1),
            score: 0.9,
            payload: Some(ArticlePayload {
                title: "Rates".to_string(),
                url: "https://example.com/rates".to_string(),
                content: "The central bank held rates.".to_string(),
                ..Default::default()
            }),
        }])
    }

    #[tokio::test]
    async fn test_send_message_records_both_turns_and_publishes() {
        let mut events = MockChatEventPublisher::new();
        events
            .expect_publish()
            .with(function(|event: &ChatEvent| {
                let ChatEvent::MessageAdded { session_id, message } = event;
                session_id == "s1" && message.role == MessageRole::Assistant
            }))
            .times(1)
            .return_const(1usize);

        let (_, service) = chat(
            one_hit(),
            MockLlmProvider::new("mock").with_text("Rates were held."),
            events,
        );

        let reply = assert_ok!(service.send_message("s1", "What about rates?", None).await);

        assert_eq!(reply.content, "Rates were held.");
        assert_eq!(reply.sources.as_ref().map(Vec::len), Some(1));

        let history = service.history("s1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, MessageRole::User);
        assert_eq!(history[0].content, "What about rates?");
        assert_eq!(history[1], reply);
    }

    #[tokio::test]
    async fn test_failed_query_keeps_user_turn_and_publishes_nothing() {
        let mut events = MockChatEventPublisher::new();
        events.expect_publish().times(0);

        let (_, service) = chat(
            MockVectorIndex::new().with_error("down"),
            MockLlmProvider::new("mock").with_text("unused"),
            events,
        );

        assert!(service.send_message("s1", "rates?", None).await.is_err());

        let history = service.history("s1").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, MessageRole::User);
    }

    #[tokio::test]
    async fn test_invalid_input_rejected_before_any_work() {
        let mut events = MockChatEventPublisher::new();
        events.expect_publish().times(0);

        let (llm, service) = chat(one_hit(), MockLlmProvider::new("mock").with_text("x"), events);

        assert!(service.send_message("", "hi", None).await.unwrap_err().is_validation());
        assert!(service.send_message("s1", " ", None).await.unwrap_err().is_validation());
        assert!(service.history("s1").await.unwrap().is_empty());
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_get_session() {
        let mut events = MockChatEventPublisher::new();
        events.expect_publish().return_const(0usize);

        let (_, service) = chat(one_hit(), MockLlmProvider::new("mock").with_text("x"), events);

        assert!(matches!(
            service.get_session("missing").await,
            Err(DomainError::NotFound { .. })
        ));

        service.send_message("s1", "hi", None).await.unwrap();
        assert_eq!(service.get_session("s1").await.unwrap().id, "s1");
    }
}
