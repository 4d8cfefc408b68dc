//! End-to-end pipeline runs against stubbed Jina, Qdrant and Gemini endpoints

use serde_json::{Value, json};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use news_rag_gateway::domain::ChatEvent;
use news_rag_gateway::domain::rag::{FALLBACK_ANSWER, NO_RESULTS_ANSWER};
use news_rag_gateway::infrastructure::services::parse_articles;
use news_rag_gateway::{AppConfig, create_app};

const GENERATE_PATH: &str = "/v1beta/models/gemini-1.5-flash:generateContent";
const ANSWER: &str = "Chip makers rallied on strong AI demand.";

fn config(server: &MockServer) -> AppConfig {
    let mut config = AppConfig::default();

    config.embedding.base_url = server.uri();
    config.embedding.api_key = "jina-test-key".to_string();
    config.embedding.model = "test-embedding-4d".to_string();
    config.embedding.dimensions = 4;
    config.embedding.retry_base_delay_ms = 0;

    config.vector.url = server.uri();
    config.vector.api_key = Some("qdrant-test-key".to_string());

    config.llm.base_url = server.uri();
    config.llm.api_key = "gemini-test-key".to_string();

    config
}

fn embedding_response(count: usize) -> Value {
    let data: Vec<Value> = (0..count)
        .map(|i| json!({ "index": i, "embedding": [0.1 * (i as f32 + 1.0), 0.2, 0.3, 0.4] }))
        .collect();

    json!({
        "model": "test-embedding-4d",
        "data": data,
        "usage": { "prompt_tokens": 8, "total_tokens": 8 }
    })
}

fn search_response() -> Value {
    let points: Vec<Value> = [(1, 0.91, "AI chips"), (2, 0.85, "Cloud outage"), (3, 0.80, "Robotics")]
        .into_iter()
        .map(|(id, score, title)| {
            json!({
                "id": id,
                "score": score,
                "payload": {
                    "title": title,
                    "content": format!("{} body", title),
                    "url": format!("https://news.example.com/{}", id),
                    "publishedAt": "2024-06-01T08:00:00Z",
                    "source": "Tech Wire"
                }
            })
        })
        .collect();

    json!({ "result": points, "status": "ok", "time": 0.001 })
}

fn generate_response(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }],
        "usageMetadata": { "promptTokenCount": 120, "candidatesTokenCount": 9 },
        "modelVersion": "gemini-1.5-flash-002"
    })
}

async fn mount_embeddings(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(header("authorization", "Bearer jina-test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(embedding_response(1)))
        .expect(expected_calls)
        .mount(server)
        .await;
}

async fn mount_search(server: &MockServer, body: Value, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/collections/news_articles/points/search"))
        .and(header("api-key", "qdrant-test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn query_is_answered_once_then_served_from_cache() {
    let server = MockServer::start().await;
    mount_embeddings(&server, 1).await;
    mount_search(&server, search_response(), 1).await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(header("x-goog-api-key", "gemini-test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(generate_response(ANSWER)))
        .expect(1)
        .mount(&server)
        .await;

    let app = create_app(&config(&server)).await.unwrap();

    let first = app
        .rag
        .process_query("What's happening in technology?", None)
        .await
        .unwrap();

    assert_eq!(first.answer, ANSWER);
    let titles: Vec<&str> = first.sources.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec!["AI chips", "Cloud outage", "Robotics"]);
    assert_eq!(first.sources[0].relevance_score, 0.91);
    assert_eq!(first.retrieved_doc_count, 3);

    let streamed = std::sync::Mutex::new(String::new());
    let sink = |token: &str| streamed.lock().unwrap().push_str(token);
    let second = app
        .rag
        .process_query("What's happening in technology?", Some(&sink))
        .await
        .unwrap();

    assert_eq!(second, first);
    assert_eq!(*streamed.lock().unwrap(), ANSWER);

    let stats = app.cache.stats().await.unwrap();
    assert_eq!(stats.embeddings, 1);
    assert_eq!(stats.searches, 1);
    assert_eq!(stats.queries, 1);
}

#[tokio::test]
async fn empty_index_yields_no_results_answer() {
    let server = MockServer::start().await;
    mount_embeddings(&server, 1).await;
    mount_search(&server, json!({ "result": [], "status": "ok" }), 1).await;

    let app = create_app(&config(&server)).await.unwrap();

    let result = app.rag.process_query("obscure topic", None).await.unwrap();

    assert_eq!(result.answer, NO_RESULTS_ANSWER);
    assert!(result.sources.is_empty());
}

#[tokio::test]
async fn model_outage_yields_fallback_answer() {
    let server = MockServer::start().await;
    mount_embeddings(&server, 1).await;
    mount_search(&server, search_response(), 1).await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(1)
        .mount(&server)
        .await;

    let app = create_app(&config(&server)).await.unwrap();

    let result = app.rag.process_query("tech", None).await.unwrap();

    assert_eq!(result.answer, FALLBACK_ANSWER);
    assert_eq!(result.sources.len(), 3);
}

#[tokio::test]
async fn embedding_outage_is_retried_then_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(3)
        .mount(&server)
        .await;
    mount_search(&server, search_response(), 0).await;

    let app = create_app(&config(&server)).await.unwrap();

    assert!(app.rag.process_query("tech", None).await.is_err());
}

#[tokio::test]
async fn init_ingest_and_chat() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "result": { "collections": [] }, "status": "ok" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/collections/news_articles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": true })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/collections/news_articles/points"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "result": { "status": "completed" } })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(embedding_response(2)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_embeddings(&server, 1).await;
    mount_search(&server, search_response(), 1).await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(generate_response(ANSWER)))
        .mount(&server)
        .await;

    let app = create_app(&config(&server)).await.unwrap();

    assert!(app.search.initialize().await.unwrap());

    let articles = parse_articles(
        r#"[
            {"title": "AI chips", "content": "Chip stocks rose.", "url": "https://news.example.com/1"},
            {"title": "Cloud outage", "content": "A region went down.", "url": "https://news.example.com/2"}
        ]"#,
    )
    .unwrap();
    let report = app.ingestion.ingest(articles).await.unwrap();
    assert_eq!(report.stored, 2);

    let mut events = app.events.subscribe();
    let session = app.conversations.create_session().await.unwrap();
    let reply = app
        .chat
        .send_message(&session.id, "How are chip stocks doing?", None)
        .await
        .unwrap();

    assert_eq!(reply.content, ANSWER);
    let ChatEvent::MessageAdded { session_id, message } = events.recv().await.unwrap();
    assert_eq!(session_id, session.id);
    assert_eq!(message, reply);

    let history = app.chat.history(&session.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].content, "How are chip stocks doing?");
}
