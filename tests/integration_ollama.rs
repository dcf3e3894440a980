#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Ollama client against a mock server
// The client blocks, so every call runs on a blocking thread while the mock
// server keeps serving on the runtime

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pdf_rag::RagError;
use pdf_rag::config::OllamaConfig;
use pdf_rag::document::Document;
use pdf_rag::embeddings::{Embedder, OllamaClient};
use pdf_rag::generation::Generator;
use pdf_rag::pipeline::{Pipeline, QueryOutcome, Session};

fn mock_config(server: &MockServer, batch_size: u32) -> OllamaConfig {
    OllamaConfig {
        host: server.address().ip().to_string(),
        port: server.address().port(),
        batch_size,
        ..OllamaConfig::default()
    }
}

fn texts(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}

fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok();
}

#[tokio::test(flavor = "multi_thread")]
async fn embeds_in_batches() {
    init_test_tracing();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({
            "model": "nomic-embed-text",
            "input": ["alpha", "beta"],
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "embeddings": [[1.0, 0.0], [0.0, 1.0]] })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({ "input": ["gamma"] })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [[0.5, 0.5]] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = mock_config(&server, 2);
    let vectors = tokio::task::spawn_blocking(move || {
        let client = OllamaClient::new(&config).expect("client builds");
        client.embed(&texts(&["alpha", "beta", "gamma"]))
    })
    .await
    .expect("task completes")
    .expect("embedding succeeds");

    assert_eq!(
        vectors,
        vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.5, 0.5]]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn vector_count_mismatch_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [[1.0]] })))
        .mount(&server)
        .await;

    let config = mock_config(&server, 16);
    let result = tokio::task::spawn_blocking(move || {
        let client = OllamaClient::new(&config).expect("client builds");
        client.embed(&texts(&["one", "two"]))
    })
    .await
    .expect("task completes");

    match result {
        Err(RagError::Backend(message)) => assert!(message.contains("Mismatch")),
        other => panic!("expected backend error, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn server_error_is_a_backend_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model failed to load"))
        .mount(&server)
        .await;

    let config = mock_config(&server, 16);
    let result = tokio::task::spawn_blocking(move || {
        let client = OllamaClient::new(&config).expect("client builds");
        client.embed_query("hello")
    })
    .await
    .expect("task completes");

    match result {
        Err(RagError::Backend(message)) => assert!(message.contains("500")),
        other => panic!("expected backend error, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn chat_answer_is_trimmed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "model": "phi3:mini",
            "stream": false,
            "messages": [{ "role": "user", "content": "Say hi" }],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "phi3:mini",
            "message": { "role": "assistant", "content": "  Hi there.\n" },
            "done": true,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = mock_config(&server, 16);
    let answer = tokio::task::spawn_blocking(move || {
        let client = OllamaClient::new(&config).expect("client builds");
        client.generate("Say hi")
    })
    .await
    .expect("task completes")
    .expect("generation succeeds");

    assert_eq!(answer, "Hi there.");
}

#[tokio::test(flavor = "multi_thread")]
async fn health_check_requires_both_models() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                { "name": "nomic-embed-text:latest", "size": 274302450 },
                { "name": "llama3:8b" },
            ]
        })))
        .mount(&server)
        .await;

    let config = mock_config(&server, 16);
    let (embed_only, both) = tokio::task::spawn_blocking(move || {
        let client = OllamaClient::new(&config).expect("client builds");
        let embed_only = client.health_check();

        let llama = OllamaConfig {
            chat_model: "llama3:8b".to_string(),
            ..config
        };
        let both = OllamaClient::new(&llama)
            .expect("client builds")
            .health_check();
        (embed_only, both)
    })
    .await
    .expect("task completes");

    match embed_only {
        Err(RagError::Backend(message)) => assert!(message.contains("phi3:mini")),
        other => panic!("expected missing model error, got {:?}", other),
    }
    assert!(both.is_ok(), "health check should pass: {:?}", both);
}

#[tokio::test(flavor = "multi_thread")]
async fn pipeline_round_trip_through_ollama() {
    init_test_tracing();
    let server = MockServer::start().await;

    // One chunk at ingest and one query, so a single vector serves both
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [[0.3, 0.4, 0.5]] })),
        )
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": { "role": "assistant", "content": "It expires on March 5, 2027." }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = pdf_rag::config::Config {
        ollama: mock_config(&server, 16),
        ..pdf_rag::config::Config::default()
    };
    let (outcome, history) = tokio::task::spawn_blocking(move || {
        let pipeline = Pipeline::from_config(&config).expect("pipeline builds");
        let mut session = Session::new();
        pipeline
            .ingest(
                &mut session,
                &[Document::new(
                    "The contract expires on March 5, 2027.",
                    "contract.pdf",
                    2,
                )],
            )
            .expect("ingest succeeds");

        let outcome = pipeline
            .query(&mut session, "When does the contract expire?")
            .expect("query succeeds");
        (outcome, session.history().len())
    })
    .await
    .expect("task completes");

    let QueryOutcome::Answered(answer) = outcome else {
        panic!("expected an answer");
    };
    assert_eq!(answer.text, "It expires on March 5, 2027.");
    assert_eq!(answer.sources.len(), 1);
    assert_eq!(answer.sources[0].chunk.page, 2);
    assert_eq!(history, 2);
}
