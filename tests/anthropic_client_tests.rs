use chat_relay::agent::{ AIAgent, ChatAgent };
use chat_relay::llm::chat::anthropic::AnthropicChatClient;
use chat_relay::llm::chat::ChatClient;
use chat_relay::llm::{ AgentError, LlmConfig };
use chat_relay::models::chat::{ HistoryEntry, Role };
use axum::{ body::{ Body, Bytes }, routing::post, Router };
use futures::{ stream, StreamExt };
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use wiremock::{
    matchers::{ body_partial_json, header, method, path },
    Mock,
    MockServer,
    ResponseTemplate,
};

// ============================================================================
// Helper Functions
// ============================================================================

fn config_for(server: &MockServer) -> LlmConfig {
    LlmConfig {
        api_key: Some("test-key".to_string()),
        base_url: server.uri(),
        system_prompt: "Be brief.".to_string(),
        ..LlmConfig::default()
    }
}

fn conversation() -> Vec<HistoryEntry> {
    vec![
        HistoryEntry { role: Role::User, content: "Hi".into() },
        HistoryEntry { role: Role::Assistant, content: "Hello!".into() },
        HistoryEntry { role: Role::User, content: "How are you?".into() }
    ]
}

/// Serves `route` from a local listener whose response body arrives as the
/// given pieces, each flushed separately. Returns the base URL.
async fn serve_in_pieces(route: &'static str, pieces: Vec<Vec<u8>>) -> String {
    let app = Router::new().route(
        route,
        post(move || {
            let pieces = pieces.clone();
            async move {
                let body = stream::iter(pieces).then(|piece| async move {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok::<_, Infallible>(Bytes::from(piece))
                });
                Body::from_stream(body)
            }
        })
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Collects a text stream into its chunks and, if it failed, the error.
async fn collect(
    mut stream: chat_relay::llm::chat::TextStream
) -> (Vec<String>, Option<AgentError>) {
    let mut chunks = Vec::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(chunk) => chunks.push(chunk),
            Err(e) => {
                return (chunks, Some(e));
            }
        }
    }
    (chunks, None)
}

// ============================================================================
// Batch
// ============================================================================

#[tokio::test]
async fn test_complete_sends_system_prompt_and_history() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(
            body_partial_json(
                json!({
            "system": "Be brief.",
            "stream": false,
            "messages": [
                { "role": "user", "content": "Hi" },
                { "role": "assistant", "content": "Hello!" },
                { "role": "user", "content": "How are you?" }
            ]
        })
            )
        )
        .respond_with(
            ResponseTemplate::new(200).set_body_json(
                json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "content": [
                { "type": "text", "text": "Doing " },
                { "type": "text", "text": "well." }
            ],
            "stop_reason": "end_turn"
        })
            )
        )
        .expect(1)
        .mount(&mock_server).await;

    let client = AnthropicChatClient::from_config(&config_for(&mock_server)).unwrap();
    let text = client.complete(&conversation()).await.unwrap();

    assert_eq!(text, "Doing well.");
}

#[tokio::test]
async fn test_complete_surfaces_api_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid x-api-key"))
        .mount(&mock_server).await;

    let client = AnthropicChatClient::from_config(&config_for(&mock_server)).unwrap();
    match client.complete(&conversation()).await {
        Err(AgentError::Api { status, body }) => {
            assert_eq!(status, 401);
            assert_eq!(body, "invalid x-api-key");
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

// ============================================================================
// Streaming
// ============================================================================

#[tokio::test]
async fn test_stream_yields_text_deltas_until_message_stop() {
    let mock_server = MockServer::start().await;

    let sse_response =
        "\
event: message_start
data: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_1\"}}

event: content_block_start
data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}

event: ping
data: {\"type\":\"ping\"}

event: content_block_delta
data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hello\"}}

event: content_block_delta
data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\" world\"}}

event: message_stop
data: {\"type\":\"message_stop\"}

";

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(body_partial_json(json!({ "stream": true })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(sse_response)
        )
        .mount(&mock_server).await;

    let client = AnthropicChatClient::from_config(&config_for(&mock_server)).unwrap();
    let stream = client.complete_stream(&conversation()).await.unwrap();
    let (chunks, error) = collect(stream).await;

    assert_eq!(chunks, vec!["Hello", " world"]);
    assert!(error.is_none());
}

#[tokio::test]
async fn test_stream_keeps_multibyte_text_split_across_chunks() {
    let body = "\
data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"あ\"}}

data: {\"type\":\"message_stop\"}

".as_bytes();
    // Split inside the three-byte character.
    let split = body
        .windows(3)
        .position(|w| w == "あ".as_bytes())
        .unwrap() + 1;
    let base_url = serve_in_pieces(
        "/v1/messages",
        vec![body[..split].to_vec(), body[split..].to_vec()]
    ).await;

    let config = LlmConfig {
        api_key: Some("test-key".to_string()),
        base_url,
        ..LlmConfig::default()
    };
    let client = AnthropicChatClient::from_config(&config).unwrap();
    let stream = client.complete_stream(&conversation()).await.unwrap();
    let (chunks, error) = collect(stream).await;

    assert_eq!(chunks, vec!["あ"]);
    assert!(error.is_none());
}

#[tokio::test]
async fn test_stream_error_event_ends_with_error() {
    let mock_server = MockServer::start().await;

    let sse_response =
        "\
event: content_block_delta
data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Par\"}}

event: error
data: {\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\",\"message\":\"Overloaded\"}}

";

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sse_response))
        .mount(&mock_server).await;

    let client = AnthropicChatClient::from_config(&config_for(&mock_server)).unwrap();
    let stream = client.complete_stream(&conversation()).await.unwrap();
    let (chunks, error) = collect(stream).await;

    assert_eq!(chunks, vec!["Par"]);
    assert!(matches!(error, Some(AgentError::Stream(_))));
}

#[tokio::test]
async fn test_stream_truncated_without_message_stop_is_an_error() {
    let mock_server = MockServer::start().await;

    let sse_response =
        "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"cut\"}}\n\n";

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sse_response))
        .mount(&mock_server).await;

    let client = AnthropicChatClient::from_config(&config_for(&mock_server)).unwrap();
    let stream = client.complete_stream(&conversation()).await.unwrap();
    let (chunks, error) = collect(stream).await;

    assert_eq!(chunks, vec!["cut"]);
    assert!(error.is_some());
}

#[tokio::test]
async fn test_stream_rejected_status_fails_to_open() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server).await;

    let client = AnthropicChatClient::from_config(&config_for(&mock_server)).unwrap();
    assert!(matches!(
        client.complete_stream(&conversation()).await,
        Err(AgentError::Api { status: 500, .. })
    ));
}

// ============================================================================
// Agent
// ============================================================================

#[tokio::test]
async fn test_agent_initializes_on_first_use_and_reuses_handle() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(
                json!({ "content": [{ "type": "text", "text": "pong" }] })
            )
        )
        .expect(2)
        .mount(&mock_server).await;

    let agent = AIAgent::new(config_for(&mock_server));
    assert!(!agent.is_ready());

    assert_eq!(agent.generate(&conversation()).await.unwrap(), "pong");
    assert!(agent.is_ready());
    assert_eq!(agent.generate(&conversation()).await.unwrap(), "pong");
}
