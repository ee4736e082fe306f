//! Integration tests for the HTTP text generator against a mock chat-completions server

use gencache::features::feature_cache;
use gencache::features::summary::{SummaryFeature, SummaryRequest};
use gencache::transport::{HttpGeneratorConfig, HttpTextGenerator, Prompt, TextGenerator};
use gencache::{CacheConfig, GenerationFailure, Origin};
use mockito::{Matcher, Server};
use serde_json::json;
use std::sync::Arc;

fn generator_for(server: &mockito::ServerGuard) -> HttpTextGenerator {
    let config = HttpGeneratorConfig::new(format!("{}/v1", server.url()), "test-model")
        .with_api_key("sk-test");
    HttpTextGenerator::new(config).unwrap()
}

fn completion(content: &str) -> String {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [
            {"index": 0, "message": {"role": "assistant", "content": content}, "finish_reason": "stop"}
        ]
    })
    .to_string()
}

#[tokio::test]
async fn test_complete_returns_message_content() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::PartialJson(json!({
            "model": "test-model",
            "response_format": {"type": "json_object"}
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion(r#"{"ok": true}"#))
        .create_async()
        .await;

    let generator = generator_for(&server);
    let out = generator
        .complete(&Prompt::new("system", "user"))
        .await
        .unwrap();

    assert_eq!(out, r#"{"ok": true}"#);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_server_error_maps_to_remote_failure() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(503)
        .with_body("upstream overloaded")
        .create_async()
        .await;

    let err = generator_for(&server)
        .complete(&Prompt::new("system", "user"))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        GenerationFailure::Remote {
            status: 503,
            message: "upstream overloaded".to_string()
        }
    );
}

#[tokio::test]
async fn test_unexpected_body_is_malformed() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"choices": []}"#)
        .create_async()
        .await;

    let err = generator_for(&server)
        .complete(&Prompt::new("system", "user"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "malformed");
}

#[tokio::test]
async fn test_summary_cache_over_http() {
    let mut server = Server::new_async().await;
    let reply = json!({
        "summary": "Mitosis divides one cell into two identical cells.",
        "key_points": ["Four phases", "Two daughter cells"],
        "estimated_read_minutes": 4
    });
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion(&reply.to_string()))
        .expect(1)
        .create_async()
        .await;

    let cache = feature_cache::<SummaryFeature>(
        Arc::new(generator_for(&server)),
        CacheConfig::default(),
        None,
    )
    .unwrap();
    let request = SummaryRequest::new("bio-101-3", "Mitosis", "Mitosis splits one cell into two.");

    let first = cache.get_or_generate_entry(&request).await.unwrap();
    let second = cache.get_or_generate_entry(&request).await.unwrap();

    assert_eq!(first.origin(), Origin::Generated);
    assert_eq!(first.artifact().estimated_read_minutes, 4);
    assert!(first.same_artifact(&second));
    mock.assert_async().await;
}
