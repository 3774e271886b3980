// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! POST /ask behaviour: success, validation and backend failures

use axum::http::StatusCode;
use std::sync::Arc;
use tempfile::TempDir;
use vasco_rag::{
    api::{create_app, AppState},
    config::RetrievalConfig,
    embeddings::EmbeddingError,
    RagError, Retriever,
};

use super::support::{
    embedder_down_service, empty_app, indexed_app, json_body, populated_store, post_json, send,
    ScriptedGenerator, UnavailableEmbedder,
};

#[tokio::test]
async fn test_ask_returns_answer_with_sources() {
    let tmp = TempDir::new().unwrap();
    let app = indexed_app(tmp.path(), ScriptedGenerator::Reply("1898".to_string())).await;

    let response = send(
        app,
        post_json("/ask", r#"{"question": "When was Vasco founded?"}"#),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["answer"], "1898");
    assert_eq!(body["sources"], serde_json::json!(["historia.md"]));
}

#[tokio::test]
async fn test_ask_rejects_blank_question() {
    let tmp = TempDir::new().unwrap();
    let app = indexed_app(tmp.path(), ScriptedGenerator::Reply("x".to_string())).await;

    let response = send(app, post_json("/ask", r#"{"question": "   "}"#)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert_eq!(body["error_type"], "validation_error");
    assert_eq!(body["details"]["field"], "question");
}

#[tokio::test]
async fn test_ask_rejects_overlong_question() {
    let tmp = TempDir::new().unwrap();
    let app = indexed_app(tmp.path(), ScriptedGenerator::Reply("x".to_string())).await;

    let question = "a".repeat(501);
    let response = send(
        app,
        post_json("/ask", &format!(r#"{{"question": "{}"}}"#, question)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_ask_rejects_malformed_json() {
    let tmp = TempDir::new().unwrap();
    let app = indexed_app(tmp.path(), ScriptedGenerator::Reply("x".to_string())).await;

    let response = send(app, post_json("/ask", r#"{"q": 1"#)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert_eq!(body["error_type"], "invalid_request");
}

#[tokio::test]
async fn test_ask_on_empty_index_is_503() {
    let tmp = TempDir::new().unwrap();
    let app = empty_app(tmp.path(), ScriptedGenerator::Reply("x".to_string()));

    let response = send(
        app,
        post_json("/ask", r#"{"question": "When was Vasco founded?"}"#),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = json_body(response).await;
    assert_eq!(body["details"]["code"], "EMPTY_INDEX");
}

#[tokio::test]
async fn test_generator_down_is_503_not_empty_answer() {
    let tmp = TempDir::new().unwrap();
    let app = indexed_app(tmp.path(), ScriptedGenerator::Down).await;

    let response = send(
        app,
        post_json("/ask", r#"{"question": "When was Vasco founded?"}"#),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = json_body(response).await;
    assert_eq!(body["details"]["code"], "GENERATION_BACKEND_ERROR");
    assert!(body["request_id"].is_string());
}

#[tokio::test]
async fn test_missing_model_message_is_actionable() {
    let tmp = TempDir::new().unwrap();
    let app = indexed_app(tmp.path(), ScriptedGenerator::MissingModel).await;

    let response = send(
        app,
        post_json("/ask", r#"{"question": "When was Vasco founded?"}"#),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = json_body(response).await;
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("ollama pull llama3"));
}

#[tokio::test]
async fn test_embedder_failure_is_an_error_not_empty_context() {
    let retriever = Retriever::new(
        Arc::new(UnavailableEmbedder),
        populated_store().await,
        RetrievalConfig::default(),
    );

    let err = retriever.retrieve("When was Vasco founded?").await.unwrap_err();
    assert!(matches!(
        err,
        RagError::Embedding(EmbeddingError::Unavailable(_))
    ));
}

#[tokio::test]
async fn test_ask_with_embedder_down_is_503() {
    let tmp = TempDir::new().unwrap();
    let service = embedder_down_service(tmp.path()).await;

    let err = service.ask("When was Vasco founded?").await.unwrap_err();
    assert_eq!(err.error_code(), "EMBEDDING_BACKEND_ERROR");

    let app = create_app(Arc::new(AppState::new(service)));
    let response = send(
        app,
        post_json("/ask", r#"{"question": "When was Vasco founded?"}"#),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = json_body(response).await;
    assert_eq!(body["error_type"], "service_unavailable");
    assert_eq!(body["details"]["code"], "EMBEDDING_BACKEND_ERROR");
}
