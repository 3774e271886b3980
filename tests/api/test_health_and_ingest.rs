// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! GET /, GET /health and POST /ingest

use axum::http::StatusCode;
use tempfile::TempDir;

use super::support::{empty_app, get, indexed_app, json_body, post_json, send, ScriptedGenerator};

#[tokio::test]
async fn test_root_lists_endpoints() {
    let tmp = TempDir::new().unwrap();
    let app = empty_app(tmp.path(), ScriptedGenerator::Reply("x".to_string()));

    let response = send(app, get("/")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    let endpoints = body["endpoints"].as_array().unwrap();
    assert!(endpoints.iter().any(|e| e == "POST /ask"));
}

#[tokio::test]
async fn test_health_unavailable_until_indexed() {
    let tmp = TempDir::new().unwrap();
    let app = empty_app(tmp.path(), ScriptedGenerator::Reply("x".to_string()));

    let response = send(app, get("/health")).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = json_body(response).await;
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["index"]["records"], 0);
}

#[tokio::test]
async fn test_health_reports_index() {
    let tmp = TempDir::new().unwrap();
    let app = indexed_app(tmp.path(), ScriptedGenerator::Reply("x".to_string())).await;

    let response = send(app, get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["index"]["records"], 1);
    assert_eq!(body["index"]["documents"], 1);
    assert_eq!(body["index"]["model"], "hashing-bow-128");
    assert_eq!(body["index"]["dimension"], 128);
}

#[tokio::test]
async fn test_ingest_endpoint_rebuilds_and_persists() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join("cores.md"),
        "# Cores\nBlack and white with a diagonal sash.",
    )
    .unwrap();
    std::fs::write(
        tmp.path().join("estadio.md"),
        "# Estádio\nSão Januário opened in 1927.",
    )
    .unwrap();

    let app = empty_app(tmp.path(), ScriptedGenerator::Reply("1927".to_string()));

    let response = send(app.clone(), post_json("/ingest", "")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let report = json_body(response).await;
    assert_eq!(report["document_count"], 2);
    assert_eq!(report["chunk_count"], 2);
    assert!(tmp.path().join("vectorstore").join("manifest.json").exists());

    let response = send(app.clone(), get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(
        app,
        post_json("/ask", r#"{"question": "When did São Januário open?"}"#),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["answer"], "1927");
    let sources = body["sources"].as_array().unwrap();
    assert!(sources.iter().any(|s| s == "estadio.md"));
}

#[tokio::test]
async fn test_ingest_without_documents_is_500() {
    let tmp = TempDir::new().unwrap();
    let app = empty_app(tmp.path(), ScriptedGenerator::Reply("x".to_string()));

    let response = send(app, post_json("/ingest", "")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = json_body(response).await;
    assert_eq!(body["details"]["code"], "NO_DOCUMENTS");
}
