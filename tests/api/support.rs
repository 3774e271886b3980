// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Router fixtures backed by the hashing embedder and a scripted generator

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{body::Body, http::Request, response::Response, Router};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot`
use vasco_rag::{
    api::{create_app, AppState},
    config::{EmbeddingBackend, RagConfig},
    embeddings::{Embedder, EmbeddingError},
    generation::{GenerationError, GenerationOptions, Generator},
    rag::{Chunk, IndexRecord},
    Document, HashingEmbedder, IndexStore, RagService,
};

/// Generator whose behaviour is fixed per test
pub enum ScriptedGenerator {
    Reply(String),
    Down,
    MissingModel,
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        _prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<String, GenerationError> {
        match self {
            ScriptedGenerator::Reply(text) => Ok(text.clone()),
            ScriptedGenerator::Down => Err(GenerationError::Unreachable(
                "http://localhost:11434".to_string(),
            )),
            ScriptedGenerator::MissingModel => {
                Err(GenerationError::ModelNotFound("llama3".to_string()))
            }
        }
    }
}

/// Embedder whose backend is always down, posing as the hashing model
pub struct UnavailableEmbedder;

#[async_trait]
impl Embedder for UnavailableEmbedder {
    fn model_id(&self) -> &str {
        "hashing-bow-128"
    }

    fn dimension(&self) -> usize {
        128
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Unavailable(
            "model files not loaded".to_string(),
        ))
    }
}

/// Store holding one founding-year chunk embedded by the hashing model
pub async fn populated_store() -> Arc<IndexStore> {
    let text = "Vasco was founded in 1898.";
    let vector = HashingEmbedder::new(128).unwrap().embed_sync(text);
    let chunk = Chunk {
        id: Chunk::make_id("historia.md", 0),
        document_id: "historia.md".to_string(),
        index: 0,
        text: text.to_string(),
        start: 0,
        end: text.chars().count(),
        heading: None,
    };
    let store = Arc::new(IndexStore::new("hashing-bow-128", 128));
    store.put(vec![IndexRecord::new(chunk, vector)]).await.unwrap();
    store
}

/// Service over a populated index whose embedder cannot be reached
pub async fn embedder_down_service(data_dir: &Path) -> Arc<RagService> {
    let mut config = RagConfig::default();
    config.paths.data_dir = data_dir.to_path_buf();
    config.paths.index_dir = data_dir.join("vectorstore");
    config.embedding.backend = EmbeddingBackend::Hashing;
    config.embedding.dimension = 128;

    Arc::new(
        RagService::new(
            config,
            Arc::new(UnavailableEmbedder),
            Arc::new(ScriptedGenerator::Reply("unused".to_string())),
            populated_store().await,
        )
        .unwrap(),
    )
}

pub fn test_service(data_dir: &Path, generator: ScriptedGenerator) -> Arc<RagService> {
    let mut config = RagConfig::default();
    config.paths.data_dir = data_dir.to_path_buf();
    config.paths.index_dir = data_dir.join("vectorstore");
    config.embedding.backend = EmbeddingBackend::Hashing;
    config.embedding.dimension = 128;

    let embedder = Arc::new(HashingEmbedder::new(128).unwrap());
    let store = Arc::new(IndexStore::new("hashing-bow-128", 128));
    Arc::new(RagService::new(config, embedder, Arc::new(generator), store).unwrap())
}

/// Router over a service pre-loaded with one founding-year document
pub async fn indexed_app(data_dir: &Path, generator: ScriptedGenerator) -> Router {
    let service = test_service(data_dir, generator);
    service
        .index_documents(&[Document::new(
            "historia.md",
            "# História\nVasco was founded in 1898.",
        )])
        .await
        .unwrap();
    create_app(Arc::new(AppState::new(service)))
}

pub fn empty_app(data_dir: &Path, generator: ScriptedGenerator) -> Router {
    create_app(Arc::new(AppState::new(test_service(data_dir, generator))))
}

pub fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn send(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.unwrap()
}

pub async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
