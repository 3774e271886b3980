// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Embedding backends
//!
//! Every backend maps a piece of text to a fixed-dimension `f32` vector. The same
//! backend (same model identifier, same dimension) must be used at ingestion and at
//! query time; the identifier is recorded in the index manifest and checked by the
//! retriever before any lookup.

pub mod hashing;
pub mod onnx_model;

pub use hashing::HashingEmbedder;
pub use onnx_model::OnnxEmbeddingModel;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::config::{EmbeddingBackend, EmbeddingSettings};

/// Failures raised by an embedding backend
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Backend could not be reached or initialised (missing model files, runtime failure)
    #[error("Embedding backend unavailable: {0}")]
    Unavailable(String),

    /// Tokenizer rejected the input
    #[error("Tokenization failed: {0}")]
    Tokenization(String),

    /// Model ran but produced something unusable
    #[error("Embedding inference failed: {0}")]
    Inference(String),

    /// Backend returned a vector of the wrong length
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl From<anyhow::Error> for EmbeddingError {
    fn from(err: anyhow::Error) -> Self {
        EmbeddingError::Inference(err.to_string())
    }
}

/// Text → vector collaborator used identically by ingestion and retrieval
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifier recorded alongside the index (e.g. "all-MiniLM-L6-v2")
    fn model_id(&self) -> &str;

    /// Output dimension of every vector this embedder produces
    fn dimension(&self) -> usize;

    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed several texts, preserving input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// Build the embedder selected by configuration
pub async fn build_embedder(settings: &EmbeddingSettings) -> anyhow::Result<Arc<dyn Embedder>> {
    match settings.backend {
        EmbeddingBackend::Onnx => {
            let model = OnnxEmbeddingModel::new(
                settings.model_name.clone(),
                &settings.model_path,
                &settings.tokenizer_path,
            )
            .await?;
            info!(
                "Using ONNX embedder {} ({} dimensions)",
                model.model_id(),
                model.dimension()
            );
            Ok(Arc::new(model))
        }
        EmbeddingBackend::Hashing => {
            let embedder = HashingEmbedder::new(settings.dimension)?;
            info!("Using offline hashing embedder {}", embedder.model_id());
            Ok(Arc::new(embedder))
        }
    }
}
