// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Question → ranked, deduplicated, budget-bounded context

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use super::errors::RagError;
use super::index_store::IndexStore;
use crate::config::RetrievalConfig;
use crate::embeddings::Embedder;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub document_id: String,
    pub text: String,
    pub heading: Option<String>,
    pub score: f32,
}

/// Ranked context for one question
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunks: Vec<RetrievedChunk>,
    /// Distinct document ids in rank order
    pub sources: Vec<String>,
}

impl RetrievalResult {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn context_chars(&self) -> usize {
        self.chunks.iter().map(|c| c.text.chars().count()).sum()
    }

    fn from_chunks(chunks: Vec<RetrievedChunk>) -> Self {
        let mut seen = HashSet::new();
        let sources = chunks
            .iter()
            .filter(|c| seen.insert(c.document_id.as_str()))
            .map(|c| c.document_id.clone())
            .collect();
        Self { chunks, sources }
    }
}

pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<IndexStore>,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<IndexStore>, config: RetrievalConfig) -> Self {
        Self {
            embedder,
            store,
            config,
        }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub async fn retrieve(&self, question: &str) -> Result<RetrievalResult, RagError> {
        let query = self.embedder.embed(question).await?;

        let generation = self.store.snapshot().await;
        if generation.is_empty() {
            debug!("Index is empty, returning no context");
            return Ok(RetrievalResult::default());
        }

        let manifest = generation.manifest();
        if manifest.model_id != self.embedder.model_id() {
            return Err(RagError::ModelMismatch {
                index_model: manifest.model_id.clone(),
                query_model: self.embedder.model_id().to_string(),
            });
        }
        if query.len() != manifest.dimension {
            return Err(RagError::DimensionMismatch {
                expected: manifest.dimension,
                actual: query.len(),
            });
        }

        let candidates = generation.query(&query, self.config.top_k)?;
        let candidate_count = candidates.len();

        let mut seen = HashSet::new();
        let mut used = 0usize;
        let mut chunks = Vec::new();
        for candidate in candidates {
            let chunk = candidate.record.chunk;
            if !seen.insert(chunk.id.clone()) {
                continue;
            }
            let len = chunk.text.chars().count();
            if used + len > self.config.context_budget {
                debug!(
                    "Context budget {} reached after {} chunks",
                    self.config.context_budget,
                    chunks.len()
                );
                break;
            }
            used += len;
            chunks.push(RetrievedChunk {
                chunk_id: chunk.id,
                document_id: chunk.document_id,
                text: chunk.text,
                heading: chunk.heading,
                score: candidate.score,
            });
        }

        let result = RetrievalResult::from_chunks(chunks);
        info!(
            "Retrieved {} of {} candidates ({} chars) from {:?}",
            result.len(),
            candidate_count,
            used,
            result.sources
        );
        Ok(result)
    }
}
