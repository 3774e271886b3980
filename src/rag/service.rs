// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Question answering and ingestion over one shared index

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::chunker::{Chunk, Chunker};
use super::document::{read_documents, Document, SkippedFile};
use super::errors::RagError;
use super::index_store::{IndexGeneration, IndexManifest, IndexRecord, IndexStore};
use super::prompt::PromptBuilder;
use super::retriever::Retriever;
use crate::config::RagConfig;
use crate::embeddings::Embedder;
use crate::generation::{GenerationOptions, Generator};

/// Longest accepted question, in characters after trimming
pub const MAX_QUESTION_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    /// Files read as documents, including empty ones
    pub files_processed: usize,
    /// Files that could not be read
    pub skipped: Vec<SkippedFile>,
    /// Documents that were readable but produced no chunks
    pub empty_documents: Vec<String>,
    pub document_count: usize,
    pub chunk_count: usize,
    pub model_id: String,
    pub dimension: usize,
    pub index_dir: String,
    pub elapsed_ms: u64,
}

/// Trim and bound-check a question
pub fn validate_question(question: &str) -> Result<&str, RagError> {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        return Err(RagError::InvalidQuestion(
            "question cannot be empty".to_string(),
        ));
    }
    let len = trimmed.chars().count();
    if len > MAX_QUESTION_CHARS {
        return Err(RagError::InvalidQuestion(format!(
            "question is {} characters, maximum is {}",
            len, MAX_QUESTION_CHARS
        )));
    }
    Ok(trimmed)
}

pub struct RagService {
    config: RagConfig,
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    store: Arc<IndexStore>,
    retriever: Retriever,
    prompt: PromptBuilder,
    options: GenerationOptions,
    ingest_lock: Mutex<()>,
}

impl RagService {
    pub fn new(
        config: RagConfig,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        store: Arc<IndexStore>,
    ) -> Result<Self, RagError> {
        config.validate()?;
        let chunker = Chunker::new(config.chunking.clone())?;
        let retriever = Retriever::new(embedder.clone(), store.clone(), config.retrieval.clone());
        let prompt = PromptBuilder::from_settings(&config.generation);
        let options = GenerationOptions::from(&config.generation);

        Ok(Self {
            config,
            chunker,
            embedder,
            generator,
            store,
            retriever,
            prompt,
            options,
            ingest_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<IndexStore> {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Fail if a non-empty index was built by a different embedding model
    pub async fn check_index_compatibility(&self) -> Result<(), RagError> {
        let manifest = self.store.manifest().await;
        if manifest.record_count == 0 {
            return Ok(());
        }
        if manifest.model_id != self.embedder.model_id() {
            return Err(RagError::ModelMismatch {
                index_model: manifest.model_id,
                query_model: self.embedder.model_id().to_string(),
            });
        }
        if manifest.dimension != self.embedder.dimension() {
            return Err(RagError::DimensionMismatch {
                expected: manifest.dimension,
                actual: self.embedder.dimension(),
            });
        }
        Ok(())
    }

    /// Answer a question from the indexed knowledge base
    pub async fn ask(&self, question: &str) -> Result<Answer, RagError> {
        let question = validate_question(question)?;
        if self.store.is_empty().await {
            return Err(RagError::EmptyIndex);
        }

        info!("Answering question ({} chars)", question.chars().count());
        let retrieval = self.retriever.retrieve(question).await?;
        if retrieval.is_empty() {
            debug!("No context fits the budget, prompting for the unknown sentinel");
        }

        let prompt = self.prompt.build(question, &retrieval);
        let answer = self.generator.generate(&prompt, &self.options).await?;

        Ok(Answer {
            answer,
            sources: retrieval.sources,
        })
    }

    /// Rebuild the index from the configured data directory and persist it
    pub async fn ingest(&self) -> Result<IngestReport, RagError> {
        let _guard = self.ingest_lock.lock().await;
        let started = Instant::now();
        let data_dir = &self.config.paths.data_dir;
        let index_dir = &self.config.paths.index_dir;

        info!("Ingesting documents from {}", data_dir.display());
        let set = read_documents(data_dir).await?;
        let files_processed = set.documents.len();

        let empty_documents: Vec<String> = set
            .documents
            .iter()
            .filter(|d| d.is_blank())
            .map(|d| d.id.clone())
            .collect();

        // Live index changes only after a successful save
        let generation = self.build_generation(&set.documents).await?;
        generation.save(index_dir).await?;
        let manifest = self.store.commit(generation).await;

        let report = IngestReport {
            files_processed,
            skipped: set.skipped,
            empty_documents,
            document_count: manifest.document_count,
            chunk_count: manifest.record_count,
            model_id: manifest.model_id,
            dimension: manifest.dimension,
            index_dir: index_dir.display().to_string(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            "Ingestion complete: {} chunks from {} documents in {}ms ({} skipped)",
            report.chunk_count,
            report.document_count,
            report.elapsed_ms,
            report.skipped.len()
        );
        Ok(report)
    }

    /// Chunk, embed and swap in `documents` without touching disk
    pub async fn index_documents(&self, documents: &[Document]) -> Result<IndexManifest, RagError> {
        let _guard = self.ingest_lock.lock().await;
        let generation = self.build_generation(documents).await?;
        Ok(self.store.commit(generation).await)
    }

    async fn build_generation(
        &self,
        documents: &[Document],
    ) -> Result<Arc<IndexGeneration>, RagError> {
        let chunks = self.chunker.chunk_all(documents);
        if chunks.is_empty() {
            return Err(RagError::NoDocuments(
                "every document was empty".to_string(),
            ));
        }
        info!(
            "Created {} chunks from {} documents",
            chunks.len(),
            documents.len()
        );

        let vectors = self.embed_chunks(&chunks).await?;
        let records = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexRecord::new(chunk, vector))
            .collect();

        IndexStore::prepare(
            self.embedder.model_id(),
            self.embedder.dimension(),
            Some(self.config.chunking.clone()),
            records,
        )
    }

    /// Embed chunk texts in concurrent batches, keeping chunk order
    async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>, RagError> {
        let batch_size = self.config.ingest.embed_batch_size;
        let concurrency = self.config.ingest.embed_concurrency;
        let batches: Vec<Vec<String>> = chunks
            .chunks(batch_size)
            .map(|batch| batch.iter().map(|c| c.text.clone()).collect())
            .collect();
        let batch_count = batches.len();

        let embedder = &self.embedder;
        let mut pending = stream::iter(batches.into_iter().enumerate())
            .map(|(position, texts)| async move {
                embedder
                    .embed_batch(&texts)
                    .await
                    .map(|vectors| (position, texts.len(), vectors))
            })
            .buffer_unordered(concurrency);

        let mut slots: Vec<Option<Vec<Vec<f32>>>> = vec![None; batch_count];
        let mut done = 0;
        while let Some(result) = pending.next().await {
            let (position, expected, vectors) = result?;
            if vectors.len() != expected {
                warn!(
                    "Embedding batch {} returned {} vectors for {} texts",
                    position,
                    vectors.len(),
                    expected
                );
                return Err(RagError::Embedding(
                    crate::embeddings::EmbeddingError::Inference(format!(
                        "batch returned {} vectors for {} texts",
                        vectors.len(),
                        expected
                    )),
                ));
            }
            slots[position] = Some(vectors);
            done += 1;
            debug!("Embedded batch {}/{}", done, batch_count);
        }

        Ok(slots.into_iter().flatten().flatten().collect())
    }
}
