// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Retrieval-augmented question answering
//!
//! Ingest: documents → [`Chunker`] → embedder → [`IndexStore`].
//! Query: question → embedder → [`Retriever`] → [`PromptBuilder`] → generator.

pub mod chunker;
pub mod document;
pub mod errors;
pub mod index_store;
pub mod prompt;
pub mod retriever;
pub mod service;

pub use chunker::{Chunk, Chunker, WORD_BOUNDARY_LOOKBACK};
pub use document::{read_documents, Document, DocumentSet, SkippedFile};
pub use errors::RagError;
pub use index_store::{IndexGeneration, IndexManifest, IndexRecord, IndexStore, ScoredRecord};
pub use prompt::PromptBuilder;
pub use retriever::{RetrievalResult, RetrievedChunk, Retriever};
pub use service::{validate_question, Answer, IngestReport, RagService, MAX_QUESTION_CHARS};
