// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod cli;
pub mod config;
pub mod embeddings;
pub mod generation;
pub mod rag;
pub mod version;

// Re-export main types
pub use config::RagConfig;
pub use embeddings::{Embedder, EmbeddingError, HashingEmbedder, OnnxEmbeddingModel};
pub use generation::{GenerationError, GenerationOptions, Generator, OllamaGenerator};
pub use rag::{
    Answer, Chunk, Chunker, Document, IndexStore, IngestReport, PromptBuilder, RagError,
    RagService, RetrievalResult, Retriever,
};
