// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error types for the retrieval pipeline
//!
//! Errors fall into a few classes:
//! - Configuration errors (invalid chunk sizes, embedding model or dimension mismatch)
//! - Index state errors (empty, missing or corrupt index)
//! - Ingestion input errors (missing data directory, no documents)
//! - Collaborator failures (embedding or generation backend)
//!
//! "No relevant context" is deliberately absent: an empty retrieval result is data,
//! not an error.

use thiserror::Error;

use crate::embeddings::EmbeddingError;
use crate::generation::GenerationError;

#[derive(Error, Debug)]
pub enum RagError {
    /// Invalid configuration detected at startup
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Index was built with a different embedding model than the one querying it
    #[error("Embedding model mismatch: index built with '{index_model}', query uses '{query_model}'")]
    ModelMismatch {
        index_model: String,
        query_model: String,
    },

    /// Vector dimensions don't match the index
    #[error("Dimension mismatch: index stores {expected}D vectors, got {actual}D")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Index holds zero records
    #[error("Index is empty: run ingestion before asking questions")]
    EmptyIndex,

    /// No persisted index at the given location
    #[error("Index not found at path: {0}")]
    IndexNotFound(String),

    /// Persisted index failed validation
    #[error("Index is corrupt: {0}")]
    IndexCorrupt(String),

    /// A record handed to the index failed validation
    #[error("Invalid index record {chunk_id}: {reason}")]
    InvalidRecord { chunk_id: String, reason: String },

    /// Knowledge base directory is missing
    #[error("Data directory not found: {0}")]
    DataDirNotFound(String),

    /// Knowledge base directory contains no readable documents
    #[error("No documents found in {0}")]
    NoDocuments(String),

    /// Question failed validation
    #[error("Invalid question: {0}")]
    InvalidQuestion(String),

    /// Embedding backend failure
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    /// Generation backend failure
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// Index (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for RagError {
    fn from(err: serde_json::Error) -> Self {
        RagError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for RagError {
    fn from(err: bincode::Error) -> Self {
        RagError::Serialization(err.to_string())
    }
}

impl RagError {
    /// Get user-friendly error message for API responses
    pub fn user_message(&self) -> String {
        match self {
            RagError::EmptyIndex => {
                "The knowledge base has not been indexed yet. Run ingestion first.".to_string()
            }
            RagError::IndexNotFound(path) => {
                format!("Vector store not found at {}. Run ingestion first.", path)
            }
            RagError::ModelMismatch {
                index_model,
                query_model,
            } => format!(
                "Index was built with '{}' but the service embeds with '{}'. Re-run ingestion.",
                index_model, query_model
            ),
            RagError::Embedding(EmbeddingError::Unavailable(_)) => {
                "Embedding backend is unavailable".to_string()
            }
            RagError::Generation(err) => err.user_message(),
            _ => self.to_string(),
        }
    }

    /// Get error code for logging and metrics
    pub fn error_code(&self) -> &'static str {
        match self {
            RagError::Configuration(_) => "CONFIGURATION_ERROR",
            RagError::ModelMismatch { .. } => "MODEL_MISMATCH",
            RagError::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            RagError::EmptyIndex => "EMPTY_INDEX",
            RagError::IndexNotFound(_) => "INDEX_NOT_FOUND",
            RagError::IndexCorrupt(_) => "INDEX_CORRUPT",
            RagError::InvalidRecord { .. } => "INVALID_RECORD",
            RagError::DataDirNotFound(_) => "DATA_DIR_NOT_FOUND",
            RagError::NoDocuments(_) => "NO_DOCUMENTS",
            RagError::InvalidQuestion(_) => "INVALID_QUESTION",
            RagError::Embedding(_) => "EMBEDDING_BACKEND_ERROR",
            RagError::Generation(_) => "GENERATION_BACKEND_ERROR",
            RagError::Serialization(_) => "SERIALIZATION_ERROR",
            RagError::Io(_) => "IO_ERROR",
        }
    }

    /// Fatal misconfiguration that must not silently degrade
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            RagError::Configuration(_)
                | RagError::ModelMismatch { .. }
                | RagError::DimensionMismatch { .. }
        )
    }

    /// Failure of an external collaborator (embedding or generation)
    pub fn is_collaborator_error(&self) -> bool {
        matches!(self, RagError::Embedding(_) | RagError::Generation(_))
    }
}
