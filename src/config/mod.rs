// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Process configuration
//!
//! All chunking, retrieval, embedding and generation parameters live in one
//! [`RagConfig`]. Values are layered: built-in defaults, then an optional TOML file,
//! then environment variables. [`RagConfig::validate`] runs once at startup so an
//! invalid combination (e.g. overlap ≥ chunk size) fails before any work is done.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::rag::errors::RagError;

/// Environment variable naming an optional TOML config file
pub const CONFIG_FILE_ENV: &str = "RAG_CONFIG_FILE";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub paths: PathsConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingSettings,
    pub generation: GenerationSettings,
    pub server: ServerConfig,
    pub ingest: IngestConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding the Markdown knowledge base
    pub data_dir: PathBuf,
    /// Directory holding the persisted index
    pub index_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/vasco_da_gama"),
            index_dir: PathBuf::from("vectorstore"),
        }
    }
}

/// Chunk window parameters, measured in characters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Split at Markdown headers before windowing
    pub header_aware: bool,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 100,
            header_aware: true,
        }
    }
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), RagError> {
        if self.chunk_size == 0 {
            return Err(RagError::Configuration(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Configuration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of nearest chunks requested from the index
    pub top_k: usize,
    /// Ceiling on the total characters of retrieved chunk text
    pub context_budget: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            context_budget: 4000,
        }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<(), RagError> {
        if self.top_k == 0 {
            return Err(RagError::Configuration(
                "top_k must be greater than 0".to_string(),
            ));
        }
        if self.context_budget == 0 {
            return Err(RagError::Configuration(
                "context_budget must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// all-MiniLM-L6-v2 via ONNX Runtime
    Onnx,
    /// Offline feature hashing, no model files needed
    Hashing,
}

impl FromStr for EmbeddingBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "onnx" => Ok(Self::Onnx),
            "hashing" | "hash" => Ok(Self::Hashing),
            other => Err(format!("unknown embedding backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub backend: EmbeddingBackend,
    pub model_name: String,
    pub model_path: PathBuf,
    pub tokenizer_path: PathBuf,
    /// Output dimension; only consulted by the hashing backend
    pub dimension: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Onnx,
            model_name: "all-MiniLM-L6-v2".to_string(),
            model_path: PathBuf::from("./models/all-MiniLM-L6-v2-onnx/model.onnx"),
            tokenizer_path: PathBuf::from("./models/all-MiniLM-L6-v2-onnx/tokenizer.json"),
            dimension: 384,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub timeout_secs: u64,
    /// Topic named in the prompt preamble
    pub domain: String,
    /// Exact reply expected when the context lacks the answer
    pub unknown_sentinel: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
            temperature: 0.1,
            top_p: 0.9,
            top_k: 40,
            timeout_secs: 60,
            domain: "Clube de Regatas Vasco da Gama".to_string(),
            unknown_sentinel: "I don't know".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Concurrent embedding requests during ingestion
    pub embed_concurrency: usize,
    /// Texts per embedding request
    pub embed_batch_size: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            embed_concurrency: 4,
            embed_batch_size: 16,
        }
    }
}

impl RagConfig {
    /// Defaults, then the file named by `explicit` or `RAG_CONFIG_FILE`, then env overrides
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let file = explicit
            .map(Path::to_path_buf)
            .or_else(|| env::var(CONFIG_FILE_ENV).ok().map(PathBuf::from));

        let mut config = match file {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: RagConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Overlay environment variables onto the current values
    pub fn apply_env(&mut self) -> Result<(), RagError> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    /// Overlay values from `lookup`; a value that fails to parse is an error
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), RagError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("DATA_DIR") {
            self.paths.data_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("INDEX_DIR") {
            self.paths.index_dir = PathBuf::from(v);
        }

        override_parsed(&lookup, "CHUNK_SIZE", &mut self.chunking.chunk_size)?;
        override_parsed(&lookup, "CHUNK_OVERLAP", &mut self.chunking.chunk_overlap)?;
        if let Some(v) = lookup("HEADER_AWARE_CHUNKING") {
            self.chunking.header_aware = v.to_lowercase() != "false" && v != "0";
        }

        override_parsed(&lookup, "TOP_K", &mut self.retrieval.top_k)?;
        override_parsed(&lookup, "CONTEXT_BUDGET", &mut self.retrieval.context_budget)?;

        override_parsed(&lookup, "EMBEDDING_BACKEND", &mut self.embedding.backend)?;
        if let Some(v) = lookup("EMBEDDING_MODEL") {
            self.embedding.model_name = v;
        }
        if let Some(v) = lookup("EMBEDDING_MODEL_PATH") {
            self.embedding.model_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("EMBEDDING_TOKENIZER_PATH") {
            self.embedding.tokenizer_path = PathBuf::from(v);
        }
        override_parsed(&lookup, "EMBEDDING_DIMENSION", &mut self.embedding.dimension)?;

        if let Some(v) = lookup("OLLAMA_BASE_URL") {
            self.generation.base_url = v;
        }
        if let Some(v) = lookup("OLLAMA_MODEL") {
            self.generation.model = v;
        }
        override_parsed(&lookup, "GENERATION_TEMPERATURE", &mut self.generation.temperature)?;
        override_parsed(&lookup, "GENERATION_TIMEOUT_SECS", &mut self.generation.timeout_secs)?;

        if let Some(v) = lookup("API_HOST") {
            self.server.host = v;
        }
        override_parsed(&lookup, "API_PORT", &mut self.server.port)?;

        override_parsed(&lookup, "EMBED_CONCURRENCY", &mut self.ingest.embed_concurrency)?;
        override_parsed(&lookup, "EMBED_BATCH_SIZE", &mut self.ingest.embed_batch_size)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), RagError> {
        self.chunking.validate()?;
        self.retrieval.validate()?;

        if self.embedding.dimension == 0 {
            return Err(RagError::Configuration(
                "embedding dimension must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(RagError::Configuration(format!(
                "generation temperature must be within 0.0..=2.0, got {}",
                self.generation.temperature
            )));
        }
        if self.generation.unknown_sentinel.trim().is_empty() {
            return Err(RagError::Configuration(
                "unknown_sentinel cannot be empty".to_string(),
            ));
        }
        if self.ingest.embed_concurrency == 0 || self.ingest.embed_batch_size == 0 {
            return Err(RagError::Configuration(
                "embed_concurrency and embed_batch_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn override_parsed<T, F>(lookup: &F, key: &str, target: &mut T) -> Result<(), RagError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(key) {
        *target = raw.trim().parse().map_err(|_| {
            RagError::Configuration(format!("{}={}: not a valid value", key, raw))
        })?;
    }
    Ok(())
}
