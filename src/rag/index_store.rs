// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! In-memory vector index with atomic generation swap and on-disk persistence
//!
//! The corpus lives in an immutable [`IndexGeneration`]. Writers validate and build a
//! complete new generation, then swap the `Arc` under a write lock; readers clone the
//! `Arc` and never observe a partially replaced corpus.
//!
//! On disk an index is a directory holding `manifest.json` and `records.bin`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::chunker::Chunk;
use super::errors::RagError;
use crate::config::ChunkingConfig;

pub const INDEX_FORMAT_VERSION: u32 = 1;
pub const MANIFEST_FILE: &str = "manifest.json";
pub const RECORDS_FILE: &str = "records.bin";

/// A chunk and its embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

impl IndexRecord {
    pub fn new(chunk: Chunk, vector: Vec<f32>) -> Self {
        Self { chunk, vector }
    }

    pub fn chunk_id(&self) -> &str {
        &self.chunk.id
    }

    pub fn document_id(&self) -> &str {
        &self.chunk.document_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub format_version: u32,
    /// Embedding model that produced every vector
    pub model_id: String,
    pub dimension: usize,
    pub record_count: usize,
    pub document_count: usize,
    /// Chunking parameters used at ingestion, if known
    pub chunking: Option<ChunkingConfig>,
    pub created_at: DateTime<Utc>,
}

impl IndexManifest {
    fn new(
        model_id: &str,
        dimension: usize,
        chunking: Option<ChunkingConfig>,
        records: &[IndexRecord],
    ) -> Self {
        let documents: HashSet<&str> = records.iter().map(|r| r.document_id()).collect();
        Self {
            format_version: INDEX_FORMAT_VERSION,
            model_id: model_id.to_string(),
            dimension,
            record_count: records.len(),
            document_count: documents.len(),
            chunking,
            created_at: Utc::now(),
        }
    }
}

/// A record with its similarity to a query
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub record: IndexRecord,
    pub score: f32,
    /// Insertion position, the tie-breaker for equal scores
    pub position: usize,
}

/// One immutable corpus
#[derive(Debug)]
pub struct IndexGeneration {
    manifest: IndexManifest,
    records: Vec<IndexRecord>,
    norms: Vec<f32>,
}

impl IndexGeneration {
    fn empty(model_id: &str, dimension: usize) -> Self {
        Self {
            manifest: IndexManifest::new(model_id, dimension, None, &[]),
            records: Vec::new(),
            norms: Vec::new(),
        }
    }

    /// Validate every record, all-or-nothing
    fn build(manifest: IndexManifest, records: Vec<IndexRecord>) -> Result<Self, RagError> {
        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            validate_record(record, manifest.dimension)?;
            if !seen.insert(record.chunk_id()) {
                return Err(RagError::InvalidRecord {
                    chunk_id: record.chunk_id().to_string(),
                    reason: "duplicate chunk id".to_string(),
                });
            }
        }

        let norms = records.iter().map(|r| l2_norm(&r.vector)).collect();
        Ok(Self {
            manifest,
            records,
            norms,
        })
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn records(&self) -> &[IndexRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Top `k` records by cosine similarity; equal scores keep insertion order
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredRecord>, RagError> {
        if vector.len() != self.manifest.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.manifest.dimension,
                actual: vector.len(),
            });
        }
        if k == 0 || self.records.is_empty() {
            return Ok(Vec::new());
        }

        let query_norm = l2_norm(vector);
        let mut scored: Vec<(usize, f32)> = self
            .records
            .iter()
            .zip(&self.norms)
            .enumerate()
            .map(|(i, (record, norm))| (i, cosine(vector, query_norm, &record.vector, *norm)))
            .collect();

        // sort_by is stable, so ties stay in insertion order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(position, score)| ScoredRecord {
                record: self.records[position].clone(),
                score,
                position,
            })
            .collect())
    }

    /// Persist this generation to `dir`
    ///
    /// Files are written to a temporary sibling directory which is then renamed into
    /// place, so readers never see a half-written index.
    pub async fn save(&self, dir: &Path) -> Result<IndexManifest, RagError> {
        let manifest = self.manifest.clone();

        let parent = match dir.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "index".to_string());
        tokio::fs::create_dir_all(&parent).await?;

        let staging = parent.join(format!(".{}.tmp-{}", name, uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&staging).await?;

        let manifest_json = serde_json::to_vec_pretty(&manifest)?;
        let records_bin = bincode::serialize(&self.records)?;
        let written = async {
            tokio::fs::write(staging.join(MANIFEST_FILE), manifest_json).await?;
            tokio::fs::write(staging.join(RECORDS_FILE), records_bin).await?;
            Ok::<_, std::io::Error>(())
        }
        .await;
        if let Err(e) = written {
            let _ = tokio::fs::remove_dir_all(&staging).await;
            return Err(e.into());
        }

        let backup = parent.join(format!(".{}.old-{}", name, uuid::Uuid::new_v4()));
        let had_existing = tokio::fs::try_exists(dir).await.unwrap_or(false);
        if had_existing {
            tokio::fs::rename(dir, &backup).await?;
        }

        if let Err(e) = tokio::fs::rename(&staging, dir).await {
            if had_existing {
                let _ = tokio::fs::rename(&backup, dir).await;
            }
            let _ = tokio::fs::remove_dir_all(&staging).await;
            return Err(e.into());
        }

        if had_existing {
            if let Err(e) = tokio::fs::remove_dir_all(&backup).await {
                warn!("Failed to remove old index {}: {}", backup.display(), e);
            }
        }

        info!(
            "Saved index ({} records) to {}",
            manifest.record_count,
            dir.display()
        );
        Ok(manifest)
    }
}

fn validate_record(record: &IndexRecord, dimension: usize) -> Result<(), RagError> {
    if record.vector.len() != dimension {
        return Err(RagError::InvalidRecord {
            chunk_id: record.chunk_id().to_string(),
            reason: format!(
                "expected {} dimensions, got {}",
                dimension,
                record.vector.len()
            ),
        });
    }
    if record.vector.iter().any(|v| !v.is_finite()) {
        return Err(RagError::InvalidRecord {
            chunk_id: record.chunk_id().to_string(),
            reason: "vector contains NaN or Infinity".to_string(),
        });
    }
    Ok(())
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn cosine(a: &[f32], a_norm: f32, b: &[f32], b_norm: f32) -> f32 {
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    dot / (a_norm * b_norm)
}

/// Shared handle to the live corpus
#[derive(Debug)]
pub struct IndexStore {
    current: RwLock<Arc<IndexGeneration>>,
}

impl IndexStore {
    /// Empty store expecting vectors from `model_id`
    pub fn new(model_id: impl AsRef<str>, dimension: usize) -> Self {
        Self {
            current: RwLock::new(Arc::new(IndexGeneration::empty(model_id.as_ref(), dimension))),
        }
    }

    /// Current generation; hold it to observe one consistent corpus
    pub async fn snapshot(&self) -> Arc<IndexGeneration> {
        self.current.read().await.clone()
    }

    pub async fn manifest(&self) -> IndexManifest {
        self.snapshot().await.manifest().clone()
    }

    pub async fn len(&self) -> usize {
        self.snapshot().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.snapshot().await.is_empty()
    }

    /// Replace the corpus, keeping the current model and dimension
    pub async fn put(&self, records: Vec<IndexRecord>) -> Result<IndexManifest, RagError> {
        let current = self.snapshot().await;
        let manifest = current.manifest();
        self.replace(
            &manifest.model_id,
            manifest.dimension,
            manifest.chunking.clone(),
            records,
        )
        .await
    }

    /// Replace the corpus with records produced by `model_id`
    ///
    /// On any validation failure the previous corpus stays live.
    pub async fn replace(
        &self,
        model_id: &str,
        dimension: usize,
        chunking: Option<ChunkingConfig>,
        records: Vec<IndexRecord>,
    ) -> Result<IndexManifest, RagError> {
        let generation = Self::prepare(model_id, dimension, chunking, records)?;
        Ok(self.commit(generation).await)
    }

    /// Validate `records` into a generation without making it live
    pub fn prepare(
        model_id: &str,
        dimension: usize,
        chunking: Option<ChunkingConfig>,
        records: Vec<IndexRecord>,
    ) -> Result<Arc<IndexGeneration>, RagError> {
        let manifest = IndexManifest::new(model_id, dimension, chunking, &records);
        Ok(Arc::new(IndexGeneration::build(manifest, records)?))
    }

    /// Make a prepared generation the live corpus
    pub async fn commit(&self, generation: Arc<IndexGeneration>) -> IndexManifest {
        let manifest = generation.manifest().clone();
        *self.current.write().await = generation;
        info!(
            "Index replaced: {} records from {} documents ({}, {}D)",
            manifest.record_count, manifest.document_count, manifest.model_id, manifest.dimension
        );
        manifest
    }

    pub async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredRecord>, RagError> {
        self.snapshot().await.query(vector, k)
    }

    /// Persist the current generation to `dir`
    pub async fn save(&self, dir: &Path) -> Result<IndexManifest, RagError> {
        self.snapshot().await.save(dir).await
    }

    /// Read and validate a persisted index
    pub async fn load(dir: &Path) -> Result<Self, RagError> {
        let manifest = Self::read_manifest(dir).await?;

        let bytes = tokio::fs::read(dir.join(RECORDS_FILE))
            .await
            .map_err(|e| RagError::IndexCorrupt(format!("{}: {}", RECORDS_FILE, e)))?;
        let records: Vec<IndexRecord> = bincode::deserialize(&bytes)
            .map_err(|e| RagError::IndexCorrupt(format!("{}: {}", RECORDS_FILE, e)))?;

        if records.len() != manifest.record_count {
            return Err(RagError::IndexCorrupt(format!(
                "manifest lists {} records, found {}",
                manifest.record_count,
                records.len()
            )));
        }

        let generation = IndexGeneration::build(manifest, records).map_err(|e| match e {
            RagError::InvalidRecord { chunk_id, reason } => {
                RagError::IndexCorrupt(format!("record {}: {}", chunk_id, reason))
            }
            other => other,
        })?;

        debug!(
            "Loaded index from {}: {} records",
            dir.display(),
            generation.len()
        );
        Ok(Self {
            current: RwLock::new(Arc::new(generation)),
        })
    }

    /// Load `dir` if an index exists there, otherwise start empty
    pub async fn load_or_new(
        dir: &Path,
        model_id: &str,
        dimension: usize,
    ) -> Result<Self, RagError> {
        match Self::load(dir).await {
            Ok(store) => Ok(store),
            Err(RagError::IndexNotFound(path)) => {
                warn!("No index at {}, starting with an empty store", path);
                Ok(Self::new(model_id, dimension))
            }
            Err(e) => Err(e),
        }
    }

    /// Read only the manifest of a persisted index
    pub async fn read_manifest(dir: &Path) -> Result<IndexManifest, RagError> {
        let manifest_path = dir.join(MANIFEST_FILE);
        let raw = match tokio::fs::read(&manifest_path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RagError::IndexNotFound(dir.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let manifest: IndexManifest = serde_json::from_slice(&raw)
            .map_err(|e| RagError::IndexCorrupt(format!("{}: {}", MANIFEST_FILE, e)))?;
        if manifest.format_version != INDEX_FORMAT_VERSION {
            return Err(RagError::IndexCorrupt(format!(
                "unsupported format version {} (expected {})",
                manifest.format_version, INDEX_FORMAT_VERSION
            )));
        }
        Ok(manifest)
    }
}
