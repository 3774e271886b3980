// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::config::{EmbeddingBackend, RagConfig};
use crate::embeddings::build_embedder;
use crate::generation::OllamaGenerator;
use crate::rag::document::list_document_files;
use crate::rag::{IndexStore, RagError, RagService};
use crate::version;

/// Vasco da Gama knowledge base CLI
#[derive(Parser, Debug)]
#[command(name = "vasco-cli")]
#[command(version)]
#[command(about = "Ingest, query and inspect the Vasco da Gama knowledge base", long_about = None)]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, env = "RAG_CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Directory holding the Markdown documents
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Directory holding the persisted index
    #[arg(long, global = true)]
    pub index_dir: Option<PathBuf>,

    /// Embedding backend (onnx or hashing)
    #[arg(long, global = true)]
    pub embedding_backend: Option<EmbeddingBackend>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rebuild the index from the data directory
    Ingest,

    /// Ask a question against the persisted index
    Ask {
        /// Question text; multiple words are joined with spaces
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },

    /// Report documents found, index presence and manifest
    Status,
}

impl Cli {
    /// Layer command-line overrides on top of file and env configuration
    pub fn resolve_config(&self) -> Result<RagConfig> {
        let mut config = RagConfig::load(self.config.as_deref())?;
        if let Some(dir) = &self.data_dir {
            config.paths.data_dir = dir.clone();
        }
        if let Some(dir) = &self.index_dir {
            config.paths.index_dir = dir.clone();
        }
        if let Some(backend) = self.embedding_backend {
            config.embedding.backend = backend;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    let config = cli.resolve_config()?;
    match cli.command {
        Commands::Ingest => ingest(config).await,
        Commands::Ask { question } => ask(config, &question.join(" ")).await,
        Commands::Status => status(config).await,
    }
}

async fn build_service(config: RagConfig, store: Option<IndexStore>) -> Result<RagService> {
    let embedder = build_embedder(&config.embedding).await?;
    let store = match store {
        Some(store) => store,
        None => IndexStore::new(embedder.model_id(), embedder.dimension()),
    };
    let generator = OllamaGenerator::from_settings(&config.generation)?;
    let service = RagService::new(config, embedder, Arc::new(generator), Arc::new(store))?;
    Ok(service)
}

async fn ingest(config: RagConfig) -> Result<()> {
    let service = build_service(config, None).await?;
    let report = service.ingest().await?;

    println!("Ingestion complete");
    println!("  Files processed: {}", report.files_processed);
    println!("  Documents indexed: {}", report.document_count);
    println!("  Chunks: {}", report.chunk_count);
    println!("  Model: {} ({}D)", report.model_id, report.dimension);
    println!("  Index: {}", report.index_dir);
    for skipped in &report.skipped {
        println!("  Skipped {}: {}", skipped.file, skipped.reason);
    }
    for empty in &report.empty_documents {
        println!("  Empty document: {}", empty);
    }
    println!("  Took {}ms", report.elapsed_ms);
    Ok(())
}

async fn ask(config: RagConfig, question: &str) -> Result<()> {
    let index_dir = config.paths.index_dir.clone();
    let store = IndexStore::load(&index_dir)
        .await
        .with_context(|| format!("Could not open index at {}", index_dir.display()))?;

    let service = build_service(config, Some(store)).await?;
    service.check_index_compatibility().await?;

    info!("Question: {}", question);
    let answer = service.ask(question).await?;

    println!("{}", answer.answer);
    if !answer.sources.is_empty() {
        println!();
        println!("Sources:");
        for source in &answer.sources {
            println!("  - {}", source);
        }
    }
    Ok(())
}

async fn status(config: RagConfig) -> Result<()> {
    println!("{}", version::get_version_string());
    println!();

    let data_dir = &config.paths.data_dir;
    match list_document_files(data_dir).await {
        Ok(files) if files.is_empty() => {
            println!("No documents found in {}", data_dir.display());
        }
        Ok(files) => {
            println!("Found {} documents in {}:", files.len(), data_dir.display());
            for file in files {
                if let Some(name) = file.file_name() {
                    println!("  - {}", name.to_string_lossy());
                }
            }
        }
        Err(e) => println!("{}", e.user_message()),
    }
    println!();

    let index_dir = &config.paths.index_dir;
    match IndexStore::read_manifest(index_dir).await {
        Ok(manifest) => {
            println!("Index at {}:", index_dir.display());
            println!("  Records: {}", manifest.record_count);
            println!("  Documents: {}", manifest.document_count);
            println!("  Model: {} ({}D)", manifest.model_id, manifest.dimension);
            if let Some(chunking) = &manifest.chunking {
                println!(
                    "  Chunking: size {} / overlap {}",
                    chunking.chunk_size, chunking.chunk_overlap
                );
            }
            println!("  Built: {}", manifest.created_at.to_rfc3339());
        }
        Err(RagError::IndexNotFound(_)) => {
            println!("No index at {}. Run `vasco-cli ingest`.", index_dir.display());
        }
        Err(e) => println!("Index at {} is unusable: {}", index_dir.display(), e),
    }
    println!();

    println!(
        "Embedding: {:?} ({})",
        config.embedding.backend, config.embedding.model_name
    );
    println!(
        "Generation: {} at {}",
        config.generation.model, config.generation.base_url
    );
    Ok(())
}
