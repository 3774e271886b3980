// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use std::{env, sync::Arc};
use tracing::info;
use vasco_rag::{
    api::{start_server, AppState},
    config::RagConfig,
    embeddings::build_embedder,
    generation::{Generator, OllamaGenerator},
    rag::{IndexStore, RagService},
    version,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    info!("Starting {}", version::get_version_string());

    let config = RagConfig::load(None).context("Invalid configuration")?;
    info!(
        "Chunking {}/{} chars, top-k {}, context budget {} chars",
        config.chunking.chunk_size,
        config.chunking.chunk_overlap,
        config.retrieval.top_k,
        config.retrieval.context_budget
    );

    let embedder = build_embedder(&config.embedding)
        .await
        .context("Failed to initialise embedding backend")?;

    let store = IndexStore::load_or_new(
        &config.paths.index_dir,
        embedder.model_id(),
        embedder.dimension(),
    )
    .await?;
    let manifest = store.manifest().await;
    info!(
        "Index: {} records from {} documents ({})",
        manifest.record_count, manifest.document_count, manifest.model_id
    );

    let generator = OllamaGenerator::from_settings(&config.generation)?;
    info!(
        "Generation backend: {} model {} at {}",
        generator.name(),
        generator.model(),
        config.generation.base_url
    );

    let listen_addr = config.server.listen_addr();
    let service = Arc::new(RagService::new(
        config,
        embedder,
        Arc::new(generator),
        Arc::new(store),
    )?);

    // An index built by another embedding model cannot be queried
    service.check_index_compatibility().await?;

    start_server(Arc::new(AppState::new(service)), &listen_addr).await
}
