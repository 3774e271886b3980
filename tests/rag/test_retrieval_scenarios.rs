// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! End-to-end retrieval behaviour on small knowledge bases

use std::sync::Arc;
use tempfile::TempDir;
use vasco_rag::config::RetrievalConfig;
use vasco_rag::rag::{Document, IndexStore, PromptBuilder, Retriever};
use vasco_rag::Embedder;

use super::support::{self, RecordingGenerator, COLORS_MD, HISTORY_MD};

#[tokio::test]
async fn test_founding_year_single_chunk() {
    let tmp = TempDir::new().unwrap();
    let generator = Arc::new(RecordingGenerator::new("Vasco was founded in 1898."));
    let svc = support::service(
        support::config(tmp.path(), &tmp.path().join("idx"), 100, 0),
        generator.clone(),
    );

    let manifest = svc
        .index_documents(&[Document::new("vasco.md", "Vasco was founded in 1898.")])
        .await
        .unwrap();
    assert_eq!(manifest.record_count, 1);

    let retriever = Retriever::new(
        svc.embedder().clone(),
        svc.store().clone(),
        RetrievalConfig::default(),
    );
    let result = retriever.retrieve("When was Vasco founded?").await.unwrap();
    assert_eq!(result.chunks[0].chunk_id, "vasco.md::chunk_0");
    assert_eq!(result.chunks[0].text, "Vasco was founded in 1898.");
    assert_eq!(result.sources, vec!["vasco.md".to_string()]);

    let answer = svc.ask("When was Vasco founded?").await.unwrap();
    assert_eq!(answer.answer, "Vasco was founded in 1898.");
    assert_eq!(answer.sources, vec!["vasco.md".to_string()]);

    let prompts = generator.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("[Source: vasco.md]\nVasco was founded in 1898."));
}

#[tokio::test]
async fn test_unrelated_question_still_returns_nearest_chunks() {
    let tmp = TempDir::new().unwrap();
    let mut config = support::config(tmp.path(), &tmp.path().join("idx"), 80, 10);
    config.retrieval.top_k = 3;
    let svc = support::service(config, Arc::new(RecordingGenerator::new("I don't know")));

    let manifest = svc
        .index_documents(&[Document::new("colors.md", COLORS_MD)])
        .await
        .unwrap();
    assert!(manifest.record_count >= 3);

    let retriever = Retriever::new(
        svc.embedder().clone(),
        svc.store().clone(),
        RetrievalConfig {
            top_k: 3,
            context_budget: 4000,
        },
    );
    let result = retriever
        .retrieve("Who scored the most goals in 1950?")
        .await
        .unwrap();

    // No similarity cut-off: the top-k nearest chunks come back regardless of relevance
    assert_eq!(result.len(), 3);
    assert_eq!(result.sources, vec!["colors.md".to_string()]);

    let answer = svc.ask("Who scored the most goals in 1950?").await.unwrap();
    assert_eq!(answer.answer, "I don't know");
}

#[tokio::test]
async fn test_retrieve_is_deterministic_and_bounded() {
    let tmp = TempDir::new().unwrap();
    let svc = support::service(
        support::config(tmp.path(), &tmp.path().join("idx"), 60, 15),
        Arc::new(RecordingGenerator::new("ok")),
    );
    svc.index_documents(&[
        Document::new("colors.md", COLORS_MD),
        Document::new("history.md", HISTORY_MD),
    ])
    .await
    .unwrap();

    for (top_k, budget) in [(5, 4000), (4, 150), (10, 61), (3, 10)] {
        let retriever = Retriever::new(
            svc.embedder().clone(),
            svc.store().clone(),
            RetrievalConfig {
                top_k,
                context_budget: budget,
            },
        );
        let first = retriever.retrieve("When was the stadium built?").await.unwrap();
        let second = retriever.retrieve("When was the stadium built?").await.unwrap();
        assert_eq!(first, second);

        assert!(first.len() <= top_k);
        assert!(first.context_chars() <= budget);
        let mut ids: Vec<_> = first.chunks.iter().map(|c| c.chunk_id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), first.len(), "chunks must be distinct");
        for pair in first.chunks.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }
}

#[tokio::test]
async fn test_empty_index_gives_empty_result_and_sentinel_prompt() {
    let embedder = support::embedder();
    let store = Arc::new(IndexStore::new(embedder.model_id(), embedder.dimension()));
    let retriever = Retriever::new(embedder, store, RetrievalConfig::default());

    let result = retriever.retrieve("When was Vasco founded?").await.unwrap();
    assert!(result.is_empty());

    let prompt = PromptBuilder::default().build("When was Vasco founded?", &result);
    assert!(prompt.contains("No relevant context"));
    assert!(prompt.contains("reply exactly \"I don't know\""));
}
