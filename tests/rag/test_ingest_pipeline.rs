// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Ingestion, persistence and live index replacement

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use vasco_rag::rag::{Document, IndexRecord, IndexStore};

use super::support::{self, RecordingGenerator, COLORS_MD, HISTORY_MD};

fn sorted_records(records: &[IndexRecord]) -> Vec<IndexRecord> {
    let mut records = records.to_vec();
    records.sort_by(|a, b| a.chunk.id.cmp(&b.chunk.id));
    records
}

#[tokio::test]
async fn test_reingest_is_idempotent_and_persisted() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let index_dir = out.path().join("vectorstore");
    support::write_docs(
        data.path(),
        &[("colors.md", COLORS_MD), ("history.md", HISTORY_MD)],
    );

    let svc = support::service(
        support::config(data.path(), &index_dir, 120, 20),
        Arc::new(RecordingGenerator::new("ok")),
    );

    let first = svc.ingest().await.unwrap();
    let first_records = sorted_records(svc.store().snapshot().await.records());

    let second = svc.ingest().await.unwrap();
    let second_records = sorted_records(svc.store().snapshot().await.records());

    assert_eq!(first.chunk_count, second.chunk_count);
    assert_eq!(first_records, second_records);

    let loaded = IndexStore::load(&index_dir).await.unwrap();
    let manifest = loaded.manifest().await;
    assert_eq!(manifest, svc.store().manifest().await);
    assert_eq!(manifest.document_count, 2);
    assert_eq!(manifest.model_id, format!("hashing-bow-{}", support::DIMENSION));
    assert_eq!(manifest.chunking.as_ref().map(|c| c.chunk_size), Some(120));
    assert_eq!(
        sorted_records(loaded.snapshot().await.records()),
        second_records
    );
}

#[tokio::test]
async fn test_ingest_reports_skipped_files() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    support::write_docs(data.path(), &[("colors.md", COLORS_MD), ("blank.md", "\n")]);
    std::fs::write(data.path().join("latin1.md"), [0x56, 0x61, 0x73, 0xe7, 0x6f]).unwrap();
    std::fs::write(data.path().join("logo.svg"), "<svg/>").unwrap();

    let svc = support::service(
        support::config(data.path(), &out.path().join("idx"), 500, 100),
        Arc::new(RecordingGenerator::new("ok")),
    );
    let report = svc.ingest().await.unwrap();

    assert_eq!(report.files_processed, 2);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].file, "latin1.md");
    assert_eq!(report.empty_documents, vec!["blank.md".to_string()]);
    assert_eq!(report.document_count, 1);
}

#[tokio::test]
async fn test_missing_data_dir_is_reported() {
    let out = TempDir::new().unwrap();
    let svc = support::service(
        support::config(&out.path().join("nope"), &out.path().join("idx"), 500, 100),
        Arc::new(RecordingGenerator::new("ok")),
    );
    let err = svc.ingest().await.unwrap_err();
    assert_eq!(err.error_code(), "DATA_DIR_NOT_FOUND");
    assert!(svc.store().is_empty().await);
}

#[tokio::test]
async fn test_readers_see_whole_generations_during_reingest() {
    let tmp = TempDir::new().unwrap();
    let svc = Arc::new(support::service(
        support::config(tmp.path(), &tmp.path().join("idx"), 50, 10),
        Arc::new(RecordingGenerator::new("ok")),
    ));

    let small = vec![Document::new("colors.md", COLORS_MD)];
    let large = vec![
        Document::new("colors.md", COLORS_MD),
        Document::new("history.md", HISTORY_MD),
    ];
    let small_len = svc.index_documents(&small).await.unwrap().record_count;
    let large_len = svc.index_documents(&large).await.unwrap().record_count;
    assert!(large_len > small_len);

    let reader = {
        let svc = svc.clone();
        tokio::spawn(async move {
            for _ in 0..200 {
                let generation = svc.store().snapshot().await;
                let len = generation.len();
                assert!(len == small_len || len == large_len, "saw partial index of {}", len);
                assert_eq!(generation.manifest().record_count, len);
                tokio::task::yield_now().await;
            }
        })
    };

    for i in 0..10 {
        let docs = if i % 2 == 0 { &small } else { &large };
        svc.index_documents(docs).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    reader.await.unwrap();
}
