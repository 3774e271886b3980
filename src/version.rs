// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the Vasco da Gama RAG service

/// Human-readable service name
pub const SERVICE_NAME: &str = "Vasco da Gama RAG API";

/// Semantic version number
pub const VERSION_NUMBER: &str = env!("CARGO_PKG_VERSION");

/// On-disk index format understood by this build
pub const INDEX_FORMAT_VERSION: u32 = crate::rag::index_store::INDEX_FORMAT_VERSION;

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "header-aware-chunking",
    "onnx-embeddings",
    "hashing-embeddings",
    "persistent-index",
    "atomic-reingest",
    "ollama-generation",
    "source-attribution",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("{} {}", SERVICE_NAME, VERSION_NUMBER)
}

/// Get full version info for API responses
pub fn get_version_info() -> serde_json::Value {
    serde_json::json!({
        "service": SERVICE_NAME,
        "version": VERSION_NUMBER,
        "index_format": INDEX_FORMAT_VERSION,
        "features": FEATURES,
    })
}
