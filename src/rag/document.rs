// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Knowledge base documents and the directory loader

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{info, warn};

use super::errors::RagError;

/// File extensions picked up from the data directory
pub const DOCUMENT_EXTENSIONS: &[&str] = &["md", "markdown", "txt"];

/// Matches a Markdown ATX header line, capturing its text
pub(crate) fn header_regex() -> &'static Regex {
    static HEADER: OnceLock<Regex> = OnceLock::new();
    HEADER.get_or_init(|| {
        Regex::new(r"(?m)^#{1,6}[ \t]+(\S[^\r\n]*?)[ \t]*\r?$").expect("header pattern is valid")
    })
}

/// A source document; immutable once read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Source file name, used for attribution
    pub id: String,
    pub text: String,
    /// Markdown section headers in document order
    pub headers: Vec<String>,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let headers = header_regex()
            .captures_iter(&text)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .collect();

        Self {
            id: id.into(),
            text,
            headers,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A file that could not be turned into a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub file: String,
    pub reason: String,
}

/// Result of scanning the data directory
#[derive(Debug, Clone, Default)]
pub struct DocumentSet {
    pub documents: Vec<Document>,
    pub skipped: Vec<SkippedFile>,
}

fn has_document_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| DOCUMENT_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// List candidate document files (non-recursive), sorted by file name
pub async fn list_document_files(dir: &Path) -> Result<Vec<std::path::PathBuf>, RagError> {
    if !tokio::fs::try_exists(dir).await.unwrap_or(false) {
        return Err(RagError::DataDirNotFound(dir.display().to_string()));
    }

    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.is_file() && has_document_extension(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Read every document in `dir`
///
/// Unreadable or non-UTF-8 files are recorded in [`DocumentSet::skipped`] instead of
/// aborting the scan. Fails only when the directory is missing or has no candidates.
pub async fn read_documents(dir: &Path) -> Result<DocumentSet, RagError> {
    let files = list_document_files(dir).await?;
    if files.is_empty() {
        return Err(RagError::NoDocuments(dir.display().to_string()));
    }

    info!("Found {} document files in {}", files.len(), dir.display());

    let mut set = DocumentSet::default();
    for path in files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        match tokio::fs::read(&path).await {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(text) => {
                    info!("Loaded {}", name);
                    set.documents.push(Document::new(name, text));
                }
                Err(_) => {
                    warn!("Skipping {}: not valid UTF-8", name);
                    set.skipped.push(SkippedFile {
                        file: name,
                        reason: "not valid UTF-8".to_string(),
                    });
                }
            },
            Err(e) => {
                warn!("Skipping {}: {}", name, e);
                set.skipped.push(SkippedFile {
                    file: name,
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(set)
}
