// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Deterministic document chunking
//!
//! Documents are first split at Markdown headers (when enabled), then each segment is cut
//! into windows of at most `chunk_size` characters. Every following window starts
//! `chunk_overlap` characters before the previous one ended, so consecutive chunks of a
//! segment share exactly the overlap and every character lands in at least one chunk.
//!
//! Offsets and lengths count `char`s, never bytes.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::document::{header_regex, Document};
use super::errors::RagError;
use crate::config::ChunkingConfig;

/// How far back a window end may move to land on whitespace
pub const WORD_BOUNDARY_LOOKBACK: usize = 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// `{document}::chunk_{index}`
    pub id: String,
    pub document_id: String,
    /// Position within the document, starting at 0
    pub index: usize,
    pub text: String,
    /// Char offset of the first character
    pub start: usize,
    /// Char offset one past the last character
    pub end: usize,
    /// Nearest enclosing Markdown header
    pub heading: Option<String>,
}

impl Chunk {
    pub fn make_id(document_id: &str, index: usize) -> String {
        format!("{}::chunk_{}", document_id, index)
    }

    pub fn char_len(&self) -> usize {
        self.end - self.start
    }
}

/// A contiguous char range sharing one heading
#[derive(Debug, Clone, PartialEq)]
struct Segment {
    start: usize,
    end: usize,
    heading: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self, RagError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Split one document into chunks
    pub fn chunk(&self, document: &Document) -> Vec<Chunk> {
        if document.is_blank() {
            warn!("Document {} is empty, producing no chunks", document.id);
            return Vec::new();
        }

        let chars: Vec<char> = document.text.chars().collect();
        let segments = if self.config.header_aware {
            header_segments(&document.text, chars.len())
        } else {
            vec![Segment {
                start: 0,
                end: chars.len(),
                heading: None,
            }]
        };

        let mut chunks = Vec::new();
        for segment in &segments {
            for (start, end) in self.windows(&chars, segment.start, segment.end) {
                let index = chunks.len();
                chunks.push(Chunk {
                    id: Chunk::make_id(&document.id, index),
                    document_id: document.id.clone(),
                    index,
                    text: chars[start..end].iter().collect(),
                    start,
                    end,
                    heading: segment.heading.clone(),
                });
            }
        }

        debug!(
            "Chunked {} into {} chunks across {} segments",
            document.id,
            chunks.len(),
            segments.len()
        );
        chunks
    }

    /// Chunk every document, preserving document order
    pub fn chunk_all(&self, documents: &[Document]) -> Vec<Chunk> {
        documents.iter().flat_map(|doc| self.chunk(doc)).collect()
    }

    /// Window `[start, end)` ranges covering `chars[seg_start..seg_end]`
    fn windows(&self, chars: &[char], seg_start: usize, seg_end: usize) -> Vec<(usize, usize)> {
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;
        let mut ranges = Vec::new();
        let mut start = seg_start;

        loop {
            let hard_end = (start + size).min(seg_end);
            let mut end = hard_end;

            if hard_end < seg_end && splits_word(chars, hard_end) {
                // The next window starts at `end - overlap`, which must stay past `start`
                let floor = hard_end
                    .saturating_sub(WORD_BOUNDARY_LOOKBACK)
                    .max(start + overlap);
                if let Some(ws) = (floor..hard_end).rev().find(|&i| chars[i].is_whitespace()) {
                    end = ws + 1;
                }
            }

            ranges.push((start, end));
            if end >= seg_end {
                break;
            }
            start = end - overlap;
        }

        ranges
    }
}

fn splits_word(chars: &[char], cut: usize) -> bool {
    cut > 0 && cut < chars.len() && !chars[cut - 1].is_whitespace() && !chars[cut].is_whitespace()
}

/// Segments starting at each header line; a whitespace-only preamble joins the first one
fn header_segments(text: &str, total_chars: usize) -> Vec<Segment> {
    let mut headers: Vec<(usize, String)> = Vec::new();
    let mut last_byte = 0;
    let mut last_char = 0;
    for cap in header_regex().captures_iter(text) {
        let (Some(line), Some(title)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        last_char += text[last_byte..line.start()].chars().count();
        last_byte = line.start();
        headers.push((last_char, title.as_str().to_string()));
    }

    if headers.is_empty() {
        return vec![Segment {
            start: 0,
            end: total_chars,
            heading: None,
        }];
    }

    let mut segments = Vec::with_capacity(headers.len() + 1);
    let first_header = headers[0].0;
    let preamble_has_content = text
        .chars()
        .take(first_header)
        .any(|c| !c.is_whitespace());
    if preamble_has_content {
        segments.push(Segment {
            start: 0,
            end: first_header,
            heading: None,
        });
    }

    for (i, (start, title)) in headers.iter().enumerate() {
        let start = if i == 0 && !preamble_has_content { 0 } else { *start };
        let end = headers.get(i + 1).map(|(s, _)| *s).unwrap_or(total_chars);
        segments.push(Segment {
            start,
            end,
            heading: Some(title.clone()),
        });
    }

    segments
}
