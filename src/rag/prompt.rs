// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Grounded prompt assembly

use super::retriever::RetrievalResult;
use crate::config::GenerationSettings;

const NO_CONTEXT: &str = "(No relevant context was found in the knowledge base.)";

#[derive(Debug, Clone, PartialEq)]
pub struct PromptBuilder {
    domain: String,
    unknown_sentinel: String,
}

impl PromptBuilder {
    pub fn new(domain: impl Into<String>, unknown_sentinel: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            unknown_sentinel: unknown_sentinel.into(),
        }
    }

    pub fn from_settings(settings: &GenerationSettings) -> Self {
        Self::new(settings.domain.clone(), settings.unknown_sentinel.clone())
    }

    pub fn unknown_sentinel(&self) -> &str {
        &self.unknown_sentinel
    }

    /// Render the prompt; identical inputs always give identical output
    pub fn build(&self, question: &str, context: &RetrievalResult) -> String {
        let sentinel = &self.unknown_sentinel;
        let mut prompt = format!(
            "You are an assistant answering questions about {domain}.\n\
             \n\
             RULES:\n\
             1. Answer ONLY from the context below; it is the single source of truth.\n\
             2. Do not add facts from outside the context or from prior knowledge.\n\
             3. Do not guess or speculate.\n\
             4. If the context does not contain the answer, reply exactly \"{sentinel}\".\n\
             5. Keep the answer short and factual, and name the source document you used.\n\
             \n\
             CONTEXT:\n",
            domain = self.domain,
            sentinel = sentinel,
        );

        if context.is_empty() {
            prompt.push_str(NO_CONTEXT);
            prompt.push('\n');
            prompt.push_str(&format!(
                "Since there is no context, reply exactly \"{}\".\n",
                sentinel
            ));
        } else {
            let blocks: Vec<String> = context
                .chunks
                .iter()
                .map(|chunk| format!("[Source: {}]\n{}", chunk.document_id, chunk.text))
                .collect();
            prompt.push_str(&blocks.join("\n\n"));
            prompt.push('\n');
        }

        prompt.push_str("\nQUESTION: ");
        prompt.push_str(question);
        prompt.push_str("\n\nANSWER:");
        prompt
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::from_settings(&GenerationSettings::default())
    }
}
