// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Generation backend boundary
//!
//! The pipeline hands one assembled prompt plus a fixed low-temperature sampling
//! configuration to a [`Generator`] and expects one text completion back. Retries and
//! backoff are the backend's business; failures are surfaced unchanged.

pub mod ollama;

pub use ollama::OllamaGenerator;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::GenerationSettings;

/// Sampling parameters sent with every prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            top_p: 0.9,
            top_k: 40,
        }
    }
}

impl From<&GenerationSettings> for GenerationOptions {
    fn from(settings: &GenerationSettings) -> Self {
        Self {
            temperature: settings.temperature,
            top_p: settings.top_p,
            top_k: settings.top_k,
        }
    }
}

#[derive(Error, Debug)]
pub enum GenerationError {
    /// Backend could not be reached
    #[error("Generation backend unreachable: {0}")]
    Unreachable(String),

    /// Backend does not have the requested model
    #[error("Model '{0}' not found on generation backend")]
    ModelNotFound(String),

    /// Request exceeded the configured timeout
    #[error("Generation timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Backend answered with an error status
    #[error("Generation backend returned {status}: {message}")]
    Api { status: u16, message: String },

    /// Backend answered with something we could not parse
    #[error("Invalid generation response: {0}")]
    InvalidResponse(String),
}

impl GenerationError {
    pub fn user_message(&self) -> String {
        match self {
            GenerationError::Unreachable(url) => format!(
                "Could not connect to the generation backend at {}. Please ensure it is running.",
                url
            ),
            GenerationError::ModelNotFound(model) => format!(
                "Model '{}' not found. Please pull the model first: ollama pull {}",
                model, model
            ),
            _ => self.to_string(),
        }
    }

    /// Backend is down or slow rather than misconfigured
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            GenerationError::Unreachable(_) | GenerationError::Timeout { .. }
        )
    }
}

/// Single prompt → single completion collaborator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Generator: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &str;

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, GenerationError>;
}
