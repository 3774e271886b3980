// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Ollama generation client
//!
//! Sends `POST {base_url}/api/generate` with streaming disabled and returns the
//! trimmed `response` field.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{GenerationError, GenerationOptions, Generator};
use crate::config::GenerationSettings;

pub struct OllamaGenerator {
    base_url: String,
    model: String,
    timeout_secs: u64,
    client: Client,
}

impl OllamaGenerator {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| {
                GenerationError::Unreachable(format!("failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            timeout_secs,
            client,
        })
    }

    pub fn from_settings(settings: &GenerationSettings) -> Result<Self, GenerationError> {
        Self::new(
            settings.base_url.clone(),
            settings.model.clone(),
            settings.timeout_secs,
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: &'a GenerationOptions,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, GenerationError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options,
        };

        debug!(
            "Calling Ollama model {} with {} prompt chars",
            self.model,
            prompt.chars().count()
        );

        let response = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout {
                        timeout_secs: self.timeout_secs,
                    }
                } else if e.is_connect() {
                    GenerationError::Unreachable(self.base_url.clone())
                } else {
                    GenerationError::Api {
                        status: 0,
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(GenerationError::ModelNotFound(self.model.clone()));
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let data: GenerateResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidResponse(format!("JSON parse error: {}", e)))?;

        Ok(data.response.trim().to_string())
    }
}
