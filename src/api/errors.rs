// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{error, warn};

use crate::embeddings::EmbeddingError;
use crate::generation::GenerationError;
use crate::rag::RagError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error_type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub details: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone)]
pub enum ApiError {
    NotFound(String),
    InvalidRequest(String),
    ValidationError {
        field: String,
        message: String,
    },
    /// Index not ready or a backend is down
    ServiceUnavailable {
        code: String,
        message: String,
    },
    Timeout(String),
    InternalError {
        code: String,
        message: String,
    },
}

fn code_details(code: &str) -> Option<HashMap<String, serde_json::Value>> {
    let mut details = HashMap::new();
    details.insert(
        "code".to_string(),
        serde_json::Value::String(code.to_string()),
    );
    Some(details)
}

impl ApiError {
    pub fn to_response(&self, request_id: Option<String>) -> ErrorResponse {
        let (error_type, message, details) = match self {
            ApiError::NotFound(msg) => ("not_found", msg.clone(), None),
            ApiError::InvalidRequest(msg) => ("invalid_request", msg.clone(), None),
            ApiError::ValidationError { field, message } => {
                let mut details = HashMap::new();
                details.insert(
                    "field".to_string(),
                    serde_json::Value::String(field.clone()),
                );
                ("validation_error", message.clone(), Some(details))
            }
            ApiError::ServiceUnavailable { code, message } => {
                ("service_unavailable", message.clone(), code_details(code))
            }
            ApiError::Timeout(msg) => ("timeout", msg.clone(), None),
            ApiError::InternalError { code, message } => {
                ("internal_error", message.clone(), code_details(code))
            }
        };

        ErrorResponse {
            error_type: error_type.to_string(),
            message,
            request_id,
            details,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::NotFound(_) => 404,
            ApiError::InvalidRequest(_) | ApiError::ValidationError { .. } => 400,
            ApiError::ServiceUnavailable { .. } => 503,
            ApiError::Timeout(_) => 504,
            ApiError::InternalError { .. } => 500,
        }
    }
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        let code = err.error_code().to_string();
        let message = err.user_message();
        match err {
            RagError::InvalidQuestion(message) => ApiError::ValidationError {
                field: "question".to_string(),
                message,
            },
            RagError::EmptyIndex | RagError::IndexNotFound(_) => {
                ApiError::ServiceUnavailable { code, message }
            }
            RagError::Embedding(EmbeddingError::Unavailable(_)) => {
                ApiError::ServiceUnavailable { code, message }
            }
            RagError::Generation(GenerationError::Timeout { .. }) => ApiError::Timeout(message),
            RagError::Generation(
                GenerationError::Unreachable(_) | GenerationError::ModelNotFound(_),
            ) => ApiError::ServiceUnavailable { code, message },
            other => {
                if other.is_configuration_error() {
                    error!("Configuration error while serving request: {}", other);
                } else {
                    warn!("Request failed: {}", other);
                }
                ApiError::InternalError { code, message }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let request_id = Some(uuid::Uuid::new_v4().to_string());
        (status, Json(self.to_response(request_id))).into_response()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ApiError::ValidationError { field, message } => {
                write!(f, "Validation error for {}: {}", field, message)
            }
            ApiError::ServiceUnavailable { message, .. } => {
                write!(f, "Service unavailable: {}", message)
            }
            ApiError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            ApiError::InternalError { message, .. } => write!(f, "Internal error: {}", message),
        }
    }
}

impl std::error::Error for ApiError {}
