// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use super::{ApiError, AskRequest, AskResponse, HealthResponse, IndexInfo, RootResponse};
use crate::rag::RagService;
use crate::version;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RagService>,
}

impl AppState {
    pub fn new(service: Arc<RagService>) -> Self {
        Self { service }
    }
}

pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/ask", post(ask_handler))
        .route("/ingest", post(ingest_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(state: Arc<AppState>, addr: &str) -> anyhow::Result<()> {
    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("API server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}

async fn root_handler() -> Json<RootResponse> {
    Json(RootResponse {
        service: version::SERVICE_NAME.to_string(),
        version: version::VERSION_NUMBER.to_string(),
        endpoints: vec![
            "GET /health".to_string(),
            "POST /ask".to_string(),
            "POST /ingest".to_string(),
        ],
    })
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Response {
    let manifest = state.service.store().manifest().await;
    let index = IndexInfo::from(&manifest);

    if manifest.record_count == 0 {
        let body = HealthResponse {
            status: "unhealthy".to_string(),
            message: "Index is empty. Run ingestion first.".to_string(),
            index,
        };
        return (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response();
    }

    let body = HealthResponse {
        status: "healthy".to_string(),
        message: format!(
            "{} chunks from {} documents ready",
            manifest.record_count, manifest.document_count
        ),
        index,
    };
    (StatusCode::OK, Json(body)).into_response()
}

async fn ask_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
    let answer = state.service.ask(&request.question).await?;
    info!("Answered with {} sources", answer.sources.len());
    Ok(Json(answer.into()))
}

async fn ingest_handler(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let report = state.service.ingest().await?;
    Ok((StatusCode::OK, Json(report)).into_response())
}
