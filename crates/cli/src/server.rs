//! HTTP query API.
//!
//! Routes:
//! - `GET /`        service banner
//! - `GET /health`  200 when the retriever is ready, 503 otherwise
//! - `POST /query`  answer a question
//! - `GET /models`  selectable generation models
//! - `GET /stats`   aggregate counts over the records file
//!
//! Any origin may call the API; the browser frontend is served separately.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use incidex_core::AppError;
use incidex_retrieval::{
    HealthReport, ModelList, QueryFailure, QueryRequest, QueryResponse, QueryService, RecordStats,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

#[derive(Clone)]
pub struct AppState {
    service: Arc<QueryService>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error class
    pub error: &'static str,
    pub message: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_chunks_retrieved: Option<usize>,
}

type ApiError = (StatusCode, Json<ErrorBody>);

pub fn router(service: Arc<QueryService>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/query", post(query_handler))
        .route("/models", get(models))
        .route("/stats", get(stats))
        .layer(CorsLayer::permissive())
        .with_state(AppState { service })
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "Incidex incident question answering API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "active",
    }))
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let report = state.service.health();
    let status = if report.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

async fn query_handler(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| bad_request(rejection.body_text()))?;

    state
        .service
        .query(request)
        .await
        .map(Json)
        .map_err(failure_response)
}

async fn models(State(state): State<AppState>) -> Json<ModelList> {
    Json(state.service.models())
}

async fn stats(State(state): State<AppState>) -> Result<Json<RecordStats>, ApiError> {
    state
        .service
        .stats()
        .await
        .map(Json)
        .map_err(|e| error_response(&e, None))
}

/// HTTP status for an error class.
pub fn status_for(error: &AppError) -> StatusCode {
    match error {
        AppError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        AppError::NotReady(_) | AppError::ResourceLoad(_) | AppError::ProviderInit(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        AppError::Generation(_) | AppError::Llm(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: &AppError, num_chunks_retrieved: Option<usize>) -> ApiError {
    let status = status_for(error);
    if status.is_server_error() {
        tracing::error!(error_class = error.kind(), "Request failed: {}", error);
    } else {
        tracing::debug!(error_class = error.kind(), "Request rejected: {}", error);
    }

    (
        status,
        Json(ErrorBody {
            error: error.kind(),
            message: error.to_string(),
            retryable: error.is_retryable(),
            num_chunks_retrieved,
        }),
    )
}

fn failure_response(failure: QueryFailure) -> ApiError {
    error_response(&failure.error, failure.num_chunks_retrieved)
}

fn bad_request(message: impl Into<String>) -> ApiError {
    error_response(&AppError::InvalidArgument(message.into()), None)
}
