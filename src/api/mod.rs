//! HTTP surface of the prediction service

pub mod guide;
pub mod handlers;

use crate::config::AppConfig;
use crate::error::ServiceError;
use crate::metrics::ServiceMetrics;
use crate::models::{InferenceEngine, ModelRegistry};
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ModelRegistry>,
    pub engine: Arc<InferenceEngine>,
    pub metrics: Arc<ServiceMetrics>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Wire the engine to the registry using the configured limits
    pub fn new(config: AppConfig, registry: Arc<ModelRegistry>) -> Self {
        let engine = Arc::new(InferenceEngine::new(
            registry.clone(),
            config.inference.max_batch_size,
        ));
        Self {
            registry,
            engine,
            metrics: Arc::new(ServiceMetrics::new()),
            config: Arc::new(config),
        }
    }
}

/// Build the service router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/predict", post(handlers::predict))
        .route("/batch_predict", post(handlers::batch_predict))
        .route("/model/info", get(handlers::model_info))
        .route("/model/reload", post(handlers::reload))
        .route("/recommendations", get(handlers::recommendations))
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation { .. }
            | ServiceError::BatchTooLarge { .. }
            | ServiceError::MalformedBody(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::ServiceUnavailable
            | ServiceError::ArtifactNotFound { .. }
            | ServiceError::ArtifactUnparseable { .. }
            | ServiceError::ScalerInvalid { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Computation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        ServiceError::MalformedBody(rejection.body_text())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
