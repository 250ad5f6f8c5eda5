//! Route handlers

use crate::api::{guide, AppState};
use crate::error::ServiceError;
use crate::feature_extractor::FeatureExtractor;
use crate::metrics::MetricsSnapshot;
use crate::models::PredictionResult;
use crate::types::farm::{FarmInput, FeatureVector};
use crate::types::prediction::{
    BatchPredictionInput, BatchPredictionResponse, HealthResponse, PredictionResponse,
};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};
use std::time::Instant;
use tracing::{error, info, warn};

fn health_response(state: &AppState) -> HealthResponse {
    let snapshot = state.registry.snapshot();
    HealthResponse {
        status: if snapshot.is_healthy() { "healthy" } else { "unhealthy" }.to_string(),
        model_loaded: snapshot.model_loaded,
        scaler_loaded: snapshot.scaler_loaded,
        last_error: snapshot.last_error,
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

fn record_failure(state: &AppState, err: &ServiceError) {
    state.metrics.record_failure(err.kind());
    match err {
        ServiceError::Computation(_) => error!(error = %err, "Prediction error"),
        _ => warn!(error = %err, kind = err.kind(), "Request rejected"),
    }
}

fn respond(state: &AppState, predictions: Vec<PredictionResult>) -> Vec<PredictionResponse> {
    predictions
        .iter()
        .map(|p| {
            let response = p.to_response();
            state
                .metrics
                .record_prediction(response.farm_size_category, response.confidence_score);
            response
        })
        .collect()
}

/// `GET /`
pub async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(guide::service_banner(state.engine.model_version()))
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health_response(&state))
}

/// `POST /predict`
pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<FarmInput>, JsonRejection>,
) -> Result<Json<PredictionResponse>, ServiceError> {
    let start = Instant::now();

    let outcome = payload
        .map_err(ServiceError::from)
        .and_then(|Json(input)| FeatureVector::new(input))
        .and_then(|vector| state.engine.predict(&vector));
    state.metrics.record_request(start.elapsed());

    match outcome {
        Ok(result) => {
            let response = respond(&state, vec![result]).remove(0);
            info!(
                prediction_id = %response.prediction_id,
                prediction = response.predicted_egg_production,
                category = %response.farm_size_category,
                processing_time_us = start.elapsed().as_micros() as u64,
                "Prediction served"
            );
            Ok(Json(response))
        }
        Err(e) => {
            record_failure(&state, &e);
            Err(e)
        }
    }
}

/// Size limit first, then every element in order.
fn validate_batch(
    batch: BatchPredictionInput,
    max_batch_size: usize,
) -> Result<Vec<FeatureVector>, ServiceError> {
    if batch.farms.len() > max_batch_size {
        return Err(ServiceError::BatchTooLarge {
            len: batch.farms.len(),
            max: max_batch_size,
        });
    }
    batch.farms.into_iter().map(FeatureVector::new).collect()
}

/// `POST /batch_predict`
pub async fn batch_predict(
    State(state): State<AppState>,
    payload: Result<Json<BatchPredictionInput>, JsonRejection>,
) -> Result<Json<BatchPredictionResponse>, ServiceError> {
    let start = Instant::now();

    let outcome = payload
        .map_err(ServiceError::from)
        .and_then(|Json(batch)| validate_batch(batch, state.engine.max_batch_size()))
        .and_then(|vectors| state.engine.predict_batch(&vectors));
    state.metrics.record_request(start.elapsed());

    match outcome {
        Ok(results) => {
            let predictions = respond(&state, results);
            info!(
                count = predictions.len(),
                processing_time_us = start.elapsed().as_micros() as u64,
                "Batch prediction served"
            );
            Ok(Json(BatchPredictionResponse {
                total_predictions: predictions.len(),
                predictions,
                timestamp: Utc::now(),
            }))
        }
        Err(e) => {
            record_failure(&state, &e);
            Err(e)
        }
    }
}

/// `GET /model/info`
pub async fn model_info(State(state): State<AppState>) -> Result<Json<Value>, ServiceError> {
    let (scaler, loaded) = state.registry.artifacts()?;
    let description = loaded.model.describe();
    let file = loaded
        .path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned());

    Ok(Json(json!({
        "model_type": description.backend,
        "model_file": file,
        "loaded_by": loaded.tier,
        "scaler": scaler.kind(),
        "version": env!("CARGO_PKG_VERSION"),
        "features": FeatureExtractor::new().feature_names(),
        "feature_count": description.input_width,
        "target": "Total_egg_production",
        "input_shape": [Value::Null, description.input_width],
        "output_shape": [Value::Null, description.output_width],
        "summary": description.summary,
        "optimal_ranges": guide::optimal_ranges(),
    })))
}

/// `GET /recommendations`
pub async fn recommendations() -> Json<Value> {
    Json(guide::management_guide())
}

/// `POST /model/reload`
pub async fn reload(State(state): State<AppState>) -> Result<Json<HealthResponse>, ServiceError> {
    let registry = state.registry.clone();
    let loaded = tokio::task::spawn_blocking(move || registry.load())
        .await
        .map_err(|e| ServiceError::Computation(format!("reload task failed: {}", e)))?;

    if loaded {
        info!("Model reloaded");
    } else {
        warn!("Model reload failed, service is unhealthy");
    }
    Ok(Json(health_response(&state)))
}

/// `GET /metrics`
pub async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
