//! Inference pipeline: validate, scale, infer, clamp

use crate::advisor;
use crate::error::ServiceError;
use crate::feature_extractor::FeatureExtractor;
use crate::models::loader::LoadedModel;
use crate::models::registry::ModelRegistry;
use crate::models::regressor::Regressor;
use crate::models::scaler::FeatureScaler;
use crate::types::farm::FeatureVector;
use crate::types::prediction::{FarmSizeCategory, PredictionResponse};
use std::sync::Arc;
use tracing::debug;

/// Scale a raw row and run the model, returning the unclamped output.
pub(crate) fn score_row(
    scaler: &FeatureScaler,
    model: &dyn Regressor,
    row: &[f64],
) -> Result<f64, ServiceError> {
    let scaled = scaler.transform(row)?;
    let output = model
        .predict(&scaled)
        .map_err(|e| ServiceError::Computation(format!("{:#}", e)))?;
    Ok(f64::from(output))
}

/// Clamp to a non-negative egg count and round to two decimals.
pub fn finalize_prediction(output: f64) -> f64 {
    (output.max(0.0) * 100.0).round() / 100.0
}

/// `"<backend> v<version> (<file>)"`
fn version_label(loaded: &LoadedModel) -> String {
    let file = loaded
        .path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!(
        "{} v{} ({})",
        loaded.model.describe().backend,
        env!("CARGO_PKG_VERSION"),
        file
    )
}

/// Prediction for one farm before presentation
#[derive(Debug, Clone)]
pub struct PredictionResult {
    /// Clamped, rounded prediction
    pub prediction: f64,
    /// Readings the prediction was made from
    pub vector: FeatureVector,
    /// Model that produced the prediction
    pub model_version: String,
}

impl PredictionResult {
    /// Enrich with category, confidence and recommendations
    pub fn to_response(&self) -> PredictionResponse {
        let category = FarmSizeCategory::from_chicken_count(self.vector.amount_of_chicken());

        PredictionResponse::new(self.prediction, category, *self.vector.input())
            .with_confidence(advisor::confidence_score(&self.vector))
            .with_recommendations(advisor::recommendations(&self.vector, self.prediction))
            .with_model_version(self.model_version.as_str())
    }
}

/// Inference engine reading the model and scaler from the registry
pub struct InferenceEngine {
    registry: Arc<ModelRegistry>,
    extractor: FeatureExtractor,
    max_batch_size: usize,
}

impl InferenceEngine {
    pub fn new(registry: Arc<ModelRegistry>, max_batch_size: usize) -> Self {
        Self {
            registry,
            extractor: FeatureExtractor::new(),
            max_batch_size,
        }
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// Human-readable description of the published model, if any.
    pub fn model_version(&self) -> Option<String> {
        let (_, loaded) = self.registry.artifacts().ok()?;
        Some(version_label(&loaded))
    }

    /// Predict egg production for one farm.
    pub fn predict(&self, vector: &FeatureVector) -> Result<PredictionResult, ServiceError> {
        let (scaler, loaded) = self.registry.artifacts()?;
        let output = score_row(&scaler, loaded.model.as_ref(), &self.extractor.extract(vector))?;
        let prediction = finalize_prediction(output);

        debug!(raw = output, prediction = prediction, "Inference complete");
        Ok(PredictionResult {
            prediction,
            vector: *vector,
            model_version: version_label(&loaded),
        })
    }

    /// Predict for several farms in input order.
    ///
    /// One failing element fails the whole batch; no partial results.
    pub fn predict_batch(
        &self,
        vectors: &[FeatureVector],
    ) -> Result<Vec<PredictionResult>, ServiceError> {
        if vectors.len() > self.max_batch_size {
            return Err(ServiceError::BatchTooLarge {
                len: vectors.len(),
                max: self.max_batch_size,
            });
        }

        // One snapshot for the whole batch so a reload cannot split it.
        let (scaler, loaded) = self.registry.artifacts()?;
        let model_version = version_label(&loaded);
        let predictions = vectors
            .iter()
            .map(|v| {
                let output = score_row(&scaler, loaded.model.as_ref(), &self.extractor.extract(v))?;
                Ok(PredictionResult {
                    prediction: finalize_prediction(output),
                    vector: *v,
                    model_version: model_version.clone(),
                })
            })
            .collect::<Result<Vec<_>, ServiceError>>()?;

        debug!(count = predictions.len(), "Batch inference complete");
        Ok(predictions)
    }
}
