//! Fitted feature scaler loading and application

use crate::error::ServiceError;
use crate::feature_extractor::FEATURE_COUNT;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Pre-fitted affine transform from raw readings to model input space.
///
/// Persisted as JSON tagged by `kind`; attribute names of the
/// scikit-learn scalers are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureScaler {
    /// `(x - mean) / scale`
    Standard {
        #[serde(alias = "mean_")]
        mean: Vec<f64>,
        #[serde(alias = "scale_")]
        scale: Vec<f64>,
    },
    /// `x * scale + min`
    MinMax {
        #[serde(alias = "min_")]
        min: Vec<f64>,
        #[serde(alias = "scale_")]
        scale: Vec<f64>,
    },
}

impl FeatureScaler {
    /// Read and validate a scaler artifact.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ServiceError> {
        let path = path.as_ref();
        let invalid = |detail: String| ServiceError::ScalerInvalid {
            path: path.to_path_buf(),
            detail,
        };

        let raw = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        let scaler: FeatureScaler = serde_json::from_str(&raw).map_err(|e| invalid(e.to_string()))?;
        scaler.validate().map_err(invalid)?;

        info!(path = %path.display(), kind = scaler.kind(), "Scaler loaded");
        Ok(scaler)
    }

    /// Check widths and divisors.
    pub fn validate(&self) -> Result<(), String> {
        let (offsets, scale) = match self {
            FeatureScaler::Standard { mean, scale } => (mean, scale),
            FeatureScaler::MinMax { min, scale } => (min, scale),
        };

        if offsets.len() != FEATURE_COUNT || scale.len() != FEATURE_COUNT {
            return Err(format!(
                "expected {} features, got {} offsets and {} scales",
                FEATURE_COUNT,
                offsets.len(),
                scale.len()
            ));
        }
        if offsets.iter().chain(scale).any(|v| !v.is_finite()) {
            return Err("non-finite scaler parameter".to_string());
        }
        if let FeatureScaler::Standard { scale, .. } = self {
            if let Some(i) = scale.iter().position(|&s| s == 0.0) {
                return Err(format!("zero scale for feature {}", i));
            }
        }
        Ok(())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FeatureScaler::Standard { .. } => "standard",
            FeatureScaler::MinMax { .. } => "min_max",
        }
    }

    /// Scale one raw input row into model input space.
    pub fn transform(&self, row: &[f64]) -> Result<Vec<f32>, ServiceError> {
        if row.len() != FEATURE_COUNT {
            return Err(ServiceError::Computation(format!(
                "scaler expects {} features, got {}",
                FEATURE_COUNT,
                row.len()
            )));
        }

        let scaled: Vec<f64> = match self {
            FeatureScaler::Standard { mean, scale } => row
                .iter()
                .zip(mean.iter().zip(scale))
                .map(|(x, (m, s))| (x - m) / s)
                .collect(),
            FeatureScaler::MinMax { min, scale } => row
                .iter()
                .zip(min.iter().zip(scale))
                .map(|(x, (m, s))| x * s + m)
                .collect(),
        };

        if scaled.iter().any(|v| !v.is_finite()) {
            return Err(ServiceError::Computation(
                "scaling produced a non-finite value".to_string(),
            ));
        }

        Ok(scaled.into_iter().map(|v| v as f32).collect())
    }
}
