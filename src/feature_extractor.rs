//! Feature extraction for egg production model inference.
//!
//! Turns validated farm readings into the raw (unscaled) input row the
//! scaler and model were fitted on.

use crate::types::farm::{FeatureVector, FEATURE_BOUNDS};

/// Number of model input features.
pub const FEATURE_COUNT: usize = 7;

/// Feature extractor that lays out readings in training column order.
pub struct FeatureExtractor;

impl FeatureExtractor {
    /// Create a new feature extractor.
    pub fn new() -> Self {
        Self
    }

    /// Extract the raw input row for a validated reading.
    ///
    /// Order: chickens, feeding, ammonia, temperature, humidity, light, noise.
    pub fn extract(&self, vector: &FeatureVector) -> [f64; FEATURE_COUNT] {
        vector.input().values()
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        FEATURE_COUNT
    }

    /// Get feature names in column order.
    pub fn feature_names(&self) -> Vec<&'static str> {
        FEATURE_BOUNDS.iter().map(|b| b.name).collect()
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}
