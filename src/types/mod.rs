//! Type definitions for the egg production service

pub mod farm;
pub mod prediction;

pub use farm::{FarmInput, FeatureBounds, FeatureVector, FEATURE_BOUNDS};
pub use prediction::{
    BatchPredictionInput, BatchPredictionResponse, FarmSizeCategory, HealthResponse,
    PredictionResponse,
};
