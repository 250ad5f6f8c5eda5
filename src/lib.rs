//! Egg Production Prediction Service Library
//!
//! Wraps a pretrained regression model that predicts poultry egg production
//! from farm sensor readings, and enriches each prediction with rule-based
//! categorization, a heuristic confidence score and recommendations.

pub mod advisor;
pub mod api;
pub mod config;
pub mod error;
pub mod feature_extractor;
pub mod metrics;
pub mod models;
pub mod types;

pub use config::AppConfig;
pub use error::ServiceError;
pub use feature_extractor::FeatureExtractor;
pub use models::{InferenceEngine, ModelRegistry};
pub use types::{farm::FarmInput, farm::FeatureVector, prediction::PredictionResponse};
