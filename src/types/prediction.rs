//! Prediction and health response structures

use crate::types::farm::FarmInput;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Farm size classification derived from the flock size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FarmSizeCategory {
    #[serde(rename = "Small Farm")]
    Small,
    #[serde(rename = "Medium Farm")]
    Medium,
    #[serde(rename = "Large Farm")]
    Large,
    #[serde(rename = "Industrial Farm")]
    Industrial,
}

impl FarmSizeCategory {
    /// Classify a flock by number of chickens
    pub fn from_chicken_count(chickens: f64) -> Self {
        if chickens < 500.0 {
            FarmSizeCategory::Small
        } else if chickens < 2000.0 {
            FarmSizeCategory::Medium
        } else if chickens < 5000.0 {
            FarmSizeCategory::Large
        } else {
            FarmSizeCategory::Industrial
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FarmSizeCategory::Small => "Small Farm",
            FarmSizeCategory::Medium => "Medium Farm",
            FarmSizeCategory::Large => "Large Farm",
            FarmSizeCategory::Industrial => "Industrial Farm",
        }
    }
}

impl fmt::Display for FarmSizeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Prediction for a single farm, enriched with heuristics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    /// Unique prediction identifier
    pub prediction_id: String,

    /// Predicted total egg production, non-negative, two decimals
    pub predicted_egg_production: f64,

    /// Heuristic input-quality score (0.0 - 1.0)
    pub confidence_score: f64,

    /// Farm size category
    pub farm_size_category: FarmSizeCategory,

    /// One advisory per environmental factor plus optional production feedback
    pub recommendations: Vec<String>,

    /// Prediction timestamp
    pub timestamp: DateTime<Utc>,

    /// Model description used for the prediction
    pub model_version: String,

    /// Echo of the readings used
    pub input_data: FarmInput,
}

impl PredictionResponse {
    /// Create a new response stamped with a fresh id and the current time
    pub fn new(
        predicted_egg_production: f64,
        farm_size_category: FarmSizeCategory,
        input_data: FarmInput,
    ) -> Self {
        Self {
            prediction_id: uuid::Uuid::new_v4().to_string(),
            predicted_egg_production,
            confidence_score: 1.0,
            farm_size_category,
            recommendations: Vec::new(),
            timestamp: Utc::now(),
            model_version: String::new(),
            input_data,
        }
    }

    pub fn with_confidence(mut self, confidence_score: f64) -> Self {
        self.confidence_score = confidence_score;
        self
    }

    pub fn with_recommendations(mut self, recommendations: Vec<String>) -> Self {
        self.recommendations = recommendations;
        self
    }

    pub fn with_model_version(mut self, model_version: impl Into<String>) -> Self {
        self.model_version = model_version.into();
        self
    }
}

/// Batch request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchPredictionInput {
    pub farms: Vec<FarmInput>,
}

/// Batch response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchPredictionResponse {
    pub predictions: Vec<PredictionResponse>,
    pub total_predictions: usize,
    pub timestamp: DateTime<Utc>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    #[serde(rename = "scaler_X_loaded")]
    pub scaler_loaded: bool,
    pub last_error: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_thresholds() {
        let expected = [
            (499.0, FarmSizeCategory::Small),
            (500.0, FarmSizeCategory::Medium),
            (1999.0, FarmSizeCategory::Medium),
            (2000.0, FarmSizeCategory::Large),
            (4999.0, FarmSizeCategory::Large),
            (5000.0, FarmSizeCategory::Industrial),
            (5001.0, FarmSizeCategory::Industrial),
        ];

        for (chickens, category) in expected {
            assert_eq!(FarmSizeCategory::from_chicken_count(chickens), category);
        }
    }

    #[test]
    fn test_category_serializes_as_label() {
        let json = serde_json::to_string(&FarmSizeCategory::Large).unwrap();
        assert_eq!(json, "\"Large Farm\"");
        assert_eq!(FarmSizeCategory::Industrial.to_string(), "Industrial Farm");
    }

    #[test]
    fn test_response_builder() {
        let response = PredictionResponse::new(1500.25, FarmSizeCategory::Large, FarmInput::sample())
            .with_confidence(0.85)
            .with_recommendations(vec!["Temperature is optimal".to_string()])
            .with_model_version("dense-network");

        assert_eq!(response.confidence_score, 0.85);
        assert_eq!(response.recommendations.len(), 1);
        assert_eq!(response.model_version, "dense-network");
        assert_eq!(response.prediction_id.len(), 36);
    }

    #[test]
    fn test_health_field_names() {
        let health = HealthResponse {
            status: "unhealthy".to_string(),
            model_loaded: false,
            scaler_loaded: false,
            last_error: None,
            timestamp: Utc::now(),
            version: "0.1.0".to_string(),
        };
        let value = serde_json::to_value(&health).unwrap();
        assert_eq!(value["scaler_X_loaded"], false);
        assert!(value["last_error"].is_null());
    }
}
