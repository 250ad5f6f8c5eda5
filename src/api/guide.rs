//! Static service description and farm management guide

use crate::advisor::OPTIMAL_RANGES;
use crate::feature_extractor::FeatureExtractor;
use serde_json::{json, Value};

/// Banner returned by `GET /`.
pub fn service_banner(model: Option<String>) -> Value {
    let features = FeatureExtractor::new().feature_names();
    json!({
        "message": "Egg Production Prediction API",
        "version": env!("CARGO_PKG_VERSION"),
        "model": model.unwrap_or_else(|| "not loaded".to_string()),
        "feature_count": features.len(),
        "features": features,
        "health": "/health",
        "endpoints": {
            "predict": "/predict",
            "batch_predict": "/batch_predict",
            "model_info": "/model/info",
            "model_reload": "/model/reload",
            "recommendations": "/recommendations",
            "metrics": "/metrics"
        }
    })
}

/// Comfortable ranges keyed by factor.
pub fn optimal_ranges() -> Value {
    OPTIMAL_RANGES
        .iter()
        .map(|r| (r.factor.to_string(), Value::from(r.range)))
        .collect::<serde_json::Map<_, _>>()
        .into()
}

/// General farm management recommendations returned by `GET /recommendations`.
pub fn management_guide() -> Value {
    json!({
        "environmental_conditions": {
            "temperature": {
                "optimal_range": "18-28°C",
                "recommendation": "Keep temperature steady to avoid stress; heat in winter and cool in summer."
            },
            "humidity": {
                "optimal_range": "50-70%",
                "recommendation": "Balanced humidity prevents respiratory issues; combine ventilation with moisture control."
            },
            "ammonia": {
                "optimal_range": "<25 ppm",
                "recommendation": "Ventilate well and change bedding regularly; ammonia above 25 ppm is dangerous."
            },
            "light_intensity": {
                "optimal_range": "200-500 lux",
                "recommendation": "Provide 14-16 hours of light per day on a timer for consistent laying."
            }
        },
        "general_tips": [
            "Keep bedding clean and dry",
            "Make fresh water available at all times",
            "Schedule regular health checks and vaccinations",
            "Allow 3-4 chickens per square meter",
            "Keep a consistent daily routine",
            "Check environmental readings every day",
            "Adjust conditions with the seasons"
        ],
        "data_collection": {
            "sensors": [
                "DHT11 - Temperature & Humidity",
                "MQ135 - Ammonia/CO2 levels",
                "LDR - Light intensity"
            ],
            "frequency": "Monitor continuously, record every 60 seconds"
        }
    })
}
