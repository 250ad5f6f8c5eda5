//! Rule-based enrichment of predictions.
//!
//! Pure functions over the readings and the predicted value. The confidence
//! score is a heuristic measure of how typical the readings are, not a
//! calibrated probability.

use crate::types::farm::FeatureVector;
use crate::types::prediction::FarmSizeCategory;
use serde::Serialize;

/// Assumed laying rate used as the production baseline.
pub const BASELINE_EGGS_PER_HEN: f64 = 0.8;

/// Comfortable operating range for one environmental factor.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct OptimalRange {
    pub factor: &'static str,
    pub range: &'static str,
}

/// Comfortable ranges reported by `/model/info`.
pub const OPTIMAL_RANGES: [OptimalRange; 6] = [
    OptimalRange { factor: "temperature", range: "18-28°C" },
    OptimalRange { factor: "humidity", range: "50-70%" },
    OptimalRange { factor: "ammonia", range: "<25 ppm" },
    OptimalRange { factor: "light_intensity", range: "200-500 lux" },
    OptimalRange { factor: "amount_of_feeding", range: "200-300" },
    OptimalRange { factor: "noise", range: "<200" },
];

pub fn farm_size_category(chicken_count: f64) -> FarmSizeCategory {
    FarmSizeCategory::from_chicken_count(chicken_count)
}

/// Multiplicative penalty per atypical reading, rounded to three decimals.
pub fn confidence_score(vector: &FeatureVector) -> f64 {
    let penalties = [
        (vector.temperature() < 15.0 || vector.temperature() > 32.0, 0.85),
        (vector.humidity() < 40.0 || vector.humidity() > 80.0, 0.9),
        (vector.ammonia() > 30.0, 0.8),
        (vector.light_intensity() < 100.0 || vector.light_intensity() > 800.0, 0.9),
        (vector.amount_of_feeding() < 100.0 || vector.amount_of_feeding() > 500.0, 0.85),
        (vector.noise() > 400.0, 0.85),
    ];

    let score: f64 = penalties
        .iter()
        .filter(|(triggered, _)| *triggered)
        .fold(1.0, |score, (_, factor)| score * factor);

    (score * 1000.0).round() / 1000.0
}

/// One advisory per environmental factor, then optional production feedback.
pub fn recommendations(vector: &FeatureVector, prediction: f64) -> Vec<String> {
    let mut advice = Vec::with_capacity(7);

    let temperature = vector.temperature();
    advice.push(if temperature < 18.0 {
        "Temperature is low. Consider heating to keep the house within 18-28°C"
    } else if temperature > 28.0 {
        "Temperature is high. Consider cooling to prevent heat stress"
    } else {
        "Temperature is optimal"
    });

    let humidity = vector.humidity();
    advice.push(if humidity < 50.0 {
        "Humidity is low. Raise it to 50-70% for better production"
    } else if humidity > 70.0 {
        "Humidity is high. Reduce it to prevent respiratory issues"
    } else {
        "Humidity is optimal"
    });

    let ammonia = vector.ammonia();
    advice.push(if ammonia > 25.0 {
        "High ammonia levels detected. Improve ventilation immediately"
    } else if ammonia > 20.0 {
        "Ammonia levels are elevated. Monitor ventilation"
    } else {
        "Ammonia levels are safe"
    });

    let light = vector.light_intensity();
    advice.push(if light < 200.0 {
        "Light intensity is low. Increase to 250-400 lux for optimal laying"
    } else if light > 500.0 {
        "Light intensity is high. Reduce it to prevent stress"
    } else {
        "Light intensity is optimal"
    });

    let feeding = vector.amount_of_feeding();
    advice.push(if feeding < 150.0 {
        "Feeding amount is low. Increase it to ensure adequate nutrition"
    } else if feeding > 350.0 {
        "Feeding amount is high. Monitor to prevent overfeeding"
    } else {
        "Feeding amount is optimal"
    });

    let noise = vector.noise();
    advice.push(if noise > 300.0 {
        "Noise level is high. Reduce noise to minimise stress on the flock"
    } else if noise > 200.0 {
        "Noise level is elevated. Consider soundproofing measures"
    } else {
        "Noise level is optimal"
    });

    let expected = vector.amount_of_chicken() * BASELINE_EGGS_PER_HEN;
    if prediction < expected * 0.7 {
        advice.push("Predicted production is below expected. Check environmental conditions");
    } else if prediction >= expected * 0.9 {
        advice.push("Predicted production is high. Maintain current conditions");
    }

    advice.into_iter().map(String::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::farm::FarmInput;

    /// Every reading inside its comfortable range.
    fn optimal() -> FarmInput {
        FarmInput {
            amount_of_chicken: 1000.0,
            amount_of_feeding: 250.0,
            ammonia: 10.0,
            temperature: 22.0,
            humidity: 60.0,
            light_intensity: 300.0,
            noise: 150.0,
        }
    }

    fn vector(input: FarmInput) -> FeatureVector {
        FeatureVector::new(input).unwrap()
    }

    #[test]
    fn test_confidence_without_penalties() {
        assert_eq!(confidence_score(&vector(optimal())), 1.0);
    }

    #[test]
    fn test_single_temperature_penalty() {
        let mut input = optimal();
        input.temperature = 10.0;
        assert_eq!(confidence_score(&vector(input)), 0.85);
    }

    #[test]
    fn test_confidence_non_increasing() {
        let mut input = optimal();
        let mut last = confidence_score(&vector(input));

        let degradations: [fn(&mut FarmInput); 6] = [
            |i| i.temperature = 40.0,
            |i| i.humidity = 90.0,
            |i| i.ammonia = 45.0,
            |i| i.light_intensity = 900.0,
            |i| i.amount_of_feeding = 600.0,
            |i| i.noise = 500.0,
        ];
        for degrade in degradations {
            degrade(&mut input);
            let score = confidence_score(&vector(input));
            assert!(score < last, "{} should be below {}", score, last);
            last = score;
        }

        // 0.85 * 0.9 * 0.8 * 0.9 * 0.85 * 0.85
        assert_eq!(last, 0.398);
    }

    #[test]
    fn test_penalty_order_does_not_matter() {
        let mut a = optimal();
        a.ammonia = 40.0;
        a.noise = 450.0;
        let mut b = optimal();
        b.noise = 450.0;
        b.ammonia = 40.0;
        assert_eq!(confidence_score(&vector(a)), confidence_score(&vector(b)));
        assert_eq!(confidence_score(&vector(a)), 0.68);
    }

    #[test]
    fn test_recommendations_for_optimal_readings() {
        // expected = 800; 700 sits between 70% and 90%, no feedback line
        let advice = recommendations(&vector(optimal()), 700.0);
        assert_eq!(
            advice,
            vec![
                "Temperature is optimal",
                "Humidity is optimal",
                "Ammonia levels are safe",
                "Light intensity is optimal",
                "Feeding amount is optimal",
                "Noise level is optimal",
            ]
        );
    }

    #[test]
    fn test_production_feedback() {
        let low = recommendations(&vector(optimal()), 559.0);
        assert_eq!(low.len(), 7);
        assert!(low[6].contains("below expected"));

        let high = recommendations(&vector(optimal()), 720.0);
        assert_eq!(high.len(), 7);
        assert!(high[6].contains("Maintain current conditions"));
    }

    #[test]
    fn test_low_temperature_advice() {
        let mut input = optimal();
        input.temperature = 10.0;
        let advice = recommendations(&vector(input), 700.0);
        assert!(advice[0].starts_with("Temperature is low"));
        assert_eq!(advice[1], "Humidity is optimal");
    }

    #[test]
    fn test_ammonia_and_noise_levels() {
        let mut input = optimal();
        for safe in [17.5, 20.0] {
            input.ammonia = safe;
            let advice = recommendations(&vector(input), 700.0);
            assert_eq!(advice[2], "Ammonia levels are safe");
        }

        for elevated in [22.0, 25.0] {
            input.ammonia = elevated;
            input.noise = 250.0;
            let advice = recommendations(&vector(input), 700.0);
            assert_eq!(advice[2], "Ammonia levels are elevated. Monitor ventilation");
            assert!(advice[5].starts_with("Noise level is elevated"));
        }

        input.ammonia = 28.0;
        input.noise = 350.0;
        let advice = recommendations(&vector(input), 700.0);
        assert!(advice[2].starts_with("High ammonia"));
        assert!(advice[5].starts_with("Noise level is high"));
    }

    #[test]
    fn test_always_six_or_seven_entries() {
        for chickens in [10.0, 499.0, 2291.0, 10000.0] {
            for prediction in [0.0, 100.0, 1500.0, 9000.0] {
                let mut input = optimal();
                input.amount_of_chicken = chickens;
                let n = recommendations(&vector(input), prediction).len();
                assert!(n == 6 || n == 7);
            }
        }
    }

    #[test]
    fn test_farm_size_category() {
        let categories: Vec<_> = [499.0, 500.0, 1999.0, 2000.0, 4999.0, 5000.0, 5001.0]
            .into_iter()
            .map(farm_size_category)
            .collect();
        assert_eq!(
            categories,
            vec![
                FarmSizeCategory::Small,
                FarmSizeCategory::Medium,
                FarmSizeCategory::Medium,
                FarmSizeCategory::Large,
                FarmSizeCategory::Large,
                FarmSizeCategory::Industrial,
                FarmSizeCategory::Industrial,
            ]
        );
    }
}
