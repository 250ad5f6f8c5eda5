//! Demo Artifact Generator
//!
//! Writes a fitted scaler and a small dense model as a Keras HDF5 file with a
//! newer-style (`batch_shape`) input declaration, so the service can be run
//! end to end without a trained model.
//!
//! Usage: `make_artifacts [output_dir] [samples] [hidden_units] [h5|keras]`

use anyhow::{bail, Context, Result};
use egg_production_api::models::h5;
use egg_production_api::models::keras::LayerWeights;
use egg_production_api::models::FeatureScaler;
use egg_production_api::types::farm::FEATURE_BOUNDS;
use ndarray::{Array1, Array2};
use rand::Rng;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::info;

/// Eggs per hen used to shape the demo output layer.
const EGGS_PER_HEN: f64 = 0.8;

/// Draw uniform readings within each feature's accepted bounds.
fn sample_readings(rng: &mut impl Rng, samples: usize) -> Vec<[f64; 7]> {
    (0..samples)
        .map(|_| {
            let mut row = [0.0; 7];
            for (value, bounds) in row.iter_mut().zip(FEATURE_BOUNDS.iter()) {
                *value = rng.gen_range(bounds.min..=bounds.max);
            }
            row
        })
        .collect()
}

/// Fit a standard scaler (population std, zero std mapped to 1).
fn fit_standard(rows: &[[f64; 7]]) -> FeatureScaler {
    let n = rows.len() as f64;
    let mut mean = vec![0.0; 7];
    let mut scale = vec![0.0; 7];

    for row in rows {
        for (m, x) in mean.iter_mut().zip(row) {
            *m += x / n;
        }
    }
    for row in rows {
        for ((s, x), m) in scale.iter_mut().zip(row).zip(&mean) {
            *s += (x - m).powi(2) / n;
        }
    }
    for s in scale.iter_mut() {
        *s = if *s > 0.0 { s.sqrt() } else { 1.0 };
    }

    FeatureScaler::Standard { mean, scale }
}

/// Build the architecture and dense-layer weights.
///
/// Hidden units 0 and 1 carry `+z` and `-z` of the scaled chicken count so
/// the output approximates `chickens * EGGS_PER_HEN`; the remaining units get
/// small random weights.
fn build_model(
    rng: &mut impl Rng,
    scaler: &FeatureScaler,
    hidden: usize,
) -> Result<(Value, Vec<(String, LayerWeights)>)> {
    let (chicken_mean, chicken_scale) = match scaler {
        FeatureScaler::Standard { mean, scale } => (mean[0], scale[0]),
        FeatureScaler::MinMax { .. } => (0.0, 1.0),
    };

    let hidden_kernel = Array2::from_shape_fn((7, hidden), |(feature, unit)| {
        match (feature, unit) {
            (0, 0) => 1.0,
            (0, 1) => -1.0,
            (_, 0) | (_, 1) => 0.0,
            _ => rng.gen_range(-0.1..0.1),
        }
    });

    let slope = (chicken_scale * EGGS_PER_HEN) as f32;
    let out_kernel: Vec<f32> = (0..hidden)
        .map(|unit| match unit {
            0 => slope,
            1 => -slope,
            _ => rng.gen_range(-1.0..1.0),
        })
        .collect();
    let out_kernel = Array2::from_shape_vec((hidden, 1), out_kernel)?;

    let model_config = json!({
        "class_name": "Sequential",
        "config": {
            "name": "sequence_model",
            "layers": [
                {"class_name": "InputLayer", "config": {
                    "name": "input_layer", "batch_shape": [null, 7], "dtype": "float32"
                }},
                {"class_name": "Dense", "config": {
                    "name": "dense", "units": hidden, "activation": "relu"
                }},
                {"class_name": "Dropout", "config": {"name": "dropout", "rate": 0.2}},
                {"class_name": "Dense", "config": {
                    "name": "dense_1", "units": 1, "activation": "linear"
                }}
            ]
        }
    });

    let layers = vec![
        (
            "dense".to_string(),
            LayerWeights {
                kernel: hidden_kernel,
                bias: Some(Array1::zeros(hidden)),
            },
        ),
        (
            "dense_1".to_string(),
            LayerWeights {
                kernel: out_kernel,
                bias: Some(Array1::from(vec![(chicken_mean * EGGS_PER_HEN) as f32])),
            },
        ),
    ];

    Ok((model_config, layers))
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("make_artifacts=info".parse()?),
        )
        .init();

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let output_dir = PathBuf::from(args.get(1).map(|s| s.as_str()).unwrap_or("models"));
    let samples: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(500);
    let hidden: usize = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(16);
    let format = args.get(4).map(|s| s.as_str()).unwrap_or("h5");

    if samples == 0 {
        bail!("samples must be positive");
    }
    if hidden < 2 {
        bail!("hidden_units must be at least 2");
    }
    if !matches!(format, "h5" | "keras") {
        bail!("unknown model format '{}', expected h5 or keras", format);
    }

    info!(
        output_dir = %output_dir.display(),
        samples = samples,
        hidden_units = hidden,
        format = format,
        "Generating demo artifacts"
    );

    let mut rng = rand::thread_rng();
    let readings = sample_readings(&mut rng, samples);
    let scaler = fit_standard(&readings);
    let (model_config, layers) = build_model(&mut rng, &scaler, hidden)?;

    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let scaler_path = output_dir.join("scaler_X.json");
    std::fs::write(&scaler_path, serde_json::to_string_pretty(&scaler)?)
        .with_context(|| format!("Failed to write {}", scaler_path.display()))?;
    info!(path = %scaler_path.display(), "Wrote scaler");

    let model_path = output_dir.join(format!("sequence_model.{}", format));
    if format == "keras" {
        h5::write_archive(&model_path, &model_config, &layers)?;
    } else {
        h5::write(&model_path, &model_config, &layers)?;
    }
    info!(path = %model_path.display(), "Wrote model");

    Ok(())
}
