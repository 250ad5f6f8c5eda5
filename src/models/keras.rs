//! Keras `Sequential` architectures.
//!
//! Keras stores the architecture of a saved model as JSON in the
//! `model_config` attribute of the HDF5 file:
//!
//! ```json
//! {"class_name": "Sequential", "config": {"layers": [
//!   {"class_name": "InputLayer", "config": {"batch_input_shape": [null, 7]}},
//!   {"class_name": "Dense", "config": {"name": "dense", "units": 1}}
//! ]}}
//! ```
//!
//! Files written by Keras 3 declare input layers with `batch_shape`, which the
//! strict reader does not understand. [`KerasModelConfig::parse_compatible`]
//! rewrites those declarations to `input_shape` first.

use crate::models::network::{Activation, DenseLayer, DenseNetwork};
use anyhow::{anyhow, bail, Context, Result};
use ndarray::{Array1, Array2};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

/// Top-level architecture description.
#[derive(Debug, Deserialize)]
pub struct KerasModelConfig {
    pub class_name: String,
    pub config: SequentialConfig,
}

#[derive(Debug, Deserialize)]
pub struct SequentialConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub layers: Vec<LayerSpec>,
}

#[derive(Debug, Deserialize)]
pub struct LayerSpec {
    pub class_name: String,
    pub config: LayerConfig,
}

/// Layer keyword arguments; unknown keys are ignored.
#[derive(Debug, Deserialize)]
pub struct LayerConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub units: Option<usize>,
    #[serde(default)]
    pub activation: Option<String>,
    #[serde(default = "default_use_bias")]
    pub use_bias: bool,
    /// Shape without the batch dimension.
    #[serde(default)]
    pub input_shape: Option<Vec<Option<usize>>>,
    /// Shape with a leading batch placeholder, Keras 2.
    #[serde(default)]
    pub batch_input_shape: Option<Vec<Option<usize>>>,
    /// Shape with a leading batch placeholder, Keras 3. Not understood by the
    /// strict reader.
    #[serde(default)]
    pub batch_shape: Option<Value>,
}

fn default_use_bias() -> bool {
    true
}

/// Trained tensors of one dense layer.
#[derive(Debug, Clone)]
pub struct LayerWeights {
    /// `[input_width, units]`
    pub kernel: Array2<f32>,
    pub bias: Option<Array1<f32>>,
}

impl LayerConfig {
    /// Input width declared by this layer, if any.
    fn declared_input_width(&self, layer: &str) -> Result<Option<usize>> {
        if self.batch_shape.is_some() {
            bail!(
                "unrecognized keyword argument 'batch_shape' in layer '{}'",
                layer
            );
        }

        let dims = match (&self.input_shape, &self.batch_input_shape) {
            (Some(shape), _) => shape.as_slice(),
            (None, Some(shape)) if !shape.is_empty() => &shape[1..],
            _ => return Ok(None),
        };

        match dims {
            [Some(width)] => Ok(Some(*width)),
            other => bail!("layer '{}' declares unsupported input shape {:?}", layer, other),
        }
    }
}

impl KerasModelConfig {
    /// Parse an architecture exactly as stored.
    pub fn parse_strict(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("model_config is not a Sequential architecture")
    }

    /// Parse an architecture, applying the `batch_shape` rewrite first.
    ///
    /// A config that was JSON-encoded twice is unwrapped.
    pub fn parse_compatible(text: &str) -> Result<Self> {
        let mut config: Value = serde_json::from_str(text).context("model_config is not JSON")?;
        if let Value::String(inner) = &config {
            config = serde_json::from_str(inner).context("embedded model_config is not JSON")?;
        }

        let rewritten = rewrite_batch_shape(&mut config);
        tracing::debug!(layers = rewritten, "Rewrote batch_shape declarations");

        serde_json::from_value(config).context("model_config is not a Sequential architecture")
    }

    /// Build the network, binding each dense layer to its weights.
    pub fn build(&self, weights: &HashMap<String, LayerWeights>) -> Result<DenseNetwork> {
        if self.class_name != "Sequential" {
            bail!(
                "unsupported model class '{}', expected Sequential",
                self.class_name
            );
        }

        let mut input_width = None;
        let mut layers = Vec::new();

        for (i, spec) in self.config.layers.iter().enumerate() {
            let name = spec
                .config
                .name
                .clone()
                .unwrap_or_else(|| format!("layer_{}", i));

            if let Some(width) = spec.config.declared_input_width(&name)? {
                if input_width.is_none() {
                    input_width = Some(width);
                }
            }

            match spec.class_name.as_str() {
                "InputLayer" | "Dropout" => {}
                "Dense" => layers.push(build_dense(&name, &spec.config, weights)?),
                other => bail!("unsupported layer class '{}' ('{}')", other, name),
            }
        }

        let input_width = match (input_width, layers.first()) {
            (Some(width), _) => width,
            (None, Some(first)) => first.input_width(),
            (None, None) => bail!("model has no layers"),
        };

        DenseNetwork::new(input_width, layers)
    }
}

fn build_dense(
    name: &str,
    config: &LayerConfig,
    weights: &HashMap<String, LayerWeights>,
) -> Result<DenseLayer> {
    let units = config
        .units
        .ok_or_else(|| anyhow!("dense layer '{}' has no units", name))?;
    let activation_name = config.activation.as_deref().unwrap_or("linear");
    let activation = Activation::from_keras(activation_name).ok_or_else(|| {
        anyhow!("unsupported activation '{}' in layer '{}'", activation_name, name)
    })?;

    let tensors = weights
        .get(name)
        .ok_or_else(|| anyhow!("no weights for layer '{}'", name))?;
    if tensors.kernel.ncols() != units {
        bail!(
            "layer '{}' declares {} units but kernel has {} columns",
            name,
            units,
            tensors.kernel.ncols()
        );
    }

    let bias = match (&tensors.bias, config.use_bias) {
        (Some(bias), true) => bias.clone(),
        (None, true) => bail!("layer '{}' uses a bias but none was stored", name),
        (_, false) => Array1::zeros(units),
    };

    DenseLayer::new(name, tensors.kernel.clone(), bias, activation)
}

/// Rewrite `batch_shape` layer declarations to `input_shape`, dropping the
/// batch dimension. Returns the number of layers rewritten.
pub fn rewrite_batch_shape(model_config: &mut Value) -> usize {
    let Some(layers) = model_config
        .get_mut("config")
        .and_then(|c| c.get_mut("layers"))
        .and_then(Value::as_array_mut)
    else {
        return 0;
    };

    let mut rewritten = 0;
    for layer in layers {
        let Some(config) = layer.get_mut("config").and_then(Value::as_object_mut) else {
            continue;
        };
        let Some(batch_shape) = config.remove("batch_shape") else {
            continue;
        };
        if let Some(dims) = batch_shape.as_array() {
            if dims.len() > 1 {
                config.insert("input_shape".to_string(), Value::Array(dims[1..].to_vec()));
            }
        }
        rewritten += 1;
    }
    rewritten
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::regressor::Regressor;
    use ndarray::array;
    use serde_json::json;

    fn architecture(input_layer: Value) -> Value {
        json!({
            "class_name": "Sequential",
            "config": {
                "name": "sequential",
                "layers": [
                    {"class_name": "InputLayer", "config": input_layer},
                    {"class_name": "Dense", "config": {"name": "hidden", "units": 2, "activation": "relu"}},
                    {"class_name": "Dropout", "config": {"name": "dropout", "rate": 0.2}},
                    {"class_name": "Dense", "config": {"name": "out", "units": 1}}
                ]
            }
        })
    }

    fn weights() -> HashMap<String, LayerWeights> {
        let mut weights = HashMap::new();
        weights.insert(
            "hidden".to_string(),
            LayerWeights {
                kernel: array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]],
                bias: Some(array![0.0, 0.0]),
            },
        );
        weights.insert(
            "out".to_string(),
            LayerWeights {
                kernel: array![[1.0], [2.0]],
                bias: Some(array![0.5]),
            },
        );
        weights
    }

    #[test]
    fn test_strict_reads_batch_input_shape() {
        let text = architecture(json!({"name": "input", "batch_input_shape": [null, 3]})).to_string();
        let net = KerasModelConfig::parse_strict(&text)
            .unwrap()
            .build(&weights())
            .unwrap();
        // hidden = [1+3, 2+3] = [4, 5]; out = 4 + 10 + 0.5
        assert_eq!(net.predict(&[1.0, 2.0, 3.0]).unwrap(), 14.5);
        assert_eq!(net.layer_count(), 2);
    }

    #[test]
    fn test_strict_rejects_batch_shape() {
        let text = architecture(json!({"name": "input", "batch_shape": [null, 3]})).to_string();
        let err = KerasModelConfig::parse_strict(&text)
            .unwrap()
            .build(&weights())
            .unwrap_err();
        assert!(err.to_string().contains("batch_shape"));
    }

    #[test]
    fn test_compatible_rewrites_batch_shape() {
        let text = architecture(json!({"name": "input", "batch_shape": [null, 3]})).to_string();
        let net = KerasModelConfig::parse_compatible(&text)
            .unwrap()
            .build(&weights())
            .unwrap();
        assert_eq!(net.predict(&[1.0, 2.0, 3.0]).unwrap(), 14.5);
    }

    #[test]
    fn test_compatible_unwraps_double_encoding() {
        let inner = architecture(json!({"name": "input", "batch_shape": [null, 3]})).to_string();
        let text = Value::String(inner).to_string();

        assert!(KerasModelConfig::parse_strict(&text).is_err());
        assert!(KerasModelConfig::parse_compatible(&text)
            .unwrap()
            .build(&weights())
            .is_ok());
    }

    #[test]
    fn test_rewrite_strips_batch_dimension() {
        let mut config = json!({"config": {"layers": [
            {"class_name": "InputLayer", "config": {"batch_shape": [null, 7]}},
            {"class_name": "Dense", "config": {"batch_shape": [null]}},
            {"class_name": "Dense", "config": {"units": 1}}
        ]}});

        assert_eq!(rewrite_batch_shape(&mut config), 2);
        let layers = &config["config"]["layers"];
        assert_eq!(layers[0]["config"]["input_shape"], json!([7]));
        assert!(layers[0]["config"].get("batch_shape").is_none());
        assert!(layers[1]["config"].get("input_shape").is_none());
        assert!(layers[1]["config"].get("batch_shape").is_none());
    }

    #[test]
    fn test_missing_weights_is_reported() {
        let text = architecture(json!({"input_shape": [3]})).to_string();
        let mut tensors = weights();
        tensors.remove("out");
        let err = KerasModelConfig::parse_strict(&text)
            .unwrap()
            .build(&tensors)
            .unwrap_err();
        assert_eq!(err.to_string(), "no weights for layer 'out'");
    }

    #[test]
    fn test_units_must_match_kernel() {
        let mut config = architecture(json!({"input_shape": [3]}));
        config["config"]["layers"][3]["config"]["units"] = json!(2);
        let err = KerasModelConfig::parse_strict(&config.to_string())
            .unwrap()
            .build(&weights())
            .unwrap_err();
        assert!(err.to_string().contains("declares 2 units"));
    }

    #[test]
    fn test_functional_models_are_unsupported() {
        let mut config = architecture(json!({"input_shape": [3]}));
        config["class_name"] = json!("Functional");
        let parsed = KerasModelConfig::parse_strict(&config.to_string()).unwrap();
        assert!(parsed.build(&weights()).is_err());
    }
}
