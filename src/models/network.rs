//! Feedforward network backend evaluated with ndarray

use crate::models::regressor::{ModelDescription, Regressor};
use anyhow::{bail, Result};
use ndarray::{Array1, Array2, ArrayView1};

/// Element-wise activation of a dense layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Linear,
    Relu,
    Sigmoid,
    Tanh,
    Elu,
    Softplus,
    Swish,
}

impl Activation {
    /// Parse a Keras activation identifier.
    pub fn from_keras(name: &str) -> Option<Self> {
        match name {
            "linear" | "None" => Some(Activation::Linear),
            "relu" => Some(Activation::Relu),
            "sigmoid" => Some(Activation::Sigmoid),
            "tanh" => Some(Activation::Tanh),
            "elu" => Some(Activation::Elu),
            "softplus" => Some(Activation::Softplus),
            "swish" | "silu" => Some(Activation::Swish),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Activation::Linear => "linear",
            Activation::Relu => "relu",
            Activation::Sigmoid => "sigmoid",
            Activation::Tanh => "tanh",
            Activation::Elu => "elu",
            Activation::Softplus => "softplus",
            Activation::Swish => "swish",
        }
    }

    fn apply(&self, x: f32) -> f32 {
        match self {
            Activation::Linear => x,
            Activation::Relu => x.max(0.0),
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::Tanh => x.tanh(),
            Activation::Elu => {
                if x > 0.0 {
                    x
                } else {
                    x.exp_m1()
                }
            }
            Activation::Softplus => x.exp().ln_1p(),
            Activation::Swish => x / (1.0 + (-x).exp()),
        }
    }
}

/// Fully connected layer with a `[in, out]` kernel, Keras layout.
#[derive(Debug, Clone)]
pub struct DenseLayer {
    name: String,
    kernel: Array2<f32>,
    bias: Array1<f32>,
    activation: Activation,
}

impl DenseLayer {
    pub fn new(
        name: impl Into<String>,
        kernel: Array2<f32>,
        bias: Array1<f32>,
        activation: Activation,
    ) -> Result<Self> {
        let name = name.into();
        if bias.len() != kernel.ncols() {
            bail!(
                "layer '{}': bias has {} entries but kernel has {} units",
                name,
                bias.len(),
                kernel.ncols()
            );
        }
        Ok(Self {
            name,
            kernel,
            bias,
            activation,
        })
    }

    pub fn input_width(&self) -> usize {
        self.kernel.nrows()
    }

    pub fn units(&self) -> usize {
        self.kernel.ncols()
    }

    fn forward(&self, x: ArrayView1<f32>) -> Array1<f32> {
        let mut z = x.dot(&self.kernel) + &self.bias;
        z.mapv_inplace(|v| self.activation.apply(v));
        z
    }
}

/// Sequential stack of dense layers producing a single regression output.
#[derive(Debug, Clone)]
pub struct DenseNetwork {
    input_width: usize,
    layers: Vec<DenseLayer>,
}

impl DenseNetwork {
    /// Chain layers, checking that consecutive widths agree.
    pub fn new(input_width: usize, layers: Vec<DenseLayer>) -> Result<Self> {
        if layers.is_empty() {
            bail!("network has no dense layers");
        }

        let mut width = input_width;
        for layer in &layers {
            if layer.input_width() != width {
                bail!(
                    "layer '{}' expects {} inputs but receives {}",
                    layer.name,
                    layer.input_width(),
                    width
                );
            }
            width = layer.units();
        }

        Ok(Self {
            input_width,
            layers,
        })
    }

    pub fn output_width(&self) -> usize {
        self.layers.last().map(DenseLayer::units).unwrap_or(0)
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }
}

impl Regressor for DenseNetwork {
    fn predict(&self, input: &[f32]) -> Result<f32> {
        if input.len() != self.input_width {
            bail!(
                "network expects {} inputs, got {}",
                self.input_width,
                input.len()
            );
        }

        let mut activations = ArrayView1::from(input).to_owned();
        for layer in &self.layers {
            activations = layer.forward(activations.view());
        }

        match activations.first() {
            Some(v) if v.is_finite() => Ok(*v),
            Some(v) => bail!("network produced non-finite output {}", v),
            None => bail!("network produced no output"),
        }
    }

    fn describe(&self) -> ModelDescription {
        ModelDescription {
            backend: "dense-network",
            input_width: self.input_width,
            output_width: self.output_width(),
            summary: self
                .layers
                .iter()
                .map(|l| {
                    format!(
                        "{} (Dense) {} -> {} [{}]",
                        l.name,
                        l.input_width(),
                        l.units(),
                        l.activation.name()
                    )
                })
                .collect(),
        }
    }
}
