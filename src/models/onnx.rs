//! ONNX Runtime model backend

use crate::models::regressor::{ModelDescription, Regressor};
use anyhow::{anyhow, bail, Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::{Tensor, ValueType};
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

/// Declared shape of a graph input or output; `-1` marks a dynamic dimension.
fn tensor_shape(name: &str, value_type: &ValueType) -> Result<Vec<i64>> {
    match value_type {
        ValueType::Tensor { shape, .. } => Ok(shape.iter().copied().collect()),
        other => bail!("'{}' is not a tensor ({:?})", name, other),
    }
}

/// Feature width of a `[batch, width]` (or `[width]`) shape, if fixed.
fn trailing_width(shape: &[i64]) -> Option<usize> {
    match shape.last() {
        Some(&dim) if dim > 0 => Some(dim as usize),
        Some(_) => None,
        None => Some(1),
    }
}

fn format_shape(shape: &[i64]) -> String {
    let dims: Vec<String> = shape
        .iter()
        .map(|d| if *d < 0 { "?".to_string() } else { d.to_string() })
        .collect();
    format!("[{}]", dims.join(", "))
}

/// Regression graph executed through ONNX Runtime.
pub struct OnnxRegressor {
    /// ONNX Runtime session; `run` needs exclusive access
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    input_shape: Vec<i64>,
    output_shape: Vec<i64>,
    input_width: usize,
    output_width: usize,
}

impl OnnxRegressor {
    /// Load an ONNX graph from file.
    ///
    /// A dynamic feature dimension is taken to be `expected_width`; a fixed one
    /// must equal it.
    pub fn load<P: AsRef<Path>>(path: P, threads: usize, expected_width: usize) -> Result<Self> {
        let path = path.as_ref();

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(threads)?
            .commit_from_file(path)
            .context(format!("Failed to load model from {:?}", path))?;

        if session.inputs.len() != 1 {
            bail!("graph declares {} inputs, expected 1", session.inputs.len());
        }
        if session.outputs.len() != 1 {
            bail!("graph declares {} outputs, expected 1", session.outputs.len());
        }
        let input = &session.inputs[0];
        let output = &session.outputs[0];

        let input_shape = tensor_shape(&input.name, &input.input_type)?;
        let output_shape = tensor_shape(&output.name, &output.output_type)?;

        let input_width = match trailing_width(&input_shape) {
            Some(width) if width != expected_width => bail!(
                "graph input '{}' has shape {}, expected {} features",
                input.name,
                format_shape(&input_shape),
                expected_width
            ),
            Some(width) => width,
            None => expected_width,
        };
        // a dynamic output width is checked on every prediction
        let output_width = trailing_width(&output_shape).unwrap_or(1);

        let input_name = input.name.clone();
        let output_name = output.name.clone();

        info!(
            path = %path.display(),
            input = %input_name,
            input_shape = %format_shape(&input_shape),
            output = %output_name,
            output_shape = %format_shape(&output_shape),
            threads = threads,
            "ONNX model loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            input_shape,
            output_shape,
            input_width,
            output_width,
        })
    }
}

impl Regressor for OnnxRegressor {
    fn predict(&self, input: &[f32]) -> Result<f32> {
        if input.len() != self.input_width {
            bail!(
                "graph expects {} inputs, got {}",
                self.input_width,
                input.len()
            );
        }

        // Shape [1, num_features]
        let shape = vec![1_i64, input.len() as i64];
        let tensor = Tensor::from_array((shape, input.to_vec()))
            .context("Failed to create input tensor")?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow!("Lock error: {}", e))?;
        let outputs = session.run(ort::inputs![self.input_name.as_str() => tensor])?;

        let output = outputs
            .get(self.output_name.as_str())
            .ok_or_else(|| anyhow!("graph produced no '{}' output", self.output_name))?;
        let (_, data) = output.try_extract_tensor::<f32>()?;

        match data {
            [v] if v.is_finite() => Ok(*v),
            [v] => bail!("graph produced non-finite output {}", v),
            other => bail!("graph produced {} values, expected 1", other.len()),
        }
    }

    fn describe(&self) -> ModelDescription {
        ModelDescription {
            backend: "onnx-runtime",
            input_width: self.input_width,
            output_width: self.output_width,
            summary: vec![
                format!("input: {} {}", self.input_name, format_shape(&self.input_shape)),
                format!("output: {} {}", self.output_name, format_shape(&self.output_shape)),
            ],
        }
    }
}
