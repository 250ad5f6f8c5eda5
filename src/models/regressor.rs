//! Capability shared by every model backend

use anyhow::Result;
use serde::Serialize;

/// Summary of a loaded model for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelDescription {
    /// Backend that produced the model, e.g. `dense-network`
    pub backend: &'static str,
    /// Input width excluding the batch dimension
    pub input_width: usize,
    /// Output width excluding the batch dimension
    pub output_width: usize,
    /// One line per layer or graph input/output
    pub summary: Vec<String>,
}

/// A trained model producing one scalar from a scaled feature row.
///
/// Implementations are read-only after loading and shared across requests.
pub trait Regressor: Send + Sync {
    /// Run inference on one scaled row.
    fn predict(&self, input: &[f32]) -> Result<f32>;

    /// Describe the model for `/model/info` and logs.
    fn describe(&self) -> ModelDescription;
}
