//! Error types for artifact loading and inference.

use std::fmt;
use std::path::PathBuf;

/// Failure of a single model loader tier.
#[derive(Debug, Clone, PartialEq)]
pub struct TierFailure {
    /// Tier name, e.g. `onnx-runtime`.
    pub tier: &'static str,
    /// Error reported by the tier.
    pub message: String,
}

impl fmt::Display for TierFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.tier, self.message)
    }
}

fn join_failures(failures: &[TierFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors surfaced by the prediction service core.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// No candidate file exists for an artifact.
    #[error("{artifact} artifact not found; checked: {}", join_paths(.searched))]
    ArtifactNotFound {
        artifact: &'static str,
        searched: Vec<PathBuf>,
    },

    /// The artifact exists but every loader tier rejected it.
    #[error("model artifact '{}' could not be loaded: {}", .path.display(), join_failures(.failures))]
    ArtifactUnparseable {
        path: PathBuf,
        failures: Vec<TierFailure>,
    },

    /// The scaler artifact exists but is unreadable or inconsistent.
    #[error("scaler artifact '{}' is invalid: {detail}", .path.display())]
    ScalerInvalid { path: PathBuf, detail: String },

    /// Inference requested while the model or scaler is missing.
    #[error("model not loaded; check server logs and the /health endpoint")]
    ServiceUnavailable,

    /// Scaling or inference failed on an otherwise healthy service.
    #[error("prediction failed: {0}")]
    Computation(String),

    /// A feature lies outside its declared range.
    #[error("{field} must be between {min} and {max} (got {value})")]
    Validation {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// A batch request exceeds the per-call limit.
    #[error("batch of {len} farms exceeds the limit of {max}")]
    BatchTooLarge { len: usize, max: usize },

    /// The request body is not a JSON document of the expected shape.
    #[error("invalid request body: {0}")]
    MalformedBody(String),
}

impl ServiceError {
    /// Whether the error stems from the loaded artifacts rather than the request.
    pub fn is_artifact_error(&self) -> bool {
        matches!(
            self,
            ServiceError::ArtifactNotFound { .. }
                | ServiceError::ArtifactUnparseable { .. }
                | ServiceError::ScalerInvalid { .. }
        )
    }

    /// Short label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::ArtifactNotFound { .. } => "artifact_not_found",
            ServiceError::ArtifactUnparseable { .. } => "artifact_unparseable",
            ServiceError::ScalerInvalid { .. } => "scaler_invalid",
            ServiceError::ServiceUnavailable => "service_unavailable",
            ServiceError::Computation(_) => "computation",
            ServiceError::Validation { .. } => "validation",
            ServiceError::BatchTooLarge { .. } => "batch_too_large",
            ServiceError::MalformedBody(_) => "malformed_body",
        }
    }
}
