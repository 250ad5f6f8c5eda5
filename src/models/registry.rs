//! Registry holding the currently published model and scaler

use crate::config::{ArtifactsConfig, InferenceConfig};
use crate::error::ServiceError;
use crate::models::inference::score_row;
use crate::models::loader::{resolve_artifact, LoadedModel, ModelLoader};
use crate::models::scaler::FeatureScaler;
use crate::types::farm::FarmInput;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{error, info, warn};

/// Read-only diagnostic view of the registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistrySnapshot {
    pub model_loaded: bool,
    pub scaler_loaded: bool,
    pub last_error: Option<String>,
    pub model_path: Option<PathBuf>,
    pub loaded_by: Option<&'static str>,
}

impl RegistrySnapshot {
    pub fn is_healthy(&self) -> bool {
        self.model_loaded && self.scaler_loaded
    }
}

#[derive(Default)]
struct RegistryState {
    model: Option<LoadedModel>,
    scaler: Option<Arc<FeatureScaler>>,
    last_error: Option<String>,
}

/// Owner of the loaded artifacts.
///
/// Model and scaler are published together or not at all; a failed load
/// clears both and records the error for `/health`.
pub struct ModelRegistry {
    artifacts: ArtifactsConfig,
    loader: ModelLoader,
    sanity_check: bool,
    state: RwLock<RegistryState>,
}

impl ModelRegistry {
    /// Create an empty registry using the default loader tiers.
    pub fn new(artifacts: ArtifactsConfig, inference: &InferenceConfig) -> Self {
        Self::with_loader(
            artifacts,
            ModelLoader::new(inference.onnx_threads),
            inference.sanity_check,
        )
    }

    pub fn with_loader(artifacts: ArtifactsConfig, loader: ModelLoader, sanity_check: bool) -> Self {
        Self {
            artifacts,
            loader,
            sanity_check,
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// Load scaler then model, publishing both on success.
    ///
    /// Returns false and leaves the registry empty if either step fails.
    pub fn load(&self) -> bool {
        info!("Loading model and scaler...");

        match self.load_artifacts() {
            Ok((scaler, model)) => {
                let mut state = self.write_state();
                state.scaler = Some(scaler);
                state.model = Some(model);
                state.last_error = None;
                true
            }
            Err(e) => {
                error!(error = %e, kind = e.kind(), "Error loading model");
                let mut state = self.write_state();
                state.model = None;
                state.scaler = None;
                state.last_error = Some(e.to_string());
                false
            }
        }
    }

    fn load_artifacts(&self) -> Result<(Arc<FeatureScaler>, LoadedModel), ServiceError> {
        let search_dirs = self.artifacts.search_dirs();

        let scaler_path = resolve_artifact(
            "scaler",
            self.artifacts.scaler_path.as_deref(),
            &search_dirs,
            &self.artifacts.scaler_candidates,
        )?;
        let scaler = Arc::new(FeatureScaler::from_file(&scaler_path)?);

        let model_path = resolve_artifact(
            "model",
            self.artifacts.model_path.as_deref(),
            &search_dirs,
            &self.artifacts.model_candidates,
        )?;
        let model = self.loader.load_model(&model_path)?;

        if self.sanity_check {
            // Advisory only: the model stays published if this fails.
            match score_row(&scaler, model.model.as_ref(), &FarmInput::sample().values()) {
                Ok(output) => info!(sample_prediction = output, "Model test successful"),
                Err(e) => warn!(error = %e, "Model loaded but sample prediction test failed"),
            }
        }

        Ok((scaler, model))
    }

    pub fn is_healthy(&self) -> bool {
        let state = self.read_state();
        state.model.is_some() && state.scaler.is_some()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        let state = self.read_state();
        RegistrySnapshot {
            model_loaded: state.model.is_some(),
            scaler_loaded: state.scaler.is_some(),
            last_error: state.last_error.clone(),
            model_path: state.model.as_ref().map(|m| m.path.clone()),
            loaded_by: state.model.as_ref().map(|m| m.tier),
        }
    }

    /// Shared handles to the scaler and model, or `ServiceUnavailable`.
    pub fn artifacts(&self) -> Result<(Arc<FeatureScaler>, LoadedModel), ServiceError> {
        let state = self.read_state();
        match (&state.scaler, &state.model) {
            (Some(scaler), Some(model)) => Ok((scaler.clone(), model.clone())),
            _ => Err(ServiceError::ServiceUnavailable),
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
