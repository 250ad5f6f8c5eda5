//! Model artifact resolution and tiered loading
//!
//! A model artifact is handed to an ordered list of loader strategies. The
//! first strategy to produce a usable model wins; if all of them fail the
//! caller receives every tier's error at once.

use crate::error::{ServiceError, TierFailure};
use crate::feature_extractor::FEATURE_COUNT;
use crate::models::h5::KerasH5;
use crate::models::keras::KerasModelConfig;
use crate::models::onnx::OnnxRegressor;
use crate::models::regressor::Regressor;
use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// One way of turning an artifact file into a model.
pub trait LoadStrategy: Send + Sync {
    /// Tier name used in logs and aggregated errors.
    fn tier(&self) -> &'static str;

    fn load(&self, path: &Path) -> Result<Box<dyn Regressor>>;
}

/// Direct load as an ONNX graph.
pub struct OnnxStrategy {
    threads: usize,
}

impl OnnxStrategy {
    pub fn new(threads: usize) -> Self {
        Self { threads }
    }
}

impl LoadStrategy for OnnxStrategy {
    fn tier(&self) -> &'static str {
        "onnx-runtime"
    }

    fn load(&self, path: &Path) -> Result<Box<dyn Regressor>> {
        let model = OnnxRegressor::load(path, self.threads, FEATURE_COUNT)?;
        Ok(Box::new(model))
    }
}

/// Keras HDF5 file read with the architecture exactly as stored.
pub struct KerasH5Strategy;

impl LoadStrategy for KerasH5Strategy {
    fn tier(&self) -> &'static str {
        "keras-h5"
    }

    fn load(&self, path: &Path) -> Result<Box<dyn Regressor>> {
        let saved = KerasH5::read(path)?;
        let architecture = KerasModelConfig::parse_strict(&saved.model_config)?;
        Ok(Box::new(architecture.build(&saved.weights)?))
    }
}

/// Keras HDF5 file with the architecture rewritten for compatibility before
/// the weights are bound.
pub struct ReconstructionStrategy;

impl LoadStrategy for ReconstructionStrategy {
    fn tier(&self) -> &'static str {
        "manual-reconstruction"
    }

    fn load(&self, path: &Path) -> Result<Box<dyn Regressor>> {
        let saved = KerasH5::read(path)?;
        let architecture = KerasModelConfig::parse_compatible(&saved.model_config)?;
        Ok(Box::new(architecture.build(&saved.weights)?))
    }
}

/// Model published by a successful load.
#[derive(Clone)]
pub struct LoadedModel {
    pub model: Arc<dyn Regressor>,
    /// Artifact the model was read from
    pub path: PathBuf,
    /// Tier that produced the model
    pub tier: &'static str,
}

impl std::fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModel")
            .field("path", &self.path)
            .field("tier", &self.tier)
            .field("model", &self.model.describe())
            .finish()
    }
}

/// Loader running strategies in order over a single artifact.
pub struct ModelLoader {
    strategies: Vec<Box<dyn LoadStrategy>>,
}

impl ModelLoader {
    /// Default tiers: ONNX graph, strict Keras HDF5, manual reconstruction.
    pub fn new(onnx_threads: usize) -> Self {
        Self::with_strategies(vec![
            Box::new(OnnxStrategy::new(onnx_threads)),
            Box::new(KerasH5Strategy),
            Box::new(ReconstructionStrategy),
        ])
    }

    pub fn with_strategies(strategies: Vec<Box<dyn LoadStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn tiers(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.tier()).collect()
    }

    /// Load a model artifact, trying each tier until one succeeds.
    pub fn load_model<P: AsRef<Path>>(&self, path: P) -> Result<LoadedModel, ServiceError> {
        let path = path.as_ref();
        let mut failures = Vec::new();

        info!(path = %path.display(), tiers = ?self.tiers(), "Loading model artifact");

        for strategy in &self.strategies {
            let tier = strategy.tier();
            let outcome = strategy.load(path).and_then(|model| {
                check_io_width(model.as_ref())?;
                Ok(model)
            });

            match outcome {
                Ok(model) => {
                    info!(
                        path = %path.display(),
                        tier = tier,
                        backend = model.describe().backend,
                        "Model loaded"
                    );
                    return Ok(LoadedModel {
                        model: Arc::from(model),
                        path: path.to_path_buf(),
                        tier,
                    });
                }
                Err(e) => {
                    let message = format!("{:#}", e);
                    warn!(path = %path.display(), tier = tier, error = %message, "Loader tier failed");
                    failures.push(TierFailure { tier, message });
                }
            }
        }

        error!(path = %path.display(), attempts = failures.len(), "All model loader tiers failed");
        Err(ServiceError::ArtifactUnparseable {
            path: path.to_path_buf(),
            failures,
        })
    }
}

fn check_io_width(model: &dyn Regressor) -> Result<()> {
    let description = model.describe();
    if description.input_width != FEATURE_COUNT {
        bail!(
            "model expects {} inputs, service provides {}",
            description.input_width,
            FEATURE_COUNT
        );
    }
    if description.output_width != 1 {
        bail!(
            "model has {} outputs, expected a single regression output",
            description.output_width
        );
    }
    Ok(())
}

/// Pick the artifact to load.
///
/// The override is tried first, then each conventional name in each search
/// directory, in order. The first existing file wins.
pub fn resolve_artifact(
    artifact: &'static str,
    override_path: Option<&Path>,
    search_dirs: &[PathBuf],
    names: &[String],
) -> Result<PathBuf, ServiceError> {
    let candidates: Vec<PathBuf> = override_path
        .map(Path::to_path_buf)
        .into_iter()
        .chain(
            search_dirs
                .iter()
                .flat_map(|dir| names.iter().map(move |name| dir.join(name))),
        )
        .collect();

    match candidates.iter().find(|p| p.is_file()) {
        Some(found) => {
            if let Some(requested) = override_path {
                if requested != found.as_path() {
                    warn!(
                        artifact = artifact,
                        requested = %requested.display(),
                        using = %found.display(),
                        "Override path does not exist, using fallback"
                    );
                }
            }
            Ok(found.clone())
        }
        None => Err(ServiceError::ArtifactNotFound {
            artifact,
            searched: candidates,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::regressor::ModelDescription;
    use anyhow::{anyhow, Context};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Constant {
        value: f32,
        inputs: usize,
        outputs: usize,
    }

    impl Regressor for Constant {
        fn predict(&self, _input: &[f32]) -> Result<f32> {
            Ok(self.value)
        }

        fn describe(&self) -> ModelDescription {
            ModelDescription {
                backend: "constant",
                input_width: self.inputs,
                output_width: self.outputs,
                summary: Vec::new(),
            }
        }
    }

    struct Failing(&'static str);

    impl LoadStrategy for Failing {
        fn tier(&self) -> &'static str {
            self.0
        }

        fn load(&self, _path: &Path) -> Result<Box<dyn Regressor>> {
            Err(anyhow!("{} cannot read this", self.0)).context("Failed to load model")
        }
    }

    struct Counting(&'static AtomicUsize, usize, usize);

    impl LoadStrategy for Counting {
        fn tier(&self) -> &'static str {
            "counting"
        }

        fn load(&self, _path: &Path) -> Result<Box<dyn Regressor>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(Constant {
                value: 42.0,
                inputs: self.1,
                outputs: self.2,
            }))
        }
    }

    #[test]
    fn test_first_success_short_circuits() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        let loader = ModelLoader::with_strategies(vec![
            Box::new(Failing("first")),
            Box::new(Counting(&CALLS, FEATURE_COUNT, 1)),
            Box::new(Counting(&CALLS, FEATURE_COUNT, 1)),
        ]);

        let loaded = loader.load_model("model.bin").unwrap();
        assert_eq!(loaded.tier, "counting");
        assert_eq!(loaded.model.predict(&[0.0; 7]).unwrap(), 42.0);
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_all_failures_are_aggregated() {
        let loader = ModelLoader::with_strategies(vec![
            Box::new(Failing("first")),
            Box::new(Failing("second")),
            Box::new(Failing("third")),
        ]);

        match loader.load_model("model.bin") {
            Err(ServiceError::ArtifactUnparseable { failures, .. }) => {
                let tiers: Vec<_> = failures.iter().map(|f| f.tier).collect();
                assert_eq!(tiers, vec!["first", "second", "third"]);
                // the whole context chain is kept
                assert_eq!(
                    failures[1].message,
                    "Failed to load model: second cannot read this"
                );
            }
            other => panic!("expected unparseable artifact, got {:?}", other),
        }
    }

    #[test]
    fn test_wrong_input_width_counts_as_tier_failure() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        let loader = ModelLoader::with_strategies(vec![
            Box::new(Counting(&CALLS, 5, 1)),
            Box::new(Counting(&CALLS, FEATURE_COUNT, 3)),
        ]);

        match loader.load_model("model.bin") {
            Err(ServiceError::ArtifactUnparseable { failures, .. }) => {
                assert!(failures[0].message.contains("expects 5 inputs"));
                assert!(failures[1].message.contains("has 3 outputs"));
            }
            other => panic!("expected unparseable artifact, got {:?}", other),
        }
        assert_eq!(CALLS.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_default_tier_order() {
        let loader = ModelLoader::new(1);
        assert_eq!(
            loader.tiers(),
            vec!["onnx-runtime", "keras-h5", "manual-reconstruction"]
        );
    }

    #[test]
    fn test_resolve_prefers_override_then_order() {
        let root = tempfile::tempdir().unwrap();
        let models = root.path().join("models");
        std::fs::create_dir(&models).unwrap();
        std::fs::write(models.join("b.json"), "{}").unwrap();
        std::fs::write(root.path().join("a.json"), "{}").unwrap();
        let names = vec!["a.json".to_string(), "b.json".to_string()];
        let dirs = vec![models.clone(), root.path().to_path_buf()];

        // models/ is searched before the root, whatever the name order
        let found = resolve_artifact("model", None, &dirs, &names).unwrap();
        assert_eq!(found, models.join("b.json"));

        let custom = root.path().join("custom.json");
        std::fs::write(&custom, "{}").unwrap();
        let found = resolve_artifact("model", Some(&custom), &dirs, &names).unwrap();
        assert_eq!(found, custom);

        // a missing override falls back to the conventional names
        let missing = root.path().join("missing.json");
        let found = resolve_artifact("model", Some(&missing), &dirs, &names).unwrap();
        assert_eq!(found, models.join("b.json"));
    }

    #[test]
    fn test_resolve_not_found_lists_candidates() {
        let root = tempfile::tempdir().unwrap();
        let names = vec!["scaler_X.json".to_string()];
        let dirs = vec![root.path().join("models"), root.path().to_path_buf()];

        match resolve_artifact("scaler", None, &dirs, &names) {
            Err(ServiceError::ArtifactNotFound { artifact, searched }) => {
                assert_eq!(artifact, "scaler");
                assert_eq!(searched.len(), 2);
            }
            other => panic!("expected not found, got {:?}", other),
        }
    }
}
