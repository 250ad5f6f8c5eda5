//! Configuration management for the egg production service

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub artifacts: ArtifactsConfig,
    pub inference: InferenceConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Where to look for the model and scaler artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    /// Application root; also the last directory searched
    pub app_root: PathBuf,
    /// Models directory, relative to `app_root` unless absolute
    pub models_dir: PathBuf,
    /// Explicit model file, tried before the conventional names
    #[serde(default)]
    pub model_path: Option<PathBuf>,
    /// Explicit scaler file, tried before the conventional names
    #[serde(default)]
    pub scaler_path: Option<PathBuf>,
    /// Conventional model filenames in priority order
    pub model_candidates: Vec<String>,
    /// Conventional scaler filenames in priority order
    pub scaler_candidates: Vec<String>,
}

impl ArtifactsConfig {
    /// Directories searched for conventional filenames, in order.
    pub fn search_dirs(&self) -> Vec<PathBuf> {
        vec![self.app_root.join(&self.models_dir), self.app_root.clone()]
    }
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            app_root: PathBuf::from("."),
            models_dir: PathBuf::from("models"),
            model_path: None,
            scaler_path: None,
            model_candidates: vec![
                "sequence_model.onnx".to_string(),
                "sequence_model_fixed.h5".to_string(),
                "sequence_model_compatible.h5".to_string(),
                "sequence_model.h5".to_string(),
                "sequence_model.keras".to_string(),
            ],
            scaler_candidates: vec!["scaler_X.json".to_string()],
        }
    }
}

/// Inference configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Maximum farms per batch request
    pub max_batch_size: usize,
    /// Number of threads for ONNX inference
    pub onnx_threads: usize,
    /// Run a sample prediction right after loading
    pub sanity_check: bool,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 100,
            onnx_threads: 1,
            sanity_check: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Seconds between logged summaries; 0 disables the reporter
    pub report_interval_secs: u64,
}

impl AppConfig {
    /// Load configuration from `config/config.toml` and the environment
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_path("config/config.toml")?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration layered over the defaults.
    ///
    /// The file is optional; `EGG__SECTION__KEY` variables override it.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let defaults = Config::try_from(&Self::default())
            .context("Failed to encode default configuration")?;

        let config = Config::builder()
            .add_source(defaults)
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(Environment::with_prefix("EGG").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Apply the artifact and port overrides (`MODEL_PATH`, `SCALER_X_PATH`, `PORT`).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("MODEL_PATH").filter(|p| !p.is_empty()) {
            self.artifacts.model_path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("SCALER_X_PATH").filter(|p| !p.is_empty()) {
            self.artifacts.scaler_path = Some(PathBuf::from(path));
        }
        if let Some(port) = lookup("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8000,
            },
            artifacts: ArtifactsConfig::default(),
            inference: InferenceConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
            metrics: MetricsConfig {
                report_interval_secs: 60,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.inference.max_batch_size, 100);
        assert_eq!(
            config.artifacts.model_candidates,
            vec![
                "sequence_model.onnx",
                "sequence_model_fixed.h5",
                "sequence_model_compatible.h5",
                "sequence_model.h5",
                "sequence_model.keras",
            ]
        );
        assert_eq!(config.artifacts.scaler_candidates, vec!["scaler_X.json"]);
        assert!(config.artifacts.model_path.is_none());
    }

    #[test]
    fn test_search_dirs_order() {
        let artifacts = ArtifactsConfig {
            app_root: PathBuf::from("/srv/eggs"),
            ..ArtifactsConfig::default()
        };
        assert_eq!(
            artifacts.search_dirs(),
            vec![PathBuf::from("/srv/eggs/models"), PathBuf::from("/srv/eggs")]
        );
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = AppConfig::load_from_path("does/not/exist.toml").unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.artifacts.models_dir, PathBuf::from("models"));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[server]\nport = 9100\n\n[inference]\nmax_batch_size = 10\n",
        )
        .unwrap();

        let config = AppConfig::load_from_path(&path).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.inference.max_batch_size, 10);
        // untouched keys keep their defaults
        assert_eq!(config.inference.onnx_threads, 1);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_env_style_overrides() {
        let vars: HashMap<&str, &str> = [
            ("MODEL_PATH", "/opt/models/custom.onnx"),
            ("SCALER_X_PATH", ""),
            ("PORT", "8080"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(
            config.artifacts.model_path,
            Some(PathBuf::from("/opt/models/custom.onnx"))
        );
        assert!(config.artifacts.scaler_path.is_none());
        assert_eq!(config.server.port, 8080);
    }
}
