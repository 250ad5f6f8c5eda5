//! Model loading and inference components

pub mod h5;
pub mod inference;
pub mod keras;
pub mod loader;
pub mod network;
pub mod onnx;
pub mod registry;
pub mod regressor;
pub mod scaler;

pub use inference::{InferenceEngine, PredictionResult};
pub use loader::{LoadStrategy, LoadedModel, ModelLoader};
pub use network::DenseNetwork;
pub use registry::{ModelRegistry, RegistrySnapshot};
pub use regressor::{ModelDescription, Regressor};
pub use scaler::FeatureScaler;
