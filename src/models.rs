/// Model resolution and black-box inference
///
/// The pipeline treats every neural network (melspectrogram, embedding,
/// VAD, per-keyword classifier) as an opaque scoring function: input tensor
/// in, output tensor out. Components depend only on the `InferenceModel`
/// trait, never on a concrete runtime, so tests substitute mocks and the
/// ONNX backend stays an optional feature.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// Melspectrogram model file name
pub const MELSPECTROGRAM_FILE: &str = "melspectrogram.onnx";

/// Embedding model file name
pub const EMBEDDING_FILE: &str = "embedding_model.onnx";

/// VAD model file name
pub const VAD_FILE: &str = "silero_vad.onnx";

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("model '{name}' not found under any accepted pattern, tried: {attempted:?}")]
    Resolution {
        name: String,
        attempted: Vec<PathBuf>,
    },

    #[error("failed to load model '{name}': {reason}")]
    Load { name: String, reason: String },

    #[error("no inference backend enabled (build with the `onnx` feature)")]
    BackendUnavailable,
}

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("inference failed: {0}")]
    Failed(String),

    #[error("model produced an empty output")]
    EmptyOutput,
}

/// Opaque scoring function: one input tensor, one output tensor.
#[async_trait]
pub trait InferenceModel: Send {
    async fn run(&mut self, input: &[f32]) -> Result<Vec<f32>, InferenceError>;
}

/// Turns a resolved model file into a scoring function.
///
/// The engine owns one loader for its whole lifetime; tests inject loaders
/// that return scripted mocks.
pub trait ModelLoader: Send {
    fn load(&self, name: &str, path: &Path) -> Result<Box<dyn InferenceModel>, ModelError>;
}

/// Resolves model-file paths under the configured directory and tracks
/// per-model load status for diagnostics.
pub struct ModelRegistry {
    models_path: PathBuf,
    status: BTreeMap<String, bool>,
}

impl ModelRegistry {
    pub fn new(models_path: impl Into<PathBuf>) -> Self {
        Self {
            models_path: models_path.into(),
            status: BTreeMap::new(),
        }
    }

    pub fn models_path(&self) -> &Path {
        &self.models_path
    }

    pub fn resolve_melspectrogram(&self) -> Result<PathBuf, ModelError> {
        self.resolve("melspectrogram", &[MELSPECTROGRAM_FILE.to_string()])
    }

    pub fn resolve_embedding(&self) -> Result<PathBuf, ModelError> {
        self.resolve("embedding", &[EMBEDDING_FILE.to_string()])
    }

    pub fn resolve_vad(&self) -> Result<PathBuf, ModelError> {
        self.resolve("vad", &[VAD_FILE.to_string()])
    }

    /// Resolve a keyword classifier file. Accepted patterns, first match
    /// wins: `{kw}.onnx`, `{kw}_v0.1.onnx`, and the hyphenated `{kw}.onnx`.
    pub fn resolve_keyword(&self, keyword: &str) -> Result<PathBuf, ModelError> {
        let patterns = [
            format!("{keyword}.onnx"),
            format!("{keyword}_v0.1.onnx"),
            format!("{}.onnx", keyword.replace('_', "-")),
        ];
        self.resolve(keyword, &patterns)
    }

    fn resolve(&self, name: &str, patterns: &[String]) -> Result<PathBuf, ModelError> {
        let mut attempted = Vec::with_capacity(patterns.len());

        for pattern in patterns {
            let path = self.models_path.join(pattern);
            if path.exists() {
                debug!("resolved model '{}' to {}", name, path.display());
                return Ok(path);
            }
            attempted.push(path);
        }

        Err(ModelError::Resolution {
            name: name.to_string(),
            attempted,
        })
    }

    /// Record a model's load outcome for `status()` reporting
    pub fn mark(&mut self, name: &str, loaded: bool) {
        self.status.insert(name.to_string(), loaded);
    }

    /// Per-model loaded flags, keyed by model name
    pub fn status(&self) -> BTreeMap<String, bool> {
        self.status.clone()
    }

    /// Forget all load status (engine disposal)
    pub fn clear(&mut self) {
        self.status.clear();
    }
}

/// The loader used when no explicit loader is supplied: ONNX-backed when
/// the `onnx` feature is enabled, otherwise every load fails.
pub fn default_loader() -> Box<dyn ModelLoader> {
    #[cfg(feature = "onnx")]
    {
        Box::new(onnx::OnnxLoader)
    }
    #[cfg(not(feature = "onnx"))]
    {
        Box::new(NullLoader)
    }
}

/// Loader for builds without an inference backend
#[cfg(not(feature = "onnx"))]
struct NullLoader;

#[cfg(not(feature = "onnx"))]
impl ModelLoader for NullLoader {
    fn load(&self, _name: &str, _path: &Path) -> Result<Box<dyn InferenceModel>, ModelError> {
        Err(ModelError::BackendUnavailable)
    }
}

#[cfg(feature = "onnx")]
mod onnx {
    use super::*;
    use ort::session::{builder::GraphOptimizationLevel, Session};
    use ort::value::Tensor;

    /// ONNX Runtime-backed scoring function.
    ///
    /// Inputs are shaped `[1, len]`; the first output tensor is returned
    /// flattened. Models with extra inputs (e.g. recurrent state) are not
    /// supported by this minimal backend.
    pub struct OnnxModel {
        session: Session,
    }

    #[async_trait]
    impl InferenceModel for OnnxModel {
        async fn run(&mut self, input: &[f32]) -> Result<Vec<f32>, InferenceError> {
            let array = ndarray::Array2::from_shape_vec((1, input.len()), input.to_vec())
                .map_err(|e| InferenceError::Failed(e.to_string()))?;
            let tensor =
                Tensor::from_array(array).map_err(|e| InferenceError::Failed(e.to_string()))?;

            let outputs = self
                .session
                .run(ort::inputs![tensor])
                .map_err(|e| InferenceError::Failed(e.to_string()))?;

            let view: ndarray::ArrayViewD<f32> = outputs[0]
                .try_extract_array()
                .map_err(|e| InferenceError::Failed(e.to_string()))?;

            let flat: Vec<f32> = view.iter().copied().collect();
            if flat.is_empty() {
                return Err(InferenceError::EmptyOutput);
            }
            Ok(flat)
        }
    }

    pub struct OnnxLoader;

    impl ModelLoader for OnnxLoader {
        fn load(&self, name: &str, path: &Path) -> Result<Box<dyn InferenceModel>, ModelError> {
            let session = Session::builder()
                .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
                .and_then(|b| b.with_intra_threads(1))
                .and_then(|b| b.commit_from_file(path))
                .map_err(|e| ModelError::Load {
                    name: name.to_string(),
                    reason: e.to_string(),
                })?;

            Ok(Box::new(OnnxModel { session }))
        }
    }
}
