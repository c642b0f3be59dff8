//! Model management for ONNX Runtime
//!
//! Locates the recognition model and dictionary, verifies the model file,
//! and wraps the ONNX session behind the `InferenceBackend` trait.

use ndarray::{Array4, ArrayD, IxDyn};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::{ModelSettings, RuntimeSettings};
use crate::error::{InferenceError, ResourceLoadError};

/// Black-box inference step: (1, 3, H, W) tensor in, (1, T, V) scores out
pub trait InferenceBackend: Send + Sync {
    fn run(&self, input: Array4<f32>) -> Result<ArrayD<f32>, InferenceError>;
}

/// Resource files used by the recognizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelType {
    /// Text recognition model (CRNN/SVTR with CTC head)
    Recognition,
    /// Character dictionary for recognition
    Dictionary,
}

impl ModelType {
    /// Get the filename for this model type
    pub fn filename(&self) -> &'static str {
        match self {
            ModelType::Recognition => "rec.onnx",
            ModelType::Dictionary => "dict.txt",
        }
    }

    /// Display name for logging
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelType::Recognition => "Text Recognition",
            ModelType::Dictionary => "Character Dictionary",
        }
    }
}

/// Resolved locations of the model and dictionary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePaths {
    pub model: PathBuf,
    pub dictionary: PathBuf,
    /// Expected SHA-256 of the model, hex encoded
    pub model_sha256: Option<String>,
}

/// Resolves model files inside the models directory
pub struct ModelManager {
    models_dir: PathBuf,
}

impl ModelManager {
    /// Create a model manager rooted in the application data directory
    pub fn new() -> anyhow::Result<Self> {
        let data_dir = crate::storage::get_data_dir()?;
        Self::with_dir(data_dir.join("models"))
    }

    /// Create model manager with custom directory
    pub fn with_dir(models_dir: PathBuf) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&models_dir)?;
        Ok(Self { models_dir })
    }

    /// Get the models directory path
    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Get the default path of a resource file
    pub fn model_path(&self, model_type: ModelType) -> PathBuf {
        self.models_dir.join(model_type.filename())
    }

    /// Check if a resource file exists and is non-empty
    pub fn is_model_available(&self, model_type: ModelType) -> bool {
        std::fs::metadata(self.model_path(model_type))
            .map(|m| m.is_file() && m.len() > 0)
            .unwrap_or(false)
    }

    /// Resolve resource paths, preferring explicit settings over the models directory
    pub fn resolve(&self, settings: &ModelSettings) -> ResourcePaths {
        let paths = ResourcePaths {
            model: settings
                .model_path
                .clone()
                .unwrap_or_else(|| self.model_path(ModelType::Recognition)),
            dictionary: settings
                .dictionary_path
                .clone()
                .unwrap_or_else(|| self.model_path(ModelType::Dictionary)),
            model_sha256: settings.model_sha256.clone(),
        };
        debug!("Resolved resources: {:?}", paths);
        paths
    }
}

/// Hex-encoded SHA-256 of a file
pub fn file_sha256(path: &Path) -> Result<String, ResourceLoadError> {
    let data = std::fs::read(path).map_err(|e| ResourceLoadError::Read {
        resource: "model",
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Compare a file against an expected SHA-256 (case-insensitive hex)
pub fn verify_checksum(path: &Path, expected: &str) -> Result<(), ResourceLoadError> {
    let actual = file_sha256(path)?;
    if !actual.eq_ignore_ascii_case(expected.trim()) {
        return Err(ResourceLoadError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected: expected.trim().to_string(),
            actual,
        });
    }
    info!("Checksum verified for {:?}", path);
    Ok(())
}

fn session_error(e: impl std::fmt::Display) -> ResourceLoadError {
    ResourceLoadError::Session(e.to_string())
}

fn optimization_level(level: u8) -> GraphOptimizationLevel {
    match level {
        0 => GraphOptimizationLevel::Disable,
        1 => GraphOptimizationLevel::Level1,
        2 => GraphOptimizationLevel::Level2,
        _ => GraphOptimizationLevel::Level3,
    }
}

/// ONNX Runtime session wrapper
///
/// `Session::run` needs exclusive access, so concurrent callers queue on the mutex.
pub struct OnnxSession {
    session: Mutex<Session>,
}

impl OnnxSession {
    /// Create a new ONNX session from a model file
    pub fn new(model_path: &Path, runtime: &RuntimeSettings) -> Result<Self, ResourceLoadError> {
        info!("Loading ONNX model from {:?}", model_path);

        if !model_path.is_file() {
            return Err(ResourceLoadError::Read {
                resource: "model",
                path: model_path.to_path_buf(),
                message: "file not found".to_string(),
            });
        }

        let session = Session::builder()
            .map_err(session_error)?
            .with_optimization_level(optimization_level(runtime.optimization_level))
            .map_err(session_error)?
            .with_intra_threads(runtime.intra_threads.max(1))
            .map_err(session_error)?
            .commit_from_file(model_path)
            .map_err(session_error)?;

        let input_names: Vec<String> = session
            .inputs
            .iter()
            .map(|input| input.name.clone())
            .collect();

        let output_names: Vec<String> = session
            .outputs
            .iter()
            .map(|output| output.name.clone())
            .collect();

        info!(
            "Model loaded. Inputs: {:?}, Outputs: {:?}",
            input_names, output_names
        );

        Ok(Self {
            session: Mutex::new(session),
        })
    }
}

impl InferenceBackend for OnnxSession {
    fn run(&self, input: Array4<f32>) -> Result<ArrayD<f32>, InferenceError> {
        let tensor = Tensor::from_array(input)
            .map_err(|e| InferenceError::new(format!("failed to create input tensor: {e}")))?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| InferenceError::new(format!("forward pass failed: {e}")))?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::new(format!("failed to extract output tensor: {e}")))?;

        let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
        ArrayD::from_shape_vec(IxDyn(&dims), data.to_vec())
            .map_err(|e| InferenceError::new(format!("output shape {:?}: {e}", dims)))
    }
}
