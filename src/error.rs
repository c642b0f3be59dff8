//! Error taxonomy for the recognizer pipeline

use std::path::PathBuf;
use thiserror::Error;

use crate::vision::RecognizerStatus;

/// Failure while reading or preparing the vocabulary or model.
///
/// Cloneable so a failed recognizer can hand the same error back to every
/// later caller.
#[derive(Debug, Clone, Error)]
pub enum ResourceLoadError {
    #[error("failed to read {resource} from {path}: {message}")]
    Read {
        resource: &'static str,
        path: PathBuf,
        message: String,
    },

    #[error("dictionary at {path} contains no symbols")]
    EmptyDictionary { path: PathBuf },

    #[error("checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("failed to initialize inference session: {0}")]
    Session(String),

    #[error("resource loading aborted: {0}")]
    Aborted(String),
}

/// The input image could not be turned into a drawing surface.
#[derive(Debug, Error)]
#[error("could not render input image: {message}")]
pub struct RenderError {
    message: String,
}

impl RenderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The inference step failed or produced output of the wrong shape.
#[derive(Debug, Error)]
#[error("inference failed: {message}")]
pub struct InferenceError {
    message: String,
}

impl InferenceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Everything `Recognizer::recognize` can fail with.
#[derive(Debug, Error)]
pub enum RecognizerError {
    #[error(transparent)]
    ResourceLoad(#[from] ResourceLoadError),

    #[error("recognizer is not ready (currently {0})")]
    NotReady(RecognizerStatus),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

pub type Result<T> = std::result::Result<T, RecognizerError>;
