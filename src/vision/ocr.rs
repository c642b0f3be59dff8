//! OCR (Optical Character Recognition) pipeline
//!
//! Normalizes a drawing, runs the recognition model and CTC-decodes its
//! output. Resources load once per session; until they have loaded every
//! call is rejected.

use image::DynamicImage;
use ndarray::{Array2, ArrayD, Axis, Ix3};
use parking_lot::RwLock;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::decode::greedy_decode;
use super::models::{verify_checksum, InferenceBackend, ModelType, OnnxSession, ResourcePaths};
use super::preprocess::{normalize_for_recognition, PreprocessConfig};
use super::vocabulary::Vocabulary;
use crate::config::RuntimeSettings;
use crate::error::{InferenceError, RecognizerError, RenderError, ResourceLoadError, Result};

/// Lifecycle of a recognizer, as reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognizerStatus {
    Uninitialized,
    Loading,
    Ready,
    Failed,
}

impl fmt::Display for RecognizerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecognizerStatus::Uninitialized => "uninitialized",
            RecognizerStatus::Loading => "loading",
            RecognizerStatus::Ready => "ready",
            RecognizerStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Vocabulary and inference backend, shared read-only once loaded
pub struct LoadedModel {
    vocabulary: Vocabulary,
    backend: Box<dyn InferenceBackend>,
}

impl LoadedModel {
    pub fn new(vocabulary: Vocabulary, backend: impl InferenceBackend + 'static) -> Self {
        Self {
            vocabulary,
            backend: Box::new(backend),
        }
    }

    /// Read the dictionary, verify the model and open an ONNX session
    pub fn from_files(
        paths: &ResourcePaths,
        runtime: &RuntimeSettings,
    ) -> std::result::Result<Self, ResourceLoadError> {
        info!(
            "Loading {} from {:?}",
            ModelType::Dictionary.display_name(),
            paths.dictionary
        );
        let vocabulary = Vocabulary::load(&paths.dictionary)?;

        if let Some(expected) = &paths.model_sha256 {
            verify_checksum(&paths.model, expected)?;
        }

        info!(
            "Loading {} from {:?}",
            ModelType::Recognition.display_name(),
            paths.model
        );
        let session = OnnxSession::new(&paths.model, runtime)?;

        Ok(Self::new(vocabulary, session))
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }
}

enum LoadState {
    Uninitialized,
    Loading,
    Ready(Arc<LoadedModel>),
    Failed(ResourceLoadError),
}

impl LoadState {
    fn status(&self) -> RecognizerStatus {
        match self {
            LoadState::Uninitialized => RecognizerStatus::Uninitialized,
            LoadState::Loading => RecognizerStatus::Loading,
            LoadState::Ready(_) => RecognizerStatus::Ready,
            LoadState::Failed(_) => RecognizerStatus::Failed,
        }
    }
}

/// Result of recognizing one drawing
#[derive(Debug, Clone, Serialize)]
pub struct RecognitionResult {
    /// Decoded text, possibly empty
    pub text: String,
    /// Mean score of the emitted symbols
    pub confidence: f32,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

/// Recognizer pipeline: normalize → infer → decode
pub struct Recognizer {
    state: RwLock<LoadState>,
    preprocess: PreprocessConfig,
}

impl Default for Recognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Recognizer {
    /// Create an unloaded recognizer with default preprocessing
    pub fn new() -> Self {
        Self::with_config(PreprocessConfig::default())
    }

    /// Create an unloaded recognizer with custom preprocessing
    pub fn with_config(preprocess: PreprocessConfig) -> Self {
        Self {
            state: RwLock::new(LoadState::Uninitialized),
            preprocess,
        }
    }

    /// Current lifecycle state
    pub fn status(&self) -> RecognizerStatus {
        self.state.read().status()
    }

    pub fn is_ready(&self) -> bool {
        self.status() == RecognizerStatus::Ready
    }

    /// The error that moved the recognizer to `Failed`, if any
    pub fn load_error(&self) -> Option<ResourceLoadError> {
        match &*self.state.read() {
            LoadState::Failed(e) => Some(e.clone()),
            _ => None,
        }
    }

    /// Run `loader` once on the blocking pool and publish the outcome
    ///
    /// Only the first call loads. Later calls report the existing outcome,
    /// or `NotReady` while the first load is still running.
    pub async fn load<F>(&self, loader: F) -> Result<()>
    where
        F: FnOnce() -> std::result::Result<LoadedModel, ResourceLoadError> + Send + 'static,
    {
        {
            let mut state = self.state.write();
            match &*state {
                LoadState::Uninitialized => {}
                LoadState::Loading => return Err(RecognizerError::NotReady(RecognizerStatus::Loading)),
                LoadState::Ready(_) => return Ok(()),
                LoadState::Failed(e) => return Err(e.clone().into()),
            }
            *state = LoadState::Loading;
        }

        info!("Loading recognizer resources");
        let start = Instant::now();

        let outcome = match tokio::task::spawn_blocking(loader).await {
            Ok(outcome) => outcome,
            Err(e) => Err(ResourceLoadError::Aborted(e.to_string())),
        };

        let mut state = self.state.write();
        match outcome {
            Ok(model) => {
                info!(
                    "Recognizer ready in {:?} ({} dictionary symbols)",
                    start.elapsed(),
                    model.vocabulary.dictionary_len()
                );
                *state = LoadState::Ready(Arc::new(model));
                Ok(())
            }
            Err(e) => {
                error!("Recognizer resources failed to load: {}", e);
                *state = LoadState::Failed(e.clone());
                Err(e.into())
            }
        }
    }

    /// Load the dictionary and ONNX model from disk
    pub async fn load_files(&self, paths: ResourcePaths, runtime: RuntimeSettings) -> Result<()> {
        self.load(move || LoadedModel::from_files(&paths, &runtime)).await
    }

    fn ready_model(&self) -> Result<Arc<LoadedModel>> {
        match &*self.state.read() {
            LoadState::Ready(model) => Ok(Arc::clone(model)),
            LoadState::Failed(e) => Err(e.clone().into()),
            other => Err(RecognizerError::NotReady(other.status())),
        }
    }

    /// Recognize the text drawn in `image`
    pub fn recognize(&self, image: &DynamicImage) -> Result<RecognitionResult> {
        let model = self.ready_model()?;
        self.run(&model, image)
    }

    /// Recognize an encoded image (PNG, JPEG, ...)
    pub fn recognize_bytes(&self, bytes: &[u8]) -> Result<RecognitionResult> {
        let model = self.ready_model()?;
        let image = image::load_from_memory(bytes)
            .map_err(|e| RenderError::new(format!("failed to decode image: {e}")))?;
        self.run(&model, &image)
    }

    /// Recognize an image file
    pub fn recognize_file(&self, path: &Path) -> Result<RecognitionResult> {
        let model = self.ready_model()?;
        let image = image::open(path)
            .map_err(|e| RenderError::new(format!("failed to open {:?}: {e}", path)))?;
        self.run(&model, &image)
    }

    fn run(&self, model: &LoadedModel, image: &DynamicImage) -> Result<RecognitionResult> {
        let start = Instant::now();

        let tensor = normalize_for_recognition(image, &self.preprocess)?;
        let raw = model.backend.run(tensor)?;
        let scores = score_matrix(raw)?;

        let (timesteps, classes) = scores.dim();
        if classes != model.vocabulary.len() {
            warn!(
                "Model emits {} classes but vocabulary has {} symbols",
                classes,
                model.vocabulary.len()
            );
        }

        let decoded = greedy_decode(scores.view(), &model.vocabulary);
        let processing_time = start.elapsed();
        debug!(
            "Recognized {:?} over {} timesteps in {:?}",
            decoded.text, timesteps, processing_time
        );

        Ok(RecognitionResult {
            text: decoded.text,
            confidence: decoded.confidence,
            processing_time_ms: processing_time.as_millis() as u64,
        })
    }
}

/// Reduce a (1, T, V) output to its (T, V) score matrix
fn score_matrix(raw: ArrayD<f32>) -> std::result::Result<Array2<f32>, InferenceError> {
    let shape = raw.shape().to_vec();
    let raw = raw.into_dimensionality::<Ix3>().map_err(|_| {
        InferenceError::new(format!("expected (1, T, V) scores, got shape {:?}", shape))
    })?;
    if raw.len_of(Axis(0)) != 1 {
        return Err(InferenceError::new(format!(
            "expected batch size 1, got shape {:?}",
            shape
        )));
    }
    Ok(raw.index_axis_move(Axis(0), 0))
}
