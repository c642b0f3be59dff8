//! kanji-ocr - handwritten kanji recognition
//!
//! Normalizes a drawing into a fixed 3x48x320 tensor, runs an ONNX
//! recognition model over it and greedy-CTC decodes the scores into text.
//! A drawing trainer compares that text against the expected character.

pub mod config;
pub mod error;
pub mod practice;
pub mod storage;
pub mod vision;

pub use error::{InferenceError, RecognizerError, RenderError, ResourceLoadError};
pub use practice::{grade, Grade};
pub use vision::{RecognitionResult, Recognizer, RecognizerStatus};
