//! Vision/OCR Layer
//!
//! Turns a drawing into text:
//! - `preprocess` scales and pads it into the fixed model input tensor
//! - `models` locates resources and runs the ONNX recognition model
//! - `decode` collapses the per-timestep scores with greedy CTC
//! - `ocr` ties the steps together behind a one-shot load lifecycle

pub mod decode;
pub mod models;
pub mod ocr;
pub mod preprocess;
pub mod vocabulary;

pub use decode::{greedy_decode, DecodedText};
pub use models::{InferenceBackend, ModelManager, ModelType, OnnxSession, ResourcePaths};
pub use ocr::{LoadedModel, RecognitionResult, Recognizer, RecognizerStatus};
pub use preprocess::{normalize_for_recognition, PreprocessConfig, REC_HEIGHT, REC_WIDTH};
pub use vocabulary::{Vocabulary, BLANK_INDEX};
