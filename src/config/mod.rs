//! Application Configuration
//!
//! Recognizer settings stored in TOML format.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Model and dictionary locations
    pub models: ModelSettings,
    /// ONNX Runtime session settings
    pub runtime: RuntimeSettings,
    /// Image normalization settings
    pub preprocess: PreprocessSettings,
    /// Answer checking settings
    pub practice: PracticeSettings,
}

/// Where to find the recognition model and its character dictionary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Recognition model path (defaults to `<data dir>/models/rec.onnx`)
    pub model_path: Option<PathBuf>,
    /// Character dictionary path (defaults to `<data dir>/models/dict.txt`)
    pub dictionary_path: Option<PathBuf>,
    /// Expected SHA-256 of the model file, hex encoded
    pub model_sha256: Option<String>,
}

/// ONNX Runtime session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Intra-op thread count
    pub intra_threads: usize,
    /// Graph optimization level (0 = disabled, 1-3)
    pub optimization_level: u8,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            intra_threads: 4,
            optimization_level: 3,
        }
    }
}

/// Resampling filter used when scaling the drawing to model height
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    Nearest,
    #[default]
    Triangle,
    CatmullRom,
    Lanczos3,
}

impl From<ResizeFilter> for image::imageops::FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => image::imageops::FilterType::Nearest,
            ResizeFilter::Triangle => image::imageops::FilterType::Triangle,
            ResizeFilter::CatmullRom => image::imageops::FilterType::CatmullRom,
            ResizeFilter::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

/// Image normalization settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessSettings {
    pub filter: ResizeFilter,
}

/// Answer checking settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PracticeSettings {
    /// Minimum similarity (0.0 - 1.0) for a wrong answer to count as close
    pub similarity_threshold: f64,
}

impl Default for PracticeSettings {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.5,
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {:?}", path))?;
    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {:?}", path))?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Load configuration from `path`, writing the defaults there first if it doesn't exist
pub fn load_or_create_config_at(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        return load_config(path);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {:?}", parent))?;
    }
    let config = AppConfig::default();
    save_config(&config, path).with_context(|| format!("Failed to write default config {:?}", path))?;
    Ok(config)
}
