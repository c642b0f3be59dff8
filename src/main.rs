//! kanji-ocr - recognize handwritten kanji drawings
//!
//! Loads the recognition model once, then recognizes each image given on
//! the command line, optionally grading it against an expected answer.

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use kanji_ocr::config::{self, AppConfig};
use kanji_ocr::vision::{ModelManager, ModelType, PreprocessConfig, ResourcePaths};
use kanji_ocr::{grade, storage, Grade, RecognitionResult, Recognizer, RecognizerError};

/// kanji-ocr - handwritten kanji recognition
#[derive(Parser, Debug)]
#[command(name = "kanji-ocr")]
#[command(about = "Recognize kanji drawings with an ONNX CTC recognition model")]
struct Args {
    /// Images to recognize
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Recognition model (ONNX)
    #[arg(long)]
    model: Option<PathBuf>,

    /// Character dictionary, one symbol per line
    #[arg(long)]
    dict: Option<PathBuf>,

    /// Expected answer to grade each image against
    #[arg(short, long)]
    expect: Option<String>,

    /// Configuration file (defaults to config.toml in the config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print results as JSON lines
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// One line of output
#[derive(Serialize)]
struct Report<'a> {
    image: &'a Path,
    #[serde(flatten)]
    result: &'a RecognitionResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    grade: Option<Grade>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = load_or_create_config(args.config.as_deref())?;
    if let Some(model) = args.model.clone() {
        config.models.model_path = Some(model);
    }
    if let Some(dict) = args.dict.clone() {
        config.models.dictionary_path = Some(dict);
    }

    let paths = match (&config.models.model_path, &config.models.dictionary_path) {
        (Some(model), Some(dictionary)) => ResourcePaths {
            model: model.clone(),
            dictionary: dictionary.clone(),
            model_sha256: config.models.model_sha256.clone(),
        },
        _ => {
            let manager = ModelManager::new()?;
            for model_type in [ModelType::Recognition, ModelType::Dictionary] {
                if !manager.is_model_available(model_type) {
                    warn!(
                        "{} not found, expected at {:?}",
                        model_type.display_name(),
                        manager.model_path(model_type)
                    );
                }
            }
            manager.resolve(&config.models)
        }
    };

    let recognizer = Recognizer::with_config(PreprocessConfig::from(&config.preprocess));

    let rt = Runtime::new().context("Failed to create tokio runtime")?;
    rt.block_on(recognizer.load_files(paths, config.runtime.clone()))
        .context("Failed to load recognition resources")?;

    let mut failures = 0usize;
    for image in &args.images {
        match recognizer.recognize_file(image) {
            Ok(result) => {
                let graded = args
                    .expect
                    .as_deref()
                    .map(|expected| grade(&result.text, expected, config.practice.similarity_threshold));
                print_report(image, &result, graded, args.json)?;
            }
            Err(e) if is_per_image_failure(&e) => {
                warn!("Skipping {:?}: {}", image, e);
                failures += 1;
            }
            Err(e) => return Err(e).with_context(|| format!("Recognition failed for {:?}", image)),
        }
    }

    if failures > 0 {
        error!("{} of {} images could not be recognized", failures, args.images.len());
        std::process::exit(1);
    }

    Ok(())
}

/// Errors that only affect the current image; the batch keeps going
fn is_per_image_failure(error: &RecognizerError) -> bool {
    matches!(error, RecognizerError::Render(_) | RecognizerError::Inference(_))
}

/// Load configuration from the given file, or from the default location,
/// writing the defaults there on first run
fn load_or_create_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        let config = config::load_config(path)?;
        info!("Loaded configuration from {:?}", path);
        return Ok(config);
    }

    if let Ok(config_dir) = storage::get_config_dir() {
        let config_path = config_dir.join("config.toml");
        let existed = config_path.exists();
        match config::load_or_create_config_at(&config_path) {
            Ok(config) if existed => {
                info!("Loaded configuration from {:?}", config_path);
                return Ok(config);
            }
            Ok(config) => {
                info!("Created default configuration at {:?}", config_path);
                return Ok(config);
            }
            Err(e) => warn!("Ignoring configuration {:?}: {:#}", config_path, e),
        }
    }

    info!("Using default configuration");
    Ok(AppConfig::default())
}

fn print_report(image: &Path, result: &RecognitionResult, grade: Option<Grade>, json: bool) -> Result<()> {
    if json {
        let report = Report { image, result, grade };
        println!("{}", serde_json::to_string(&report)?);
        return Ok(());
    }

    match grade {
        Some(g) if g.correct => println!("{}\t{}\tcorrect", image.display(), result.text),
        Some(g) if g.close => println!(
            "{}\t{}\tclose (expected {}, similarity {:.2})",
            image.display(),
            result.text,
            g.expected,
            g.similarity
        ),
        Some(g) => println!(
            "{}\t{}\twrong (expected {})",
            image.display(),
            result.text,
            g.expected
        ),
        None => println!(
            "{}\t{}\t{:.3}",
            image.display(),
            result.text,
            result.confidence
        ),
    }

    Ok(())
}
