//! Configuration types for extraction.
//!
//! Loaded from config.json at startup, either from an explicit path or from
//! next to the executable. Every field has a default, so partial files work.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Fixed image transform applied before text detection.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Contrast enhancement factor (1.0 = unchanged)
    pub contrast: f32,
    /// Integer upscaling factor applied to both axes
    pub upscale: u32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            contrast: 2.5,
            upscale: 3,
        }
    }
}

/// Which text-detection engine to use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Local Tesseract CLI
    #[default]
    Tesseract,
    /// Remote detection service over HTTP
    Http,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    pub backend: Backend,
    /// Explicit Tesseract executable; searched for when unset
    pub tesseract_path: Option<PathBuf>,
    /// Tesseract language pack
    pub language: String,
    /// Tesseract page segmentation mode
    pub psm: u8,
    /// Detection service URL for the HTTP backend
    pub endpoint: String,
    /// Request timeout for the HTTP backend (seconds)
    pub timeout_secs: u64,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Tesseract,
            tesseract_path: None,
            language: "eng".to_string(),
            // Sparse text: screenshots are not uniform text blocks
            psm: 11,
            endpoint: "http://127.0.0.1:8866/readtext".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Complete extraction configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub preprocess: PreprocessConfig,
    pub recognizer: RecognizerConfig,
    /// Worker threads for per-image processing (1 = sequential)
    pub workers: usize,
    /// Write the pre-processed images next to the report
    pub save_debug_images: bool,
    /// Image file extensions taken from the document (case-insensitive)
    pub image_extensions: Vec<String>,
    /// Paragraphs at or above this length are never titles
    pub max_title_chars: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            preprocess: PreprocessConfig::default(),
            recognizer: RecognizerConfig::default(),
            workers: 1,
            save_debug_images: true,
            image_extensions: vec!["png".to_string(), "jpg".to_string(), "jpeg".to_string()],
            max_title_chars: 100,
        }
    }
}

/// Default location: config.json next to the executable.
fn default_config_path() -> PathBuf {
    crate::paths::get_exe_dir().join("config.json")
}

fn parse_config(path: &Path) -> Result<ExtractorConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse config {}", path.display()))
}

/// Loads configuration.
///
/// An explicit path must exist and parse. Without one, config.json next to
/// the executable is tried and any problem with it falls back to defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<ExtractorConfig> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(anyhow!("Config file not found: {}", path.display()));
        }
        let config = parse_config(path)?;
        tracing::info!(path = %path.display(), "Config loaded");
        return Ok(config);
    }

    let path = default_config_path();
    tracing::debug!(path = %path.display(), "Looking for config");

    if !path.exists() {
        tracing::info!("config.json not found. Using default config.");
        return Ok(ExtractorConfig::default());
    }

    match parse_config(&path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "Config loaded");
            Ok(config)
        }
        Err(e) => {
            tracing::warn!("{:#}. Using defaults.", e);
            Ok(ExtractorConfig::default())
        }
    }
}
