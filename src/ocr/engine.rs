use anyhow::{anyhow, Context, Result};
use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Command;
use tempfile::NamedTempFile;

use super::setup::{find_tessdata_dir, find_tesseract_executable};
use crate::config::RecognizerConfig;

/// One raw text-recognition hit: a quadrilateral region, the recognized
/// text and a confidence in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Corner points as `[x, y]`, clockwise from top-left.
    pub region: [[f64; 2]; 4],
    pub text: String,
    pub confidence: f64,
}

impl Detection {
    pub fn new(region: [[f64; 2]; 4], text: impl Into<String>, confidence: f64) -> Self {
        Self {
            region,
            text: text.into(),
            confidence,
        }
    }

    /// Builds a detection from an axis-aligned box.
    pub fn from_rect(
        left: f64,
        top: f64,
        width: f64,
        height: f64,
        text: impl Into<String>,
        confidence: f64,
    ) -> Self {
        let right = left + width;
        let bottom = top + height;
        Self::new(
            [[left, top], [right, top], [right, bottom], [left, bottom]],
            text,
            confidence,
        )
    }

    /// Area of the axis-aligned bounding box around the region.
    pub fn area(&self) -> f64 {
        let (mut min_x, mut max_x) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_y, mut max_y) = (f64::INFINITY, f64::NEG_INFINITY);
        for [x, y] in self.region {
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }
        (max_x - min_x) * (max_y - min_y)
    }
}

/// A text-detection engine: `(image) -> Detection[]`.
///
/// Implementations are constructed once and shared by every worker, so they
/// must be safe to call from several threads at the same time.
pub trait Recognizer: Send + Sync {
    fn recognize(&self, img: &GrayImage) -> Result<Vec<Detection>>;
}

/// Runs the Tesseract CLI and reports one detection per recognized line.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    executable: PathBuf,
    tessdata: Option<PathBuf>,
    language: String,
    psm: u8,
}

impl TesseractRecognizer {
    /// Locates the Tesseract executable and tessdata directory.
    pub fn from_config(config: &RecognizerConfig) -> Result<Self> {
        let executable = find_tesseract_executable(config.tesseract_path.as_deref())?;
        let tessdata = find_tessdata_dir(&config.language);

        tracing::info!(
            executable = %executable.display(),
            tessdata = ?tessdata,
            language = %config.language,
            "Tesseract recognizer ready"
        );

        Ok(Self {
            executable,
            tessdata,
            language: config.language.clone(),
            psm: config.psm,
        })
    }
}

impl Recognizer for TesseractRecognizer {
    fn recognize(&self, img: &GrayImage) -> Result<Vec<Detection>> {
        // Save image to temporary file
        let temp_input = NamedTempFile::with_suffix(".png")?;
        img.save(temp_input.path())
            .context("Failed to write image for Tesseract")?;

        // Tesseract appends .tsv to the output base
        let temp_output = NamedTempFile::new()?;
        let output_base = temp_output.path().to_string_lossy().to_string();

        let mut command = Command::new(&self.executable);
        command.arg(temp_input.path()).arg(&output_base);
        if let Some(tessdata) = &self.tessdata {
            command.arg("--tessdata-dir").arg(tessdata);
        }
        let output = command
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg(self.psm.to_string())
            .arg("tsv")
            .output()
            .context("Failed to run Tesseract")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr));
        }

        let tsv_path = format!("{}.tsv", output_base);
        let tsv_content = std::fs::read_to_string(&tsv_path)
            .map_err(|e| anyhow!("Failed to read Tesseract output: {}", e))?;
        let _ = std::fs::remove_file(&tsv_path);

        Ok(parse_tsv_output(&tsv_content))
    }
}

/// Words of one TSV line, merged into a single detection.
struct LineAccumulator {
    key: (i32, i32, i32, i32),
    words: Vec<String>,
    conf_sum: f64,
    left: f64,
    top: f64,
    right: f64,
    bottom: f64,
}

impl LineAccumulator {
    fn new(key: (i32, i32, i32, i32)) -> Self {
        Self {
            key,
            words: Vec::new(),
            conf_sum: 0.0,
            left: f64::INFINITY,
            top: f64::INFINITY,
            right: f64::NEG_INFINITY,
            bottom: f64::NEG_INFINITY,
        }
    }

    fn push(&mut self, text: &str, conf: f64, left: f64, top: f64, width: f64, height: f64) {
        self.words.push(text.to_string());
        self.conf_sum += conf;
        self.left = self.left.min(left);
        self.top = self.top.min(top);
        self.right = self.right.max(left + width);
        self.bottom = self.bottom.max(top + height);
    }

    fn finish(self) -> Option<Detection> {
        if self.words.is_empty() {
            return None;
        }
        let confidence = self.conf_sum / self.words.len() as f64 / 100.0;
        Some(Detection::from_rect(
            self.left,
            self.top,
            self.right - self.left,
            self.bottom - self.top,
            self.words.join(" "),
            confidence,
        ))
    }
}

/// Parses Tesseract TSV output into line-level detections, in reading order.
///
/// Word rows (level 5) with text and a non-negative confidence are grouped by
/// (page, block, paragraph, line). Confidence is the mean word confidence
/// scaled to `[0, 1]`; the region is the union of the word boxes.
pub fn parse_tsv_output(tsv: &str) -> Vec<Detection> {
    let mut detections = Vec::new();
    let mut current: Option<LineAccumulator> = None;

    // Skip header
    for line in tsv.lines().skip(1) {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }

        // TSV fields: level, page_num, block_num, par_num, line_num, word_num,
        //             left, top, width, height, conf, text
        let int = |i: usize| fields[i].trim().parse::<i32>().unwrap_or(-1);
        let num = |i: usize| fields[i].trim().parse::<f64>().unwrap_or(-1.0);

        let text = fields[11].trim();
        let conf = num(10);
        if int(0) != 5 || text.is_empty() || conf < 0.0 {
            continue;
        }

        let key = (int(1), int(2), int(3), int(4));
        if current.as_ref().is_some_and(|acc| acc.key != key) {
            detections.extend(current.take().and_then(LineAccumulator::finish));
        }
        current
            .get_or_insert_with(|| LineAccumulator::new(key))
            .push(text, conf, num(6), num(7), num(8), num(9));
    }

    detections.extend(current.and_then(LineAccumulator::finish));
    detections
}
