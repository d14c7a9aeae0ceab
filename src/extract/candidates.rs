//! Candidate generation and scoring.
//!
//! Every unsigned decimal number found in a detection's text becomes one
//! [`Candidate`], scored by an additive heuristic that favours fractional
//! values in large, confident, unit-labelled text and penalises years and
//! out-of-range noise.

use anyhow::Result;
use regex::Regex;
use serde::Serialize;

use crate::ocr::Detection;

/// One or more digits, optionally followed by a decimal point and more digits.
const NUMBER_PATTERN: &str = r"[0-9]+(?:\.[0-9]+)?";

/// Unit markers that make a detection look like a labelled metric.
const UNIT_PATTERN: &str = r"(?i)ms|seconds?|%";

pub const DECIMAL_BONUS: f64 = 1000.0;
pub const AREA_DIVISOR: f64 = 10_000.0;
pub const CONFIDENCE_WEIGHT: f64 = 5.0;
pub const YEAR_PENALTY: f64 = 10_000.0;
pub const OUT_OF_RANGE_PENALTY: f64 = 1000.0;
pub const UNIT_BONUS: f64 = 50.0;

const YEAR_MIN: f64 = 2020.0;
const YEAR_MAX: f64 = 2030.0;
const MIN_PLAUSIBLE: f64 = 0.01;
const MAX_PLAUSIBLE: f64 = 10_000.0;

/// A numeric value parsed out of one detection, with its score inputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub value: f64,
    /// Full text of the source detection.
    pub text: String,
    pub score: f64,
    pub area: f64,
    /// Detection confidence as a percentage (0-100).
    #[serde(rename = "conf")]
    pub confidence: f64,
    /// The matched text had a fractional part ("6.53", not "6").
    pub decimal: bool,
}

/// Scores one candidate. All terms are additive.
pub fn score_candidate(
    value: f64,
    decimal: bool,
    area: f64,
    confidence_pct: f64,
    has_unit: bool,
) -> f64 {
    let mut score = 0.0;
    if decimal {
        score += DECIMAL_BONUS;
    }
    score += area / AREA_DIVISOR;
    score += confidence_pct * CONFIDENCE_WEIGHT;
    if (YEAR_MIN..=YEAR_MAX).contains(&value) {
        score -= YEAR_PENALTY;
    }
    if !(MIN_PLAUSIBLE..=MAX_PLAUSIBLE).contains(&value) {
        score -= OUT_OF_RANGE_PENALTY;
    }
    if has_unit {
        score += UNIT_BONUS;
    }
    score
}

/// Turns raw detections into scored candidates.
#[derive(Debug, Clone)]
pub struct CandidateGenerator {
    number: Regex,
    unit: Regex,
}

impl CandidateGenerator {
    pub fn new() -> Result<Self> {
        Ok(Self {
            number: Regex::new(NUMBER_PATTERN)?,
            unit: Regex::new(UNIT_PATTERN)?,
        })
    }

    /// Whether the text carries a unit marker.
    pub fn has_unit(&self, text: &str) -> bool {
        self.unit.is_match(text)
    }

    /// Returns candidates in detection order, and left-to-right within a
    /// detection. Substrings that fail to parse are skipped.
    pub fn generate(&self, detections: &[Detection]) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        for detection in detections {
            let area = detection.area();
            let confidence = detection.confidence * 100.0;
            let has_unit = self.has_unit(&detection.text);

            for m in self.number.find_iter(&detection.text) {
                let raw = m.as_str();
                let value = match raw.parse::<f64>() {
                    Ok(value) => value,
                    Err(e) => {
                        tracing::debug!(raw, error = %e, "Skipping unparsable number");
                        continue;
                    }
                };
                let decimal = raw.contains('.');
                let score = score_candidate(value, decimal, area, confidence, has_unit);

                tracing::debug!(
                    value,
                    score,
                    area,
                    confidence,
                    text = %detection.text,
                    "Scored candidate"
                );

                candidates.push(Candidate {
                    value,
                    text: detection.text.clone(),
                    score,
                    area,
                    confidence,
                    decimal,
                });
            }
        }

        candidates
    }
}
