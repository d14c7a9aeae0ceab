//! Per-item audit trail and the ordered result list of a run.
//!
//! Nothing here makes decisions; it only keeps what the report needs to
//! explain every chosen value.

use serde::Serialize;

use super::candidates::Candidate;
use super::select::{Rationale, Selection};
use crate::ocr::Detection;

/// Raw recognizer output as shown in the report (area lives on candidates).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OcrText {
    pub text: String,
    /// Confidence as a percentage (0-100).
    pub conf: f64,
}

/// Everything recorded while processing one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    /// Path of the pre-processed image, relative to the output directory.
    pub processed_image: Option<String>,
    pub ocr_text: Vec<OcrText>,
    /// Candidates ranked by score, highest first.
    pub candidates: Vec<Candidate>,
    pub selection_reason: Rationale,
}

impl Default for AuditRecord {
    fn default() -> Self {
        Self {
            processed_image: None,
            ocr_text: Vec::new(),
            candidates: Vec::new(),
            selection_reason: Rationale::NoText,
        }
    }
}

impl AuditRecord {
    pub fn record_processed_image(&mut self, relative_path: impl Into<String>) {
        self.processed_image = Some(relative_path.into());
    }

    pub fn record_detections(&mut self, detections: &[Detection]) {
        self.ocr_text = detections
            .iter()
            .map(|d| OcrText {
                text: d.text.clone(),
                conf: d.confidence * 100.0,
            })
            .collect();
    }

    /// Stores the ranked candidates and the rationale, returning the value.
    pub fn record_selection(&mut self, selection: Selection) -> Option<f64> {
        self.candidates = selection.ranked;
        self.selection_reason = selection.rationale;
        selection.value
    }

    /// Keeps whatever was recorded so far and notes the failure.
    pub fn record_failure(&mut self, error: &anyhow::Error) {
        self.selection_reason = Rationale::Failed(format!("{:#}", error));
    }
}

/// The unit of output: one per paired (title, image).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricResult {
    /// 1-based position in the document.
    pub id: usize,
    pub title: String,
    pub value: Option<f64>,
    pub image_file: String,
    pub debug_info: AuditRecord,
}

impl MetricResult {
    pub fn candidates(&self) -> &[Candidate] {
        &self.debug_info.candidates
    }

    pub fn rationale(&self) -> &Rationale {
        &self.debug_info.selection_reason
    }
}

/// Collects results from one run, possibly out of order, and hands them
/// back in document order.
#[derive(Debug, Default)]
pub struct AuditRecorder {
    results: Vec<MetricResult>,
}

impl AuditRecorder {
    pub fn record(&mut self, result: MetricResult) {
        self.results.push(result);
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Number of results that carry a value.
    pub fn with_values(&self) -> usize {
        self.results.iter().filter(|r| r.value.is_some()).count()
    }

    pub fn into_results(mut self) -> Vec<MetricResult> {
        self.results.sort_by_key(|r| r.id);
        self.results
    }
}
