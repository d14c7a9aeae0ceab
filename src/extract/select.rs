//! Winner selection and the rationale attached to every result.

use serde::{Serialize, Serializer};
use std::fmt;

use super::candidates::{Candidate, CandidateGenerator};
use crate::ocr::Detection;

/// Why a result holds the value it does, or why it holds none.
#[derive(Debug, Clone, PartialEq)]
pub enum Rationale {
    /// The recognizer returned nothing, or the image could not be decoded.
    NoText,
    /// Detections were found but none contained a number.
    NoNumbers,
    Selected { score: f64, decimal: bool },
    /// Processing the item failed; the message is kept for the report.
    Failed(String),
}

impl fmt::Display for Rationale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rationale::NoText => write!(f, "No text detected by OCR"),
            Rationale::NoNumbers => write!(f, "No valid numbers found in text"),
            Rationale::Selected { score, decimal } => {
                write!(f, "Highest Score: {:.1} (Decimal: {})", score, decimal)
            }
            Rationale::Failed(message) => write!(f, "Error: {}", message),
        }
    }
}

impl Serialize for Rationale {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Outcome of scoring one image.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub value: Option<f64>,
    /// Candidates by score, highest first.
    pub ranked: Vec<Candidate>,
    pub rationale: Rationale,
}

impl Selection {
    pub fn no_text() -> Self {
        Self {
            value: None,
            ranked: Vec::new(),
            rationale: Rationale::NoText,
        }
    }

    /// The winning candidate, if any.
    pub fn winner(&self) -> Option<&Candidate> {
        self.value.and(self.ranked.first())
    }
}

/// Sorts candidates by descending score. The sort is stable, so ties keep
/// detection order and the first-seen candidate wins.
pub fn rank(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
}

/// Picks the highest-scoring candidate.
pub fn select(mut candidates: Vec<Candidate>) -> Selection {
    if candidates.is_empty() {
        return Selection {
            value: None,
            ranked: candidates,
            rationale: Rationale::NoNumbers,
        };
    }

    rank(&mut candidates);
    let best = &candidates[0];
    let rationale = Rationale::Selected {
        score: best.score,
        decimal: best.decimal,
    };

    Selection {
        value: Some(best.value),
        ranked: candidates,
        rationale,
    }
}

/// Runs candidate generation and selection over one image's detections.
pub fn evaluate(generator: &CandidateGenerator, detections: &[Detection]) -> Selection {
    if detections.is_empty() {
        return Selection::no_text();
    }
    select(generator.generate(detections))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(value: f64, score: f64) -> Candidate {
        Candidate {
            value,
            text: value.to_string(),
            score,
            area: 0.0,
            confidence: 0.0,
            decimal: false,
        }
    }

    fn rect(text: &str, confidence: f64, area: f64) -> Detection {
        Detection::from_rect(0.0, 0.0, area / 100.0, 100.0, text, confidence)
    }

    #[test]
    fn test_select_highest_score() {
        let selection = select(vec![
            candidate(1.0, 10.0),
            candidate(2.0, 30.0),
            candidate(3.0, 20.0),
        ]);
        assert_eq!(selection.value, Some(2.0));
        let order: Vec<f64> = selection.ranked.iter().map(|c| c.value).collect();
        assert_eq!(order, vec![2.0, 3.0, 1.0]);
    }

    #[test]
    fn test_ties_keep_first_seen() {
        let selection = select(vec![
            candidate(7.0, 5.0),
            candidate(8.0, 9.0),
            candidate(9.0, 9.0),
            candidate(10.0, 5.0),
        ]);
        assert_eq!(selection.value, Some(8.0));
        let order: Vec<f64> = selection.ranked.iter().map(|c| c.value).collect();
        assert_eq!(order, vec![8.0, 9.0, 7.0, 10.0]);
    }

    #[test]
    fn test_select_empty_means_no_numbers() {
        let selection = select(Vec::new());
        assert_eq!(selection.value, None);
        assert_eq!(selection.rationale, Rationale::NoNumbers);
        assert!(selection.winner().is_none());
    }

    #[test]
    fn test_evaluate_metric_beats_year() {
        let generator = CandidateGenerator::new().unwrap();
        let detections = vec![rect("42.7%", 0.95, 5000.0), rect("2024", 0.90, 8000.0)];

        let selection = evaluate(&generator, &detections);
        assert_eq!(selection.value, Some(42.7));
        assert_eq!(selection.ranked.len(), 2);
        assert_eq!(selection.winner().map(|c| c.text.as_str()), Some("42.7%"));

        let reason = selection.rationale.to_string();
        assert_eq!(reason, "Highest Score: 1525.5 (Decimal: true)");
    }

    #[test]
    fn test_evaluate_no_detections() {
        let generator = CandidateGenerator::new().unwrap();
        let selection = evaluate(&generator, &[]);
        assert_eq!(selection.value, None);
        assert_eq!(selection.rationale.to_string(), "No text detected by OCR");
    }

    #[test]
    fn test_evaluate_detections_without_numbers() {
        let generator = CandidateGenerator::new().unwrap();
        let selection = evaluate(&generator, &[rect("Throughput", 0.9, 4000.0)]);
        assert_eq!(selection.value, None);
        assert_eq!(selection.rationale.to_string(), "No valid numbers found in text");
    }

    #[test]
    fn test_rationale_serializes_as_text() {
        let json = serde_json::to_string(&Rationale::Failed("boom".into())).unwrap();
        assert_eq!(json, "\"Error: boom\"");
    }
}
