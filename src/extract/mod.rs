//! Candidate extraction and selection engine.
//!
//! Turns one document into ordered, audited metric results: images are
//! deduplicated and paired with titles, every number the recognizer sees
//! becomes a scored candidate, and the best one is kept with its rationale.

pub mod audit;
pub mod candidates;
pub mod dedup;
pub mod pairing;
pub mod pipeline;
pub mod select;

pub use audit::MetricResult;
pub use candidates::Candidate;
pub use pipeline::{Extractor, ExtractorSettings};
pub use select::Rationale;
