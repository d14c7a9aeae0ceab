//! Source documents: where titles and embedded images come from.

pub mod docx;
pub mod titles;

pub use docx::DocxDocument;
pub use titles::TitleFilter;

use anyhow::Result;
use std::path::{Path, PathBuf};

/// A document that yields ordered titles and embedded images.
pub trait DocumentSource {
    /// Caption-like paragraphs, in document order.
    fn titles(&self) -> Result<Vec<String>>;

    /// Writes every embedded image into `dest` and returns the written paths.
    fn extract_images(&self, dest: &Path) -> Result<Vec<PathBuf>>;
}
