use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static EXE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Subdirectory for images taken from the document.
pub const IMAGES_DIR: &str = "images";
/// Subdirectory for pre-processed images shown in the report.
pub const DEBUG_DIR: &str = "debug";

/// Returns the directory containing the executable.
pub fn get_exe_dir() -> &'static PathBuf {
    EXE_DIR.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

/// Where one run writes its files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/images/`
    pub fn images_dir(&self) -> PathBuf {
        self.root.join(IMAGES_DIR)
    }

    /// `<root>/debug/`
    pub fn debug_dir(&self) -> PathBuf {
        self.root.join(DEBUG_DIR)
    }

    pub fn results_json(&self) -> PathBuf {
        self.root.join("results.json")
    }

    pub fn results_csv(&self) -> PathBuf {
        self.root.join("results.csv")
    }

    pub fn metrics_json(&self) -> PathBuf {
        self.root.join("metrics.json")
    }

    pub fn report_html(&self) -> PathBuf {
        self.root.join("report.html")
    }

    /// Ensures all output directories exist. Call before extraction.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(self.images_dir())?;
        std::fs::create_dir_all(self.debug_dir())?;
        Ok(())
    }
}
