use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

#[cfg(windows)]
const EXE_NAME: &str = "tesseract.exe";
#[cfg(not(windows))]
const EXE_NAME: &str = "tesseract";

/// Install locations checked when Tesseract is not on PATH.
const COMMON_PATHS: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR\tesseract.exe",
    r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
    "/usr/bin/tesseract",
    "/usr/local/bin/tesseract",
    "/opt/homebrew/bin/tesseract",
];

/// Returns the per-user directory for a private Tesseract install.
pub fn get_tesseract_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("shot-metrics")
        .join("tesseract")
}

fn runs_version(exe: &Path) -> bool {
    Command::new(exe)
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Finds the Tesseract executable.
///
/// Order: explicit override, the per-user install dir, PATH, then common
/// install locations.
pub fn find_tesseract_executable(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(anyhow!("Configured Tesseract not found: {}", path.display()));
    }

    let local_exe = get_tesseract_dir().join(EXE_NAME);
    if local_exe.exists() {
        return Ok(local_exe);
    }

    let on_path = PathBuf::from("tesseract");
    if runs_version(&on_path) {
        return Ok(on_path);
    }

    for path in COMMON_PATHS {
        let p = PathBuf::from(path);
        if p.exists() {
            return Ok(p);
        }
    }

    Err(anyhow!(
        "Tesseract not found. Install Tesseract-OCR, add it to PATH, or set \
         recognizer.tesseract_path in config.json"
    ))
}

/// Finds a tessdata directory holding `<language>.traineddata`.
///
/// Returns `None` when nothing explicit is found; Tesseract then uses its
/// compiled-in default.
pub fn find_tessdata_dir(language: &str) -> Option<PathBuf> {
    let traineddata = format!("{}.traineddata", language);

    let local_tessdata = get_tesseract_dir().join("tessdata");
    if local_tessdata.join(&traineddata).exists() {
        return Some(local_tessdata);
    }

    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        let p = PathBuf::from(&prefix);
        if p.join(&traineddata).exists() {
            return Some(p);
        }
        let p = p.join("tessdata");
        if p.join(&traineddata).exists() {
            return Some(p);
        }
    }

    None
}
