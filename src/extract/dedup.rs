//! Content-hash deduplication of extracted images, in natural filename order.

use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// One unique embedded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageAsset {
    pub file_name: String,
    pub path: PathBuf,
    /// Hex-encoded SHA-256 of the file contents.
    pub hash: String,
    /// 0-based position after natural ordering and deduplication.
    pub position: usize,
}

/// A literal or digit run of a filename.
#[derive(Debug)]
enum Run<'a> {
    Text(String),
    Digits(&'a str),
}

/// Splits a name into alternating text and digit runs, always starting with
/// a (possibly empty) text run so that runs line up positionally.
fn split_runs(name: &str) -> Vec<Run<'_>> {
    let mut runs = Vec::new();
    let mut start = 0;
    let mut in_digits = false;

    for (i, c) in name.char_indices() {
        let digit = c.is_ascii_digit();
        if digit != in_digits {
            runs.push(make_run(&name[start..i], in_digits));
            start = i;
            in_digits = digit;
        }
    }
    runs.push(make_run(&name[start..], in_digits));
    runs
}

fn make_run(segment: &str, digits: bool) -> Run<'_> {
    if digits {
        Run::Digits(segment)
    } else {
        Run::Text(segment.to_lowercase())
    }
}

/// Compares digit runs by integer value without overflowing.
fn cmp_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Natural ordering: "image9" < "image10", case-insensitive on text runs.
///
/// Names equal under that rule fall back to plain byte order so the result
/// never depends on directory listing order.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let runs_a = split_runs(a);
    let runs_b = split_runs(b);

    for (x, y) in runs_a.iter().zip(runs_b.iter()) {
        let ord = match (x, y) {
            (Run::Text(x), Run::Text(y)) => x.cmp(y),
            (Run::Digits(x), Run::Digits(y)) => cmp_digits(x, y),
            // Unreachable with aligned runs; keep the order total anyway
            (Run::Text(_), Run::Digits(_)) => Ordering::Greater,
            (Run::Digits(_), Run::Text(_)) => Ordering::Less,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }

    runs_a.len().cmp(&runs_b.len()).then_with(|| a.cmp(b))
}

/// Hex-encoded SHA-256 of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Keeps files whose extension is in `extensions` (case-insensitive).
pub fn filter_images(paths: Vec<PathBuf>, extensions: &[String]) -> Vec<PathBuf> {
    paths
        .into_iter()
        .filter(|p| {
            p.extension()
                .map(|ext| ext.to_string_lossy().into_owned())
                .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext)))
        })
        .collect()
}

/// Sorts `paths` naturally by file name and keeps the first file for each
/// distinct content hash. An unreadable file aborts the whole call.
pub fn deduplicate(mut paths: Vec<PathBuf>) -> Result<Vec<ImageAsset>> {
    paths.sort_by(|a, b| natural_cmp(&file_name_of(a), &file_name_of(b)));

    let mut seen = HashSet::new();
    let mut unique = Vec::new();

    for path in paths {
        let bytes =
            fs::read(&path).with_context(|| format!("Failed to read image {}", path.display()))?;
        let hash = content_hash(&bytes);
        let file_name = file_name_of(&path);

        if !seen.insert(hash.clone()) {
            tracing::debug!(file = %file_name, hash = %hash, "Dropping duplicate image");
            continue;
        }

        unique.push(ImageAsset {
            file_name,
            path,
            hash,
            position: unique.len(),
        });
    }

    Ok(unique)
}
