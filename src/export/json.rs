//! JSON exports: the flat title/value list and the full audit records.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::extract::MetricResult;

#[derive(Serialize)]
struct TitleValue<'a> {
    title: &'a str,
    value: Option<f64>,
}

fn write_pretty<T: Serialize + ?Sized>(data: &T, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(data).context("Failed to serialize results to JSON")?;

    let mut file = File::create(output_path)
        .with_context(|| format!("Failed to create JSON file: {}", output_path.display()))?;

    file.write_all(json.as_bytes())
        .context("Failed to write JSON data")?;

    Ok(())
}

/// Writes `[{ "title", "value" }]`, with `null` for missing values.
pub fn write_results(results: &[MetricResult], output_path: &Path) -> Result<()> {
    let rows: Vec<TitleValue> = results
        .iter()
        .map(|r| TitleValue {
            title: &r.title,
            value: r.value,
        })
        .collect();
    write_pretty(&rows, output_path)
}

/// Writes every record including candidates and rationale.
pub fn write_metrics(results: &[MetricResult], output_path: &Path) -> Result<()> {
    write_pretty(results, output_path)
}
