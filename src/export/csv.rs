//! CSV export of the flat title/value list.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::format_value;
use crate::extract::MetricResult;

const CSV_HEADER: &str = "title,value";

/// Quotes a field when it contains a delimiter, quote or line break.
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// One row per result. Missing values leave the second cell empty.
pub fn write_results(results: &[MetricResult], path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;
    let mut out = BufWriter::new(file);

    write!(out, "{}\r\n", CSV_HEADER).context("Failed to write CSV header")?;
    for result in results {
        let value = result.value.map(format_value).unwrap_or_default();
        write!(out, "{},{}\r\n", escape_field(&result.title), value)
            .context("Failed to write CSV row")?;
    }
    out.flush().context("Failed to write CSV file")?;
    Ok(())
}
