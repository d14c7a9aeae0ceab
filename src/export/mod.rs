//! Writes the outputs of a run: flat data files, full records and the
//! visual verification report.

pub mod csv;
pub mod html;
pub mod json;

use anyhow::Result;

use crate::extract::MetricResult;
use crate::paths::OutputLayout;

/// Renders a metric value the same way in every output (`6.0`, `42.7`).
pub fn format_value(value: f64) -> String {
    format!("{:?}", value)
}

/// Writes results.json, results.csv, metrics.json and report.html.
pub fn export_all(results: &[MetricResult], layout: &OutputLayout) -> Result<()> {
    json::write_results(results, &layout.results_json())?;
    csv::write_results(results, &layout.results_csv())?;
    json::write_metrics(results, &layout.metrics_json())?;
    html::write_report(results, &layout.report_html())?;

    tracing::info!(
        results = results.len(),
        dir = %layout.root().display(),
        "Exported results"
    );
    Ok(())
}
