//! Visual verification report: one card per metric with the original and
//! processed images, the selection rationale and the top candidates.

use anyhow::{Context, Result};
use chrono::Local;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use super::format_value;
use crate::extract::MetricResult;
use crate::paths::IMAGES_DIR;

/// Candidates listed per card.
const TOP_CANDIDATES: usize = 5;

const STYLE: &str = r#"
        body { font-family: sans-serif; background: #f4f6f8; padding: 20px; }
        .card { background: white; padding: 20px; margin-bottom: 20px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }
        .header { display: flex; justify-content: space-between; align-items: center; border-bottom: 1px solid #eee; padding-bottom: 10px; margin-bottom: 15px; }
        .value-box { font-size: 24px; font-weight: bold; padding: 5px 15px; border-radius: 4px; }
        .success { background: #d4edda; color: #155724; }
        .failure { background: #f8d7da; color: #721c24; }
        .grid { display: grid; grid-template-columns: 1fr 1fr; gap: 20px; }
        .img-container { text-align: center; border: 1px solid #eee; padding: 10px; border-radius: 4px; }
        img { max-width: 100%; height: auto; }
        .debug-section { margin-top: 15px; background: #f8f9fa; padding: 15px; border-radius: 4px; font-size: 13px; }
        .candidates { margin-top: 5px; border: 1px solid #ddd; background: white; }
        .candidate { display: flex; justify-content: space-between; padding: 5px; border-bottom: 1px solid #eee; }
        .candidate.selected { background: #e8f5e9; font-weight: bold; border-left: 3px solid #28a745; }
        .generated { color: #666; font-size: 12px; }
"#;

/// Escapes text for use in element content and quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn render_card(out: &mut String, result: &MetricResult) {
    let (value_display, status_class) = match result.value {
        Some(value) => (format_value(value), "success"),
        None => ("FAILED".to_string(), "failure"),
    };

    let _ = write!(
        out,
        r#"
    <div class="card">
        <div class="header">
            <h3>#{id} {title}</h3>
            <div class="value-box {status_class}">{value_display}</div>
        </div>
        <div class="grid">
            <div class="img-container">
                <strong>Original Image</strong><br>
                <img src="{images}/{image}">
            </div>
            <div class="img-container">
                <strong>Processed for OCR</strong><br>
"#,
        id = result.id,
        title = escape_html(&result.title),
        images = IMAGES_DIR,
        image = escape_html(&result.image_file),
    );

    match &result.debug_info.processed_image {
        Some(processed) => {
            let _ = writeln!(out, r#"                <img src="{}">"#, escape_html(processed));
        }
        None => out.push_str("                <em>Not saved</em>\n"),
    }

    let _ = write!(
        out,
        r#"            </div>
        </div>
        <div class="debug-section">
            <strong>Selection Reason:</strong> {reason}<br><br>
            <strong>Top {top} Candidates:</strong>
            <div class="candidates">
"#,
        reason = escape_html(&result.rationale().to_string()),
        top = TOP_CANDIDATES,
    );

    for (i, candidate) in result.candidates().iter().take(TOP_CANDIDATES).enumerate() {
        // Candidates are ranked, so the winner is always first
        let class = if i == 0 && result.value.is_some() {
            "candidate selected"
        } else {
            "candidate"
        };
        let _ = write!(
            out,
            r#"                <div class="{class}">
                    <span>Val: {value} (from "{text}")</span>
                    <span>Score: {score:.0} | Area: {area:.0}</span>
                </div>
"#,
            value = format_value(candidate.value),
            text = escape_html(&candidate.text),
            score = candidate.score,
            area = candidate.area,
        );
    }

    out.push_str(
        r#"            </div>
        </div>
    </div>
"#,
    );
}

/// Renders the whole report as a standalone page.
pub fn render_report(results: &[MetricResult]) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>Extraction Report</title>
    <style>{style}    </style>
</head>
<body>
    <h1>Extraction Report</h1>
    <p class="generated">Generated {generated} ({count} metrics)</p>
"#,
        style = STYLE,
        generated = Local::now().format("%Y-%m-%d %H:%M:%S"),
        count = results.len(),
    );

    for result in results {
        render_card(&mut html, result);
    }

    html.push_str("</body>\n</html>\n");
    html
}

/// Writes report.html. Image links are relative to the report's directory.
pub fn write_report(results: &[MetricResult], path: &Path) -> Result<()> {
    fs::write(path, render_report(results))
        .with_context(|| format!("Failed to write HTML report: {}", path.display()))
}
