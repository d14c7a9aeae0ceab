//! shot-metrics
//!
//! Pulls numeric metric values out of the screenshots embedded in a Word
//! report. Each screenshot is paired with the caption above it, read with a
//! text recognizer, and the most plausible number is chosen by a fixed
//! scoring heuristic. Results are written as JSON, CSV and an HTML report
//! that shows why every value was picked.

mod config;
mod document;
mod export;
mod extract;
mod ocr;
mod paths;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use config::{Backend, ExtractorConfig};
use document::{DocxDocument, TitleFilter};
use extract::{Extractor, ExtractorSettings, MetricResult};
use ocr::{HttpRecognizer, Recognizer, TesseractRecognizer};
use paths::OutputLayout;

#[derive(Parser, Debug)]
#[clap(name = "shot-metrics")]
#[clap(about = "Extract metric values from screenshots embedded in a .docx report")]
struct Args {
    /// Input .docx document
    #[clap(value_name = "DOCX")]
    input: PathBuf,

    /// Directory for extracted images, debug images and reports
    #[clap(long, short = 'o', value_name = "DIR", default_value = "extracted_data")]
    output_dir: PathBuf,

    /// Configuration file (defaults to config.json next to the executable)
    #[clap(long, short = 'c', value_name = "FILE", env = "SHOT_METRICS_CONFIG")]
    config: Option<PathBuf>,

    /// Worker threads for image processing
    #[clap(long, short = 'j')]
    workers: Option<usize>,

    /// Text recognition backend
    #[clap(long, value_enum)]
    backend: Option<Backend>,

    /// Detection service URL for the http backend
    #[clap(long, value_name = "URL")]
    endpoint: Option<String>,

    /// Log candidate scoring details
    #[clap(long, short = 'v')]
    verbose: bool,
}

impl Args {
    /// Command-line flags win over the configuration file.
    fn apply_overrides(&self, config: &mut ExtractorConfig) {
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(backend) = self.backend {
            config.recognizer.backend = backend;
        }
        if let Some(endpoint) = &self.endpoint {
            config.recognizer.endpoint = endpoint.clone();
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();
}

fn run<R: Recognizer>(
    recognizer: R,
    config: &ExtractorConfig,
    source: &DocxDocument,
    layout: OutputLayout,
) -> Result<Vec<MetricResult>> {
    let extractor = Extractor::new(recognizer, ExtractorSettings::from(config), layout)?;
    let results = extractor.process_document(source)?;
    export::export_all(&results, extractor.layout())?;
    Ok(results)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    if !args.input.is_file() {
        return Err(anyhow!("File not found: {}", args.input.display()));
    }

    let mut config = config::load_config(args.config.as_deref())?;
    args.apply_overrides(&mut config);

    let layout = OutputLayout::new(&args.output_dir);
    layout.ensure_directories().with_context(|| {
        format!("Failed to create output directory {}", layout.root().display())
    })?;

    let titles = TitleFilter::new(config.max_title_chars)?;
    let source = DocxDocument::open(&args.input, titles)?;

    tracing::info!(
        input = %args.input.display(),
        output = %layout.root().display(),
        backend = ?config.recognizer.backend,
        workers = config.workers,
        "Starting extraction"
    );
    let started = Instant::now();

    let results = match config.recognizer.backend {
        Backend::Tesseract => {
            let recognizer = TesseractRecognizer::from_config(&config.recognizer)?;
            run(recognizer, &config, &source, layout.clone())?
        }
        Backend::Http => {
            let recognizer = HttpRecognizer::new(
                config.recognizer.endpoint.clone(),
                Duration::from_secs(config.recognizer.timeout_secs),
            )?;
            run(recognizer, &config, &source, layout.clone())?
        }
    };

    tracing::info!(elapsed_ms = started.elapsed().as_millis() as u64, "Done");

    let with_values = results.iter().filter(|r| r.value.is_some()).count();
    println!("{} metrics, {} with values", results.len(), with_values);
    println!("Results: {}", layout.results_json().display());
    println!("CSV:     {}", layout.results_csv().display());
    println!("Metrics: {}", layout.metrics_json().display());
    println!("Report:  {}", layout.report_html().display());

    Ok(())
}
