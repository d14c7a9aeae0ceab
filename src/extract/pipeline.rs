//! Extraction runner: document in, ordered metric results out.
//!
//! Each paired (title, image) runs pre-processing, detection, candidate
//! generation and selection once. Failures stay inside their own item.
//! With more than one worker, jobs are fanned out over a channel to scoped
//! threads that share the recognizer, and results are put back in order.

use anyhow::{anyhow, Context, Result};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::channel;
use std::sync::Mutex;
use std::thread;

use super::audit::{AuditRecord, AuditRecorder, MetricResult};
use super::candidates::CandidateGenerator;
use super::dedup::{deduplicate, filter_images, ImageAsset};
use super::pairing::{pair, MetricJob};
use super::select::{evaluate, Selection};
use crate::config::{ExtractorConfig, PreprocessConfig};
use crate::document::DocumentSource;
use crate::ocr::{preprocess_image, Recognizer};
use crate::paths::{OutputLayout, DEBUG_DIR};

/// Text of a panic payload, for the item's rationale.
fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

/// Knobs the extractor needs from the full configuration.
#[derive(Debug, Clone)]
pub struct ExtractorSettings {
    pub preprocess: PreprocessConfig,
    pub workers: usize,
    pub save_debug_images: bool,
    pub image_extensions: Vec<String>,
}

impl From<&ExtractorConfig> for ExtractorSettings {
    fn from(config: &ExtractorConfig) -> Self {
        Self {
            preprocess: config.preprocess,
            workers: config.workers,
            save_debug_images: config.save_debug_images,
            image_extensions: config.image_extensions.clone(),
        }
    }
}

/// Owns the recognizer for the lifetime of a run (or several).
pub struct Extractor<R> {
    recognizer: R,
    generator: CandidateGenerator,
    settings: ExtractorSettings,
    layout: OutputLayout,
}

impl<R: Recognizer> Extractor<R> {
    pub fn new(recognizer: R, settings: ExtractorSettings, layout: OutputLayout) -> Result<Self> {
        Ok(Self {
            recognizer,
            generator: CandidateGenerator::new()?,
            settings,
            layout,
        })
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Runs the whole document: titles, images, pairing, per-item scoring.
    ///
    /// Fails when the document cannot be read or parsed, or when an
    /// extracted image cannot be read.
    pub fn process_document(&self, source: &dyn DocumentSource) -> Result<Vec<MetricResult>> {
        self.layout.ensure_directories().with_context(|| {
            format!("Failed to create output directory {}", self.layout.root().display())
        })?;

        let titles = source
            .titles()
            .context("Failed to read titles from document")?;

        let extracted = source.extract_images(&self.layout.images_dir())?;
        let images = deduplicate(filter_images(extracted, &self.settings.image_extensions))?;

        tracing::info!(
            images = images.len(),
            titles = titles.len(),
            "Processing unique images"
        );

        Ok(self.process_jobs(pair(titles, images)))
    }

    /// Processes every job and returns results in job id order.
    pub fn process_jobs(&self, jobs: Vec<MetricJob>) -> Vec<MetricResult> {
        let workers = self.settings.workers.clamp(1, jobs.len().max(1));
        let recorder = if workers == 1 {
            let mut recorder = AuditRecorder::default();
            for job in &jobs {
                recorder.record(self.process_job(job));
            }
            recorder
        } else {
            self.process_parallel(jobs, workers)
        };

        if recorder.is_empty() {
            tracing::warn!("No title/image pairs to process");
        }
        tracing::info!(
            results = recorder.len(),
            with_values = recorder.with_values(),
            "Extraction finished"
        );

        recorder.into_results()
    }

    fn process_parallel(&self, jobs: Vec<MetricJob>, workers: usize) -> AuditRecorder {
        let (job_tx, job_rx) = channel::<MetricJob>();
        let (result_tx, result_rx) = channel::<MetricResult>();

        for job in jobs {
            // The receiver is alive until the scope below ends
            let _ = job_tx.send(job);
        }
        drop(job_tx);

        let job_rx = Mutex::new(job_rx);
        thread::scope(|scope| {
            for worker in 0..workers {
                let job_rx = &job_rx;
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    tracing::debug!(worker, "Worker started");
                    loop {
                        let next = match job_rx.lock() {
                            Ok(rx) => rx.recv(),
                            Err(_) => break,
                        };
                        let Ok(job) = next else {
                            break;
                        };
                        if result_tx.send(self.process_job(&job)).is_err() {
                            break;
                        }
                    }
                    tracing::debug!(worker, "Worker finished");
                });
            }
        });
        drop(result_tx);

        let mut recorder = AuditRecorder::default();
        for result in result_rx {
            recorder.record(result);
        }
        recorder
    }

    /// Processes one pair. Never fails: problems end up in the rationale.
    pub fn process_job(&self, job: &MetricJob) -> MetricResult {
        let (value, debug_info) = self.extract_value(&job.image);

        match value {
            Some(value) => tracing::info!("[{}] {} -> {}", job.id, job.title, value),
            None => tracing::warn!(
                "[{}] {} -> no value ({})",
                job.id,
                job.title,
                debug_info.selection_reason
            ),
        }

        MetricResult {
            id: job.id,
            title: job.title.clone(),
            value,
            image_file: job.image.file_name.clone(),
            debug_info,
        }
    }

    fn extract_value(&self, image: &ImageAsset) -> (Option<f64>, AuditRecord) {
        let mut record = AuditRecord::default();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.analyze(image, &mut record)))
            .unwrap_or_else(|payload| Err(anyhow!("panicked: {}", panic_message(&*payload))));
        match outcome {
            Ok(selection) => {
                if let Some(winner) = selection.winner() {
                    tracing::debug!(
                        image = %image.file_name,
                        text = %winner.text,
                        score = winner.score,
                        "Selected candidate"
                    );
                }
                let value = record.record_selection(selection);
                (value, record)
            }
            Err(e) => {
                tracing::warn!(image = %image.file_name, "Processing failed: {:#}", e);
                record.record_failure(&e);
                (None, record)
            }
        }
    }

    fn analyze(&self, image: &ImageAsset, record: &mut AuditRecord) -> Result<Selection> {
        let decoded = match image::open(&image.path) {
            Ok(img) => img,
            Err(e) => {
                tracing::warn!(image = %image.file_name, "Unreadable image: {}", e);
                return Ok(Selection::no_text());
            }
        };

        let processed = preprocess_image(&decoded, &self.settings.preprocess);

        if self.settings.save_debug_images {
            // Keyed on the full file name: image1.png and image1.jpeg may both exist
            let name = format!("{}_processed.png", image.file_name.replace('.', "_"));
            let path = self.layout.debug_dir().join(&name);
            processed
                .save(&path)
                .with_context(|| format!("Failed to save {}", path.display()))?;
            record.record_processed_image(format!("{}/{}", DEBUG_DIR, name));
        }

        let detections = self.recognizer.recognize(&processed)?;
        record.record_detections(&detections);

        Ok(evaluate(&self.generator, &detections))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::docx::write_docx;
    use crate::document::{DocxDocument, TitleFilter};
    use crate::extract::select::Rationale;
    use crate::ocr::Detection;
    use anyhow::anyhow;
    use image::{GrayImage, Luma, RgbImage, Rgb};
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::path::{Path, PathBuf};
    use tempfile::tempdir;

    /// Answers by image width so each fixture image gets its own detections.
    struct FixtureRecognizer {
        by_width: HashMap<u32, Result<Vec<Detection>, String>>,
    }

    impl Recognizer for FixtureRecognizer {
        fn recognize(&self, img: &GrayImage) -> Result<Vec<Detection>> {
            match self.by_width.get(&img.width()) {
                Some(Ok(detections)) => Ok(detections.clone()),
                Some(Err(message)) => Err(anyhow!(message.clone())),
                None => Ok(Vec::new()),
            }
        }
    }

    fn rect(text: &str, confidence: f64, area: f64) -> Detection {
        Detection::from_rect(0.0, 0.0, area / 100.0, 100.0, text, confidence)
    }

    fn png(width: u32, shade: u8) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, 4, Rgb([shade, shade, shade]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn settings(workers: usize) -> ExtractorSettings {
        ExtractorSettings {
            workers,
            ..ExtractorSettings::from(&ExtractorConfig::default())
        }
    }

    fn fixture() -> FixtureRecognizer {
        let mut by_width = HashMap::new();
        // Widths are multiplied by the default upscale factor of 3
        by_width.insert(
            30,
            Ok(vec![rect("42.7%", 0.95, 5000.0), rect("2024", 0.90, 8000.0)]),
        );
        by_width.insert(60, Ok(vec![rect("Throughput", 0.9, 4000.0)]));
        by_width.insert(90, Err("recognizer crashed".to_string()));
        by_width.insert(120, Ok(vec![rect("6 / 6.53 ms", 0.8, 2000.0)]));
        FixtureRecognizer { by_width }
    }

    fn job(id: usize, dir: &Path, width: u32) -> MetricJob {
        let file_name = format!("image{}.png", id);
        let path = dir.join(&file_name);
        std::fs::write(&path, png(width, 40 * id as u8)).unwrap();
        MetricJob {
            id,
            title: format!("Metric {}:", id),
            image: ImageAsset {
                file_name,
                path,
                hash: format!("h{}", id),
                position: id - 1,
            },
        }
    }

    #[test]
    fn test_process_job_selects_metric_over_year() {
        let dir = tempdir().unwrap();
        let layout = OutputLayout::new(dir.path().join("out"));
        layout.ensure_directories().unwrap();
        let extractor = Extractor::new(fixture(), settings(1), layout).unwrap();

        let result = extractor.process_job(&job(1, dir.path(), 10));
        assert_eq!(result.value, Some(42.7));
        assert_eq!(result.candidates().len(), 2);
        assert_eq!(result.candidates()[0].text, "42.7%");
        assert_eq!(result.rationale().to_string(), "Highest Score: 1525.5 (Decimal: true)");
        assert_eq!(result.debug_info.ocr_text.len(), 2);
        assert_eq!(
            result.debug_info.processed_image.as_deref(),
            Some("debug/image1_png_processed.png")
        );
        assert!(extractor.layout().debug_dir().join("image1_png_processed.png").exists());
    }

    #[test]
    fn test_failures_stay_inside_their_item() {
        let dir = tempdir().unwrap();
        let layout = OutputLayout::new(dir.path().join("out"));
        layout.ensure_directories().unwrap();
        let extractor = Extractor::new(fixture(), settings(1), layout).unwrap();

        let jobs = vec![
            job(1, dir.path(), 10),
            job(2, dir.path(), 20),
            job(3, dir.path(), 30),
            job(4, dir.path(), 40),
            job(5, dir.path(), 50),
        ];
        let results = extractor.process_jobs(jobs);

        assert_eq!(results.len(), 5);
        assert_eq!(results[0].value, Some(42.7));
        assert_eq!(results[1].rationale(), &Rationale::NoNumbers);
        assert_eq!(results[2].rationale().to_string(), "Error: recognizer crashed");
        assert_eq!(results[3].value, Some(6.53));
        assert_eq!(results[4].value, None);
        assert_eq!(results[4].rationale(), &Rationale::NoText);
    }

    #[test]
    fn test_unreadable_image_is_no_text() {
        let dir = tempdir().unwrap();
        let layout = OutputLayout::new(dir.path().join("out"));
        layout.ensure_directories().unwrap();
        let extractor = Extractor::new(fixture(), settings(1), layout).unwrap();

        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not an image").unwrap();
        let broken = MetricJob {
            id: 1,
            title: "Broken:".to_string(),
            image: ImageAsset {
                file_name: "broken.png".to_string(),
                path,
                hash: "x".to_string(),
                position: 0,
            },
        };

        let result = extractor.process_job(&broken);
        assert_eq!(result.value, None);
        assert_eq!(result.rationale().to_string(), "No text detected by OCR");
    }

    #[test]
    fn test_parallel_matches_sequential_order() {
        let dir = tempdir().unwrap();
        let make_jobs = || {
            (1..=4)
                .map(|i| job(i, dir.path(), 10 * i as u32))
                .collect::<Vec<_>>()
        };

        let sequential = {
            let layout = OutputLayout::new(dir.path().join("seq"));
            layout.ensure_directories().unwrap();
            Extractor::new(fixture(), settings(1), layout)
                .unwrap()
                .process_jobs(make_jobs())
        };
        let parallel = {
            let layout = OutputLayout::new(dir.path().join("par"));
            layout.ensure_directories().unwrap();
            Extractor::new(fixture(), settings(3), layout)
                .unwrap()
                .process_jobs(make_jobs())
        };

        let ids: Vec<usize> = parallel.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        let seq_values: Vec<Option<f64>> = sequential.iter().map(|r| r.value).collect();
        let par_values: Vec<Option<f64>> = parallel.iter().map(|r| r.value).collect();
        assert_eq!(seq_values, par_values);
    }

    #[test]
    fn test_process_document_end_to_end() {
        let dir = tempdir().unwrap();
        let one = png(10, 10);
        let two = png(20, 20);
        let four = png(40, 40);
        let docx = write_docx(
            dir.path(),
            &[
                "Quarterly review",
                "Page load:",
                "Error rate – Mar 2024",
                "Job duration:",
                "Cache hits:",
                "Unmatched title:",
            ],
            &[
                ("image10.png", four.as_slice()),
                ("image2.png", two.as_slice()),
                ("image1.png", one.as_slice()),
                // Same bytes as image1, dropped
                ("image3.png", one.as_slice()),
                ("image4.emf", b"vector".as_slice()),
            ],
        );

        let source = DocxDocument::open(&docx, TitleFilter::new(100).unwrap()).unwrap();
        let layout = OutputLayout::new(dir.path().join("out"));
        let extractor = Extractor::new(fixture(), settings(1), layout).unwrap();

        let results = extractor.process_document(&source).unwrap();

        // 5 titles, 3 unique images
        assert_eq!(results.len(), 3);
        let titles: Vec<&str> = results.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Page load:", "Error rate – Mar 2024", "Job duration:"]);
        let files: Vec<&str> = results.iter().map(|r| r.image_file.as_str()).collect();
        assert_eq!(files, vec!["image1.png", "image2.png", "image10.png"]);
        assert_eq!(results[0].value, Some(42.7));
        assert_eq!(results[1].value, None);
        assert_eq!(results[2].value, Some(6.53));
    }

    #[test]
    fn test_missing_extracted_image_is_fatal() {
        struct GhostSource;
        impl DocumentSource for GhostSource {
            fn titles(&self) -> Result<Vec<String>> {
                Ok(vec!["A:".to_string()])
            }
            fn extract_images(&self, dest: &Path) -> Result<Vec<PathBuf>> {
                Ok(vec![dest.join("image1.png")])
            }
        }

        let dir = tempdir().unwrap();
        let extractor = Extractor::new(
            fixture(),
            settings(1),
            OutputLayout::new(dir.path().join("out")),
        )
        .unwrap();
        assert!(extractor.process_document(&GhostSource).is_err());
    }

    #[test]
    fn test_malformed_document_xml_is_fatal() {
        use std::io::Write;
        use zip::write::SimpleFileOptions;

        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.docx");
        let mut writer = zip::ZipWriter::new(std::fs::File::create(&path).unwrap());
        let options = SimpleFileOptions::default();
        writer.start_file("word/document.xml", options).unwrap();
        writer
            .write_all(b"<w:document><w:body><w:p>Latency:")
            .unwrap();
        writer.start_file("word/media/image1.png", options).unwrap();
        writer.write_all(&png(10, 10)).unwrap();
        writer.finish().unwrap();

        let source = DocxDocument::open(&path, TitleFilter::new(100).unwrap()).unwrap();
        let extractor = Extractor::new(
            fixture(),
            settings(1),
            OutputLayout::new(dir.path().join("out")),
        )
        .unwrap();

        let err = extractor.process_document(&source).unwrap_err();
        assert!(format!("{:#}", err).contains("titles"));
    }

    #[test]
    fn test_same_stem_images_keep_separate_debug_files() {
        let dir = tempdir().unwrap();
        let layout = OutputLayout::new(dir.path().join("out"));
        layout.ensure_directories().unwrap();
        let extractor = Extractor::new(fixture(), settings(1), layout).unwrap();

        let png_path = dir.path().join("image1.png");
        std::fs::write(&png_path, png(10, 10)).unwrap();
        let jpeg_path = dir.path().join("image1.jpeg");
        RgbImage::from_pixel(20, 4, Rgb([90, 90, 90]))
            .save_with_format(&jpeg_path, image::ImageFormat::Jpeg)
            .unwrap();

        let asset = |id: usize, file_name: &str, path: PathBuf| MetricJob {
            id,
            title: format!("Metric {}:", id),
            image: ImageAsset {
                file_name: file_name.to_string(),
                path,
                hash: format!("h{}", id),
                position: id - 1,
            },
        };
        let results = extractor.process_jobs(vec![
            asset(1, "image1.png", png_path),
            asset(2, "image1.jpeg", jpeg_path),
        ]);

        let first = results[0].debug_info.processed_image.clone().unwrap();
        let second = results[1].debug_info.processed_image.clone().unwrap();
        assert_ne!(first, second);

        // The first card still shows its own 30 px wide processed image
        let debug = extractor.layout().debug_dir();
        assert_eq!(image::open(debug.join("image1_png_processed.png")).unwrap().width(), 30);
        assert_eq!(image::open(debug.join("image1_jpeg_processed.png")).unwrap().width(), 60);
    }

    #[test]
    fn test_recognizer_panic_stays_inside_item() {
        struct PanickingRecognizer;
        impl Recognizer for PanickingRecognizer {
            fn recognize(&self, img: &GrayImage) -> Result<Vec<Detection>> {
                if img.width() == 30 {
                    panic!("model exploded");
                }
                Ok(vec![rect("6.53 ms", 0.9, 2000.0)])
            }
        }

        let dir = tempdir().unwrap();
        let layout = OutputLayout::new(dir.path().join("out"));
        layout.ensure_directories().unwrap();
        let extractor = Extractor::new(PanickingRecognizer, settings(2), layout).unwrap();

        let results = extractor.process_jobs(vec![job(1, dir.path(), 10), job(2, dir.path(), 20)]);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].value, None);
        assert_eq!(
            results[0].rationale().to_string(),
            "Error: panicked: model exploded"
        );
        assert_eq!(results[1].value, Some(6.53));
    }

    #[test]
    fn test_debug_images_can_be_disabled() {
        let dir = tempdir().unwrap();
        let layout = OutputLayout::new(dir.path().join("out"));
        layout.ensure_directories().unwrap();
        let mut no_debug = settings(1);
        no_debug.save_debug_images = false;
        let extractor = Extractor::new(fixture(), no_debug, layout).unwrap();

        let result = extractor.process_job(&job(1, dir.path(), 10));
        assert_eq!(result.debug_info.processed_image, None);
        assert_eq!(result.value, Some(42.7));
    }

    #[test]
    fn test_grayscale_fixture_helper() {
        // The fixture keys on processed width: 10 px in, 30 px out
        let img = GrayImage::from_pixel(10, 2, Luma([0]));
        let processed = preprocess_image(
            &image::DynamicImage::ImageLuma8(img),
            &PreprocessConfig::default(),
        );
        assert_eq!(processed.width(), 30);
    }
}
