//! Recognizer backed by a remote text-detection service.
//!
//! The service receives a PNG body and answers with the EasyOCR
//! `readtext(detail=1)` shape: `[[[[x, y] x4], "text", confidence], ...]`.

use anyhow::{anyhow, Context, Result};
use image::{GrayImage, ImageFormat};
use serde::Deserialize;
use std::io::Cursor;
use std::time::Duration;

use super::engine::{Detection, Recognizer};

/// One `[region, text, confidence]` triple as sent by the service.
#[derive(Debug, Deserialize)]
struct RawDetection([[f64; 2]; 4], String, f64);

impl From<RawDetection> for Detection {
    fn from(raw: RawDetection) -> Self {
        Detection::new(raw.0, raw.1, raw.2)
    }
}

/// Parses a service response body into detections, keeping their order.
pub fn parse_detections(body: &str) -> Result<Vec<Detection>> {
    let raw: Vec<RawDetection> =
        serde_json::from_str(body).context("Malformed detection response")?;
    Ok(raw.into_iter().map(Detection::from).collect())
}

pub struct HttpRecognizer {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl HttpRecognizer {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        let endpoint = endpoint.into();

        tracing::info!(endpoint = %endpoint, "HTTP recognizer ready");

        Ok(Self { client, endpoint })
    }
}

impl Recognizer for HttpRecognizer {
    fn recognize(&self, img: &GrayImage) -> Result<Vec<Detection>> {
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .context("Failed to encode image")?;

        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "image/png")
            .header("User-Agent", "shot-metrics")
            .body(png)
            .send()
            .with_context(|| format!("Detection request to {} failed", self.endpoint))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Detection service returned HTTP {}",
                response.status()
            ));
        }

        parse_detections(&response.text()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_easyocr_shape() {
        let body = r#"[
            [[[10, 10], [110, 10], [110, 60], [10, 60]], "42.7%", 0.95],
            [[[0, 80.5], [80, 80.5], [80, 180.5], [0, 180.5]], "2024", 0.9]
        ]"#;

        let detections = parse_detections(body).unwrap();
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].text, "42.7%");
        assert_eq!(detections[0].area(), 5000.0);
        assert_eq!(detections[1].confidence, 0.9);
        assert_eq!(detections[1].area(), 8000.0);
    }

    #[test]
    fn test_parse_empty_response() {
        assert!(parse_detections("[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(parse_detections(r#"{"error": "model not loaded"}"#).is_err());
        assert!(parse_detections(r#"[[[[0, 0], [1, 0]], "x", 0.5]]"#).is_err());
    }
}
