use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::PixelRect;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// One text token reported by the OCR provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub text: String,
    #[serde(rename = "boundingPolygon", alias = "bounding_polygon")]
    pub polygon: [Point; 4],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl RawDetection {
    /// Convenience constructor for an axis-aligned detection
    pub fn from_rect(text: impl Into<String>, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            text: text.into(),
            polygon: [
                Point { x, y },
                Point { x: x + width, y },
                Point {
                    x: x + width,
                    y: y + height,
                },
                Point { x, y: y + height },
            ],
            confidence: None,
        }
    }

    /// Axis-aligned bounding box of the polygon
    pub fn bounds(&self) -> PixelRect {
        let min_x = self.polygon.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
        let max_x = self.polygon.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
        let min_y = self.polygon.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        let max_y = self.polygon.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);

        let x = min_x.floor() as i32;
        let y = min_y.floor() as i32;
        PixelRect {
            x,
            y,
            width: (max_x.ceil() as i32 - x).max(0) as u32,
            height: (max_y.ceil() as i32 - y).max(0) as u32,
        }
    }
}

/// Black-box OCR provider.
/// An empty list means "no text" and is distinct from an error.
pub trait TextDetector: Send + Sync {
    fn detect(&self, image_bytes: &[u8]) -> Result<Vec<RawDetection>>;
}

impl<F> TextDetector for F
where
    F: Fn(&[u8]) -> Result<Vec<RawDetection>> + Send + Sync,
{
    fn detect(&self, image_bytes: &[u8]) -> Result<Vec<RawDetection>> {
        self(image_bytes)
    }
}

/// Replays detections recorded earlier, ignoring the image bytes.
/// Used for calibration runs against saved provider output.
#[derive(Debug, Clone, Default)]
pub struct ReplayDetector {
    detections: Vec<RawDetection>,
}

impl ReplayDetector {
    pub fn new(detections: Vec<RawDetection>) -> Self {
        Self { detections }
    }

    /// Load a JSON array of detections
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let detections: Vec<RawDetection> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse detections in {}", path.display()))?;
        info!("Loaded {} recorded detections from {}", detections.len(), path.display());
        Ok(Self { detections })
    }
}

impl TextDetector for ReplayDetector {
    fn detect(&self, _image_bytes: &[u8]) -> Result<Vec<RawDetection>> {
        Ok(self.detections.clone())
    }
}

/// Client for an OCR endpoint that accepts raw image bytes via POST
/// and answers with a JSON array of detections.
pub struct HttpTextDetector {
    endpoint: String,
    client: reqwest::blocking::Client,
}

impl HttpTextDetector {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build OCR HTTP client")?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }
}

impl TextDetector for HttpTextDetector {
    fn detect(&self, image_bytes: &[u8]) -> Result<Vec<RawDetection>> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/octet-stream")
            .body(image_bytes.to_vec())
            .send()
            .with_context(|| format!("OCR request to {} failed", self.endpoint))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "OCR endpoint {} returned HTTP {}",
                self.endpoint,
                response.status()
            ));
        }

        let detections: Vec<RawDetection> = response
            .json()
            .context("Failed to decode OCR response")?;
        debug!("OCR returned {} detection(s)", detections.len());
        Ok(detections)
    }
}
