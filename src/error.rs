use thiserror::Error;

/// Failures that end a scan. Per-cell problems never show up here;
/// they are reported as skipped cells instead.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("failed to load screenshot: {0:#}")]
    Source(anyhow::Error),

    #[error("text detection failed: {0:#}")]
    Detection(anyhow::Error),

    #[error("no text detected in the screenshot; please upload a clearer screenshot of the roster")]
    NoTextDetected,

    #[error("no champion labels detected in the screenshot; please upload a clearer screenshot of the roster")]
    NoLabelsDetected,

    #[error("a player id is required to save a roster")]
    MissingPlayer,

    #[error("screenshot could not be decoded")]
    Decode(#[from] image::ImageError),

    #[error("scan task failed: {0}")]
    Worker(String),
}
