use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Where a screenshot comes from
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// HTTP(S) URL; a 200 response with the image body is expected
    Url(String),
    /// Image file on disk
    File(PathBuf),
    /// Already-downloaded bytes
    Bytes(Vec<u8>),
}

impl ImageSource {
    /// Classify a CLI-style argument as URL or file path
    pub fn from_arg(arg: &str) -> Self {
        if arg.starts_with("http://") || arg.starts_with("https://") {
            ImageSource::Url(arg.to_string())
        } else {
            ImageSource::File(PathBuf::from(arg))
        }
    }

    /// Fetch the raw image bytes
    pub fn load_bytes(&self) -> Result<Vec<u8>> {
        match self {
            ImageSource::Bytes(bytes) => Ok(bytes.clone()),
            ImageSource::File(path) => std::fs::read(path)
                .with_context(|| format!("Failed to read {}", path.display())),
            ImageSource::Url(url) => fetch_url(url),
        }
    }
}

fn fetch_url(url: &str) -> Result<Vec<u8>> {
    let client = reqwest::blocking::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()?;

    let response = client
        .get(url)
        .header("User-Agent", "roster-scan")
        .send()
        .with_context(|| format!("Failed to fetch {}", url))?;

    if response.status() != reqwest::StatusCode::OK {
        return Err(anyhow!(
            "Fetching {} returned HTTP {}",
            url,
            response.status()
        ));
    }

    let bytes = response.bytes().context("Failed to read image body")?;
    debug!("Fetched {} bytes from {}", bytes.len(), url);
    Ok(bytes.to_vec())
}
