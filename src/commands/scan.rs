use roster_source::ImageSource;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::error::ScanError;
use crate::pipeline::{ScanMode, ScanOutcome, ScanPipeline};

/// One screenshot to scan and what to do with the result
#[derive(Clone)]
pub struct ScanRequest {
    pub source: ImageSource,
    pub mode: ScanMode,
}

/// Fetch the screenshot and run it through the pipeline
pub fn scan_screenshot(
    pipeline: &ScanPipeline,
    source: &ImageSource,
    mode: &ScanMode,
) -> Result<ScanOutcome, ScanError> {
    let bytes = source.load_bytes().map_err(ScanError::Source)?;
    pipeline.run(&bytes, mode)
}

/// Scan independent screenshots on the blocking pool, at most
/// `max_concurrent` at a time. Results come back in request order.
pub async fn scan_batch(
    pipeline: Arc<ScanPipeline>,
    requests: Vec<ScanRequest>,
    max_concurrent: usize,
) -> Vec<Result<ScanOutcome, ScanError>> {
    let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
    let total = requests.len();
    let mut handles = Vec::with_capacity(total);

    for request in requests {
        let permit = semaphore.clone().acquire_owned().await;
        let pipeline = pipeline.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            let _permit = permit.map_err(|e| ScanError::Worker(e.to_string()))?;
            scan_screenshot(&pipeline, &request.source, &request.mode)
        }));
    }

    let mut results = Vec::with_capacity(total);
    for handle in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => {
                warn!("Scan task failed: {}", e);
                Err(ScanError::Worker(e.to_string()))
            }
        };
        results.push(result);
    }

    let failed = results.iter().filter(|r| r.is_err()).count();
    info!("Batch of {} scans finished, {} failed", total, failed);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanConfig;
    use roster_data::{ChampionClass, ChampionCorpus, ChampionCorpusEntry};
    use roster_source::RawDetection;
    use roster_vision::ClassHueProfile;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn png() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(400, 300, image::Rgba([10, 10, 10, 255]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    fn pipeline(detector: impl roster_source::TextDetector + 'static) -> Arc<ScanPipeline> {
        let corpus = ChampionCorpus::from_entries(vec![ChampionCorpusEntry {
            id: "hulk".into(),
            name: "Hulk".into(),
            short_name: "Hulk".into(),
            class: ChampionClass::Science,
        }]);
        Arc::new(ScanPipeline::new(
            &ScanConfig::default(),
            Arc::new(corpus),
            Arc::new(ClassHueProfile::default()),
            Arc::new(detector),
        ))
    }

    fn hulk_label(_: &[u8]) -> anyhow::Result<Vec<RawDetection>> {
        Ok(vec![RawDetection::from_rect("Hulk", 60.0, 200.0, 80.0, 16.0)])
    }

    #[test]
    fn test_scan_screenshot_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.png");
        std::fs::write(&path, png()).unwrap();

        let outcome = scan_screenshot(&pipeline(hulk_label), &ImageSource::File(path), &ScanMode::Debug).unwrap();
        let ScanOutcome::Debug(debug) = outcome else {
            panic!("expected a debug outcome");
        };
        assert_eq!(debug.resolved.len(), 1);
        assert_eq!(debug.resolved[0].champion_id, "hulk");
    }

    #[test]
    fn test_missing_file_is_source_error() {
        let result = scan_screenshot(
            &pipeline(hulk_label),
            &ImageSource::File("/nonexistent/roster.png".into()),
            &ScanMode::Debug,
        );
        assert!(matches!(result, Err(ScanError::Source(_))));
    }

    #[tokio::test]
    async fn test_scan_batch_respects_bound_and_order() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let detector = {
            let active = active.clone();
            let peak = peak.clone();
            move |bytes: &[u8]| -> anyhow::Result<Vec<RawDetection>> {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(20));
                active.fetch_sub(1, Ordering::SeqCst);
                hulk_label(bytes)
            }
        };

        let good = ImageSource::Bytes(png());
        let bad = ImageSource::Bytes(b"garbage".to_vec());
        let requests = vec![
            ScanRequest { source: good.clone(), mode: ScanMode::Debug },
            ScanRequest { source: bad, mode: ScanMode::Debug },
            ScanRequest { source: good.clone(), mode: ScanMode::Debug },
            ScanRequest { source: good, mode: ScanMode::Debug },
        ];

        let results = scan_batch(pipeline(detector), requests, 2).await;
        assert_eq!(results.len(), 4);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(ScanError::Decode(_))));
        assert!(results[2].is_ok());
        assert!(results[3].is_ok());
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}
