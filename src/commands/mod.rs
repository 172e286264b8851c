mod scan;

pub use scan::{scan_batch, scan_screenshot, ScanRequest};
