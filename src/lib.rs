pub mod commands;
pub mod config;
pub mod error;
pub mod pipeline;

pub use commands::{scan_batch, scan_screenshot, ScanRequest};
pub use config::{NameMatchConfig, ScanConfig};
pub use error::ScanError;
pub use pipeline::{
    Analysis, DebugResult, PersistRequest, PersistResult, ResolvedChampion, ScanMode, ScanOutcome,
    ScanPipeline,
};

/// Install the tracing subscriber; `RUST_LOG` overrides the default filter
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "roster_scan=debug,roster_scan_lib=debug,roster_vision=debug,roster_state=info".into()
            }),
        )
        .init();
}
