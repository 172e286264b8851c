//! roster-scan CLI: read a champion roster screenshot and either save it to a
//! player's roster or write a calibration overlay.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use roster_scan_lib::{
    scan_batch, scan_screenshot, PersistRequest, ScanConfig, ScanMode, ScanOutcome, ScanPipeline,
    ScanRequest,
};
use roster_source::ImageSource;
use roster_state::{JsonFileRosterStore, RosterStore, UpsertOverrides};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "roster-scan")]
#[command(about = "Recognize champions in a roster screenshot and keep a player's roster up to date")]
#[command(version)]
struct Cli {
    /// Scan configuration (JSON). Missing file means defaults.
    #[arg(long, global = true, default_value = "roster-scan.json")]
    config: PathBuf,

    /// OCR endpoint, overriding the one in the config file.
    #[arg(long, global = true)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recognize screenshots and upsert the results into a roster file.
    Scan(ScanArgs),

    /// Recognize a screenshot and write an annotated overlay instead of saving.
    Debug(DebugArgs),
}

#[derive(Debug, Clone, Args)]
struct ScanArgs {
    /// Screenshot paths or URLs.
    #[arg(required = true)]
    screenshots: Vec<String>,

    /// Player whose roster is updated.
    #[arg(long)]
    player: String,

    /// Roster file (JSON), created if missing.
    #[arg(long, default_value = "roster.json")]
    store: PathBuf,

    /// Star tier for every champion on the screenshot (stats screens).
    #[arg(long)]
    stars: Option<u8>,

    /// Rank for every champion on the screenshot.
    #[arg(long)]
    rank: Option<u8>,

    /// Signature level for every champion on the screenshot.
    #[arg(long)]
    sig_level: Option<u32>,

    /// Screenshots processed at once.
    #[arg(long, default_value = "4")]
    jobs: usize,
}

#[derive(Debug, Clone, Args)]
struct DebugArgs {
    /// Screenshot path or URL.
    screenshot: String,

    /// Where to write the overlay PNG.
    #[arg(long, default_value = "overlay.png")]
    out: PathBuf,

    /// TrueType font for cell labels; system fonts are tried otherwise.
    #[arg(long)]
    font: Option<PathBuf>,
}

fn main() -> Result<()> {
    roster_scan_lib::init_tracing();
    let cli = Cli::parse();
    let mut config = ScanConfig::load(&cli.config)?;
    if let Some(endpoint) = cli.endpoint {
        config.detector_endpoint = Some(endpoint);
    }

    match cli.command {
        Commands::Scan(args) => run_scan(&config, args),
        Commands::Debug(args) => run_debug(&config, args),
    }
}

fn run_scan(config: &ScanConfig, args: ScanArgs) -> Result<()> {
    let pipeline = Arc::new(ScanPipeline::from_config(config)?);
    let store: Arc<dyn RosterStore> = Arc::new(JsonFileRosterStore::open(&args.store)?);
    let mode = ScanMode::Persist(PersistRequest {
        player_id: args.player.clone(),
        store: store.clone(),
        overrides: UpsertOverrides {
            stars: args.stars,
            rank: args.rank,
            sig_level: args.sig_level,
        },
    });

    let requests = args
        .screenshots
        .iter()
        .map(|s| ScanRequest {
            source: ImageSource::from_arg(s),
            mode: mode.clone(),
        })
        .collect();

    let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
    // The blocking HTTP client must not be dropped inside the runtime
    let results = runtime.block_on(scan_batch(pipeline.clone(), requests, args.jobs));
    drop(runtime);

    let mut failures = 0;
    for (screenshot, result) in args.screenshots.iter().zip(results) {
        match result {
            Ok(ScanOutcome::Persisted(report)) => {
                println!(
                    "{}: {} resolved, {} saved, {} skipped",
                    screenshot,
                    report.resolved_count,
                    report.persisted_records.len(),
                    report.skipped.len()
                );
                for skipped in &report.skipped {
                    println!("  skipped ({},{}): {}", skipped.row, skipped.col, skipped.reason);
                }
            }
            Ok(ScanOutcome::Debug(_)) => {}
            Err(e) => {
                failures += 1;
                eprintln!("{}: {}", screenshot, e);
            }
        }
    }

    println!(
        "Roster for {} now holds {} champions",
        args.player,
        store.records_for(&args.player).len()
    );
    if failures > 0 {
        anyhow::bail!("{} of {} screenshots failed", failures, args.screenshots.len());
    }
    Ok(())
}

fn run_debug(config: &ScanConfig, args: DebugArgs) -> Result<()> {
    let renderer = match &args.font {
        Some(path) => roster_vision::DebugRenderer::with_font_path(path)?,
        None => roster_vision::DebugRenderer::with_system_font(),
    };
    let pipeline = ScanPipeline::from_config(config)?.with_renderer(renderer);

    let outcome = scan_screenshot(&pipeline, &ImageSource::from_arg(&args.screenshot), &ScanMode::Debug)?;
    let ScanOutcome::Debug(result) = outcome else {
        anyhow::bail!("Debug scan returned a persisted outcome");
    };

    println!("{}", result.summary);
    if let Some(png) = &result.image_png {
        std::fs::write(&args.out, png)
            .with_context(|| format!("Failed to write {}", args.out.display()))?;
        println!("Overlay written to {}", args.out.display());
    }
    println!("{}", serde_json::to_string_pretty(&result.resolved)?);
    Ok(())
}
