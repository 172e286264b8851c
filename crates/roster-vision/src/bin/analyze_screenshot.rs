//! CLI tool to run a saved roster screenshot through the vision pipeline
//! using a recorded detector response.
//! Usage: cargo run -p roster-vision --features cli --bin analyze_screenshot -- \
//!        <screenshot.png> <detections.json> <data_dir> [output_dir]

use anyhow::{Context, Result};
use roster_data::ChampionCorpus;
use roster_source::{crop_region, ReplayDetector, TextDetector};
use roster_vision::{
    encode_png, estimate_grid, normalize_detections, summarize, AmbiguityResolver,
    AttributeClassifier, AttributeRegions, ClassHueProfile, ClassifierThresholds, DebugRenderer,
    GridConfig, NameResolver, DEFAULT_MIN_SCORE,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("roster_vision=debug")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 4 {
        eprintln!(
            "Usage: {} <screenshot.png> <detections.json> <data_dir> [output_dir]",
            args[0]
        );
        std::process::exit(1);
    }

    let input_path = PathBuf::from(&args[1]);
    let detections_path = PathBuf::from(&args[2]);
    let data_dir = PathBuf::from(&args[3]);
    let output_dir = args
        .get(4)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./debug_output"));
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    println!("Loading image: {}", input_path.display());
    let bytes = std::fs::read(&input_path)
        .with_context(|| format!("Failed to read {}", input_path.display()))?;
    let img = image::load_from_memory(&bytes)
        .context("Failed to decode screenshot")?
        .to_rgba8();
    println!("Image size: {}x{}", img.width(), img.height());

    let corpus = Arc::new(ChampionCorpus::load(&data_dir)?);
    let profile = Arc::new(ClassHueProfile::load(&data_dir.join("templates").join("classes"))?);

    println!("\n=== Text Detection ===");
    let detector = ReplayDetector::load(&detections_path)?;
    let detections = detector.detect(&bytes)?;
    let clusters = normalize_detections(&detections);
    println!("{} detections -> {} clusters", detections.len(), clusters.len());
    for c in &clusters {
        println!(
            "  '{}' at x={} y={} w={} h={}",
            c.text, c.bounds.x, c.bounds.y, c.bounds.width, c.bounds.height
        );
    }

    println!("\n=== Grid ===");
    let mut grid = estimate_grid(&clusters, img.width(), img.height(), &GridConfig::default());
    println!(
        "Rows: {}  cells: {}  top boundary: {:?}  pitch: {:?} x {:?}",
        grid.rows.len(),
        grid.cell_count(),
        grid.top_boundary,
        grid.column_pitch,
        grid.row_pitch
    );

    let resolver = NameResolver::new(corpus.clone(), DEFAULT_MIN_SCORE);
    let classifier =
        AttributeClassifier::new(profile.clone(), AttributeRegions::default(), ClassifierThresholds::default());
    let ambiguity = AmbiguityResolver::new(corpus, Vec::new());

    resolver.resolve_cells(grid.cells_mut());
    ambiguity.resolve_cells(&img, &classifier, grid.cells_mut());
    for cell in grid.cells_mut() {
        classifier.classify_cell(&img, cell);
    }

    for cell in grid.cells() {
        println!(
            "  ({},{}) text={:?} -> {:?} stars={:?} class={:?} diag={:?}",
            cell.row, cell.col, cell.text, cell.champion_id, cell.stars, cell.class, cell.diagnostics
        );
        if let Some(crop) = crop_region(&img, &cell.bounds) {
            let _ = crop.save(output_dir.join(format!("cell_{}_{}.png", cell.row, cell.col)));
        }
    }

    println!("\n=== Summary ===");
    println!("{}", summarize(grid.cells()));

    let overlay = DebugRenderer::with_system_font().render(&img, &grid, &profile);
    let overlay_path = output_dir.join("overlay.png");
    std::fs::write(&overlay_path, encode_png(&overlay)?)
        .with_context(|| format!("Failed to write {}", overlay_path.display()))?;

    println!("\nDebug images saved to: {}", output_dir.display());
    Ok(())
}
