use anyhow::{anyhow, Context};
use image::RgbaImage;
use roster_data::{ChampionClass, ChampionCorpus};
use roster_source::{HttpTextDetector, TextDetector};
use roster_state::{reconcile, ResolvedCell, RosterRecord, RosterStore, SkippedCell, UpsertOverrides};
use roster_vision::{
    encode_png, estimate_grid, normalize_detections, summarize, AmbiguityResolver,
    AttributeClassifier, ClassHueProfile, DebugRenderer, GridCell, GridConfig, GridEstimate,
    NameResolver,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::ScanConfig;
use crate::error::ScanError;

/// Where the results of a scan go
#[derive(Clone)]
pub enum ScanMode {
    /// Render an overlay and summary; nothing is written
    Debug,
    /// Upsert every resolved cell into the player's roster
    Persist(PersistRequest),
}

#[derive(Clone)]
pub struct PersistRequest {
    pub player_id: String,
    pub store: Arc<dyn RosterStore>,
    pub overrides: UpsertOverrides,
}

/// A resolved cell as reported to the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedChampion {
    pub row: usize,
    pub col: usize,
    pub champion_id: String,
    pub champion_name: String,
    pub stars: Option<u8>,
    pub class: Option<ChampionClass>,
    pub is_awakened: bool,
    pub is_ascended: bool,
    pub power_rating: Option<u32>,
}

impl ResolvedChampion {
    fn from_cell(cell: &GridCell) -> Option<Self> {
        Some(Self {
            row: cell.row,
            col: cell.col,
            champion_id: cell.champion_id.clone()?,
            champion_name: cell.champion_name.clone()?,
            stars: cell.stars,
            class: cell.class,
            is_awakened: cell.is_awakened,
            is_ascended: cell.is_ascended,
            power_rating: cell.power_rating,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DebugResult {
    #[serde(skip)]
    pub image_png: Option<Vec<u8>>,
    pub summary: String,
    pub resolved: Vec<ResolvedChampion>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PersistResult {
    pub resolved_count: usize,
    pub persisted_records: Vec<RosterRecord>,
    pub skipped: Vec<SkippedCell>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ScanOutcome {
    Debug(DebugResult),
    Persisted(PersistResult),
}

/// What the recognition stages made of one screenshot
pub struct Analysis {
    pub frame: RgbaImage,
    pub grid: GridEstimate,
    /// Raw OCR detections, before normalization
    pub detection_count: usize,
}

/// Screenshot → roster pipeline. Corpus, hue profile and detector are
/// injected once and shared by every scan.
pub struct ScanPipeline {
    detector: Arc<dyn TextDetector>,
    grid_config: GridConfig,
    resolver: NameResolver,
    ambiguity: AmbiguityResolver,
    classifier: AttributeClassifier,
    profile: Arc<ClassHueProfile>,
    renderer: DebugRenderer,
    render_debug_image: bool,
}

impl ScanPipeline {
    pub fn new(
        config: &ScanConfig,
        corpus: Arc<ChampionCorpus>,
        profile: Arc<ClassHueProfile>,
        detector: Arc<dyn TextDetector>,
    ) -> Self {
        Self {
            detector,
            grid_config: config.grid.clone(),
            resolver: NameResolver::new(corpus.clone(), config.names.min_score),
            ambiguity: AmbiguityResolver::new(corpus, config.ambiguous_groups.clone()),
            classifier: AttributeClassifier::new(
                profile.clone(),
                config.regions.clone(),
                config.thresholds.clone(),
            ),
            profile,
            renderer: DebugRenderer::default(),
            render_debug_image: config.render_debug_image,
        }
    }

    /// Load corpus and hue profile from `config.data_dir` and talk to the
    /// configured OCR endpoint
    pub fn from_config(config: &ScanConfig) -> anyhow::Result<Self> {
        let corpus = Arc::new(ChampionCorpus::load(&config.data_dir)?);
        let profile = Arc::new(
            ClassHueProfile::load(&config.templates_dir())
                .context("Failed to build class hue profile")?,
        );
        let endpoint = config
            .detector_endpoint
            .clone()
            .ok_or_else(|| anyhow!("No detector_endpoint configured"))?;
        let detector = HttpTextDetector::new(
            endpoint,
            Duration::from_secs(config.detector_timeout_secs),
        )?;
        Ok(Self::new(config, corpus, profile, Arc::new(detector)))
    }

    pub fn with_renderer(mut self, renderer: DebugRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    /// Run every recognition stage on one screenshot
    pub fn analyze(&self, bytes: &[u8]) -> Result<Analysis, ScanError> {
        let frame = image::load_from_memory(bytes)?.to_rgba8();

        let t0 = Instant::now();
        let detections = self.detector.detect(bytes).map_err(ScanError::Detection)?;
        let clusters = normalize_detections(&detections);
        debug!(
            "{} detections -> {} clusters in {:?}",
            detections.len(),
            clusters.len(),
            t0.elapsed()
        );

        let detection_count = detections.len();
        let mut grid = estimate_grid(&clusters, frame.width(), frame.height(), &self.grid_config);
        if grid.is_empty() {
            return Ok(Analysis {
                frame,
                grid,
                detection_count,
            });
        }

        let resolved = self.resolver.resolve_cells(grid.cells_mut());
        let switched = self
            .ambiguity
            .resolve_cells(&frame, &self.classifier, grid.cells_mut());
        for cell in grid.cells_mut() {
            self.classifier.classify_cell(&frame, cell);
        }

        info!(
            "Scanned {}x{}: {} cells, {} resolved, {} disambiguated in {:?}",
            frame.width(),
            frame.height(),
            grid.cell_count(),
            resolved,
            switched,
            t0.elapsed()
        );
        Ok(Analysis {
            frame,
            grid,
            detection_count,
        })
    }

    pub fn run(&self, bytes: &[u8], mode: &ScanMode) -> Result<ScanOutcome, ScanError> {
        if let ScanMode::Persist(req) = mode {
            if req.player_id.trim().is_empty() {
                return Err(ScanError::MissingPlayer);
            }
        }

        let Analysis {
            frame,
            grid,
            detection_count,
        } = self.analyze(bytes)?;

        if grid.is_empty() {
            // Text that is all numbers still leaves no name labels
            let (summary, err) = if detection_count == 0 {
                ("No text detected in the screenshot", ScanError::NoTextDetected)
            } else {
                (
                    "No champion labels detected in the screenshot",
                    ScanError::NoLabelsDetected,
                )
            };
            return match mode {
                ScanMode::Debug => Ok(ScanOutcome::Debug(DebugResult {
                    image_png: None,
                    summary: summary.to_string(),
                    resolved: Vec::new(),
                })),
                ScanMode::Persist(_) => Err(err),
            };
        }

        match mode {
            ScanMode::Debug => Ok(ScanOutcome::Debug(self.debug_result(&frame, &grid))),
            ScanMode::Persist(req) => Ok(ScanOutcome::Persisted(Self::persist(grid, req))),
        }
    }

    fn debug_result(&self, frame: &RgbaImage, grid: &GridEstimate) -> DebugResult {
        let image_png = if self.render_debug_image {
            let overlay = self.renderer.render(frame, grid, &self.profile);
            match encode_png(&overlay) {
                Ok(png) => Some(png),
                Err(e) => {
                    warn!("Debug overlay dropped: {:#}", e);
                    None
                }
            }
        } else {
            None
        };

        DebugResult {
            image_png,
            summary: summarize(grid.cells()),
            resolved: grid.cells().filter_map(ResolvedChampion::from_cell).collect(),
        }
    }

    fn persist(grid: GridEstimate, req: &PersistRequest) -> PersistResult {
        let mut skipped = Vec::new();
        let mut resolved = Vec::new();

        for cell in grid.into_cells() {
            match (cell.champion_id, cell.champion_name) {
                (Some(champion_id), Some(_)) => resolved.push(ResolvedCell {
                    row: cell.row,
                    col: cell.col,
                    text: cell.text,
                    champion_id,
                    stars: cell.stars,
                    is_awakened: cell.is_awakened,
                    is_ascended: cell.is_ascended,
                    power_rating: cell.power_rating,
                }),
                _ => {
                    // Interpolated empty slots are not worth reporting
                    if let Some(text) = cell.text {
                        skipped.push(SkippedCell {
                            row: cell.row,
                            col: cell.col,
                            reason: format!("no champion matched '{}'", text),
                            text: Some(text),
                        });
                    }
                }
            }
        }

        let report = reconcile(req.store.as_ref(), &req.player_id, &resolved, &req.overrides);
        skipped.extend(report.skipped);

        PersistResult {
            resolved_count: resolved.len(),
            persisted_records: report.persisted,
            skipped,
        }
    }
}
