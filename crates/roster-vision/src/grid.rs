use roster_data::ChampionClass;
use roster_source::PixelRect;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::normalize::TextCluster;

/// Row spacings below this many label heights are jitter, not rows
const MIN_ROW_SPACING: f64 = 1.5;

/// Tunables for grid inference. Distances are relative to measured text or cell size.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Champion portrait width / height
    pub icon_aspect: f64,
    /// Fraction of the column pitch covered by a cell (the rest is gutter)
    pub cell_fill: f64,
    /// Where the name label's center sits, as a fraction of cell height from the top
    pub label_anchor: f64,
    /// Row grouping tolerance before the cell height is known, in label heights
    pub initial_row_tolerance: f64,
    /// Row grouping tolerance once the cell height is known, in cell heights
    pub row_tolerance: f64,
    /// Cell width in label heights when neither pitch can be measured
    pub fallback_width_in_label_heights: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            icon_aspect: 0.75,
            cell_fill: 0.92,
            label_anchor: 0.72,
            initial_row_tolerance: 0.6,
            row_tolerance: 0.25,
            fallback_width_in_label_heights: 7.0,
        }
    }
}

/// One champion slot of the roster grid, filled in stage by stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    pub row: usize,
    pub col: usize,
    pub bounds: PixelRect,
    /// Label text read inside the cell, `None` for interpolated empty slots
    pub text: Option<String>,
    /// Resolved short name
    pub champion_name: Option<String>,
    pub champion_id: Option<String>,
    pub stars: Option<u8>,
    pub class: Option<ChampionClass>,
    pub is_awakened: bool,
    pub is_ascended: bool,
    pub power_rating: Option<u32>,
    /// Raw classifier measurements, for calibration only
    pub diagnostics: BTreeMap<String, f64>,
}

impl GridCell {
    pub fn new(row: usize, col: usize, bounds: PixelRect, text: Option<String>) -> Self {
        Self {
            row,
            col,
            bounds,
            text,
            champion_name: None,
            champion_id: None,
            stars: None,
            class: None,
            is_awakened: false,
            is_ascended: false,
            power_rating: None,
            diagnostics: BTreeMap::new(),
        }
    }

    pub fn note(&mut self, key: &str, value: f64) {
        self.diagnostics.insert(key.to_string(), value);
    }

    pub fn is_resolved(&self) -> bool {
        self.champion_name.is_some()
    }
}

/// Inferred grid layout
#[derive(Debug, Clone, Default)]
pub struct GridEstimate {
    pub rows: Vec<Vec<GridCell>>,
    /// Y of the first content row's cells; UI chrome above it is ignored
    pub top_boundary: Option<i32>,
    pub column_pitch: Option<f64>,
    pub row_pitch: Option<f64>,
}

impl GridEstimate {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn cells(&self) -> impl Iterator<Item = &GridCell> {
        self.rows.iter().flatten()
    }

    pub fn cells_mut(&mut self) -> impl Iterator<Item = &mut GridCell> {
        self.rows.iter_mut().flatten()
    }

    pub fn cell_count(&self) -> usize {
        self.rows.iter().map(|r| r.len()).sum()
    }

    pub fn into_cells(self) -> Vec<GridCell> {
        self.rows.into_iter().flatten().collect()
    }
}

/// Label clusters grouped into one visual row
#[derive(Debug, Clone)]
struct LabelRow<'a> {
    labels: Vec<&'a TextCluster>,
    center_y: f64,
}

impl<'a> LabelRow<'a> {
    fn new(first: &'a TextCluster) -> Self {
        Self {
            center_y: first.center().1,
            labels: vec![first],
        }
    }

    fn push(&mut self, label: &'a TextCluster) {
        self.labels.push(label);
        self.center_y =
            self.labels.iter().map(|l| l.center().1).sum::<f64>() / self.labels.len() as f64;
    }
}

/// Infer the grid of champion cells from normalized text clusters.
///
/// Labels are grouped into rows, rows into columns, and the cell size is
/// derived from the dominant row/column spacing and the portrait aspect ratio.
/// Empty slots inside a row are interpolated; the trailing row is never padded
/// past its last label. Zero labels produce an empty grid.
pub fn estimate_grid(
    clusters: &[TextCluster],
    image_width: u32,
    image_height: u32,
    config: &GridConfig,
) -> GridEstimate {
    let labels: Vec<&TextCluster> = clusters.iter().filter(|c| c.has_letter()).collect();
    let numerics: Vec<&TextCluster> = clusters.iter().filter(|c| c.is_numeric()).collect();

    if labels.is_empty() {
        debug!("No label clusters; empty grid");
        return GridEstimate::default();
    }

    let label_h = median(labels.iter().map(|l| l.bounds.height as f64).collect())
        .unwrap_or(1.0)
        .max(1.0);

    // 1. Rough rows, only to measure the row spacing
    let initial_rows = group_rows(&labels, config.initial_row_tolerance * label_h);
    let row_pitch = dominant_spacing(
        initial_rows
            .windows(2)
            .map(|w| w[1].center_y - w[0].center_y)
            .collect(),
        MIN_ROW_SPACING * label_h,
    );

    // 2. Column spacing from neighbouring labels inside each row
    let column_pitch = dominant_spacing(
        initial_rows
            .iter()
            .flat_map(|row| {
                let mut xs: Vec<f64> = row.labels.iter().map(|l| l.center().0).collect();
                xs.sort_by(f64::total_cmp);
                xs.windows(2).map(|w| w[1] - w[0]).collect::<Vec<_>>()
            })
            .collect(),
        label_h,
    );

    let (cell_w, cell_h) = match (column_pitch, row_pitch) {
        (Some(cp), _) => {
            let w = cp * config.cell_fill;
            (w, w / config.icon_aspect)
        }
        (None, Some(rp)) => {
            let h = rp * config.cell_fill;
            (h * config.icon_aspect, h)
        }
        (None, None) => {
            let w = label_h * config.fallback_width_in_label_heights;
            (w, w / config.icon_aspect)
        }
    };

    debug!(
        "Grid metrics: label_h={:.1} row_pitch={:?} column_pitch={:?} cell={:.1}x{:.1}",
        label_h, row_pitch, column_pitch, cell_w, cell_h
    );

    // 3. Final rows with a tolerance scaled to the cell height
    let est_cell_h = row_pitch.unwrap_or(cell_h);
    let rows = group_rows(&labels, config.row_tolerance * est_cell_h);

    // 4. Drop UI chrome. Walking up from the widest row, a row is content
    // while it sits one row pitch above the next and on the column lattice.
    let widest = rows.iter().map(|r| r.labels.len()).max().unwrap_or(0);
    let anchor = rows
        .iter()
        .position(|r| r.labels.len() == widest)
        .unwrap_or(0);
    let lattice_x0 = rows[anchor..]
        .iter()
        .flat_map(|r| r.labels.iter().map(|l| l.center().0))
        .fold(f64::INFINITY, f64::min);
    let on_column_lattice = |cx: f64| match column_pitch {
        Some(cp) => {
            let offset = (cx - lattice_x0) / cp;
            offset >= -config.row_tolerance
                && (offset - offset.round()).abs() <= config.row_tolerance
        }
        None => true,
    };

    let mut first_content = anchor;
    while first_content > 0 {
        let above = &rows[first_content - 1];
        let gap = rows[first_content].center_y - above.center_y;
        let on_row_lattice = (gap - est_cell_h).abs() <= config.row_tolerance * est_cell_h;
        if !(on_row_lattice && above.labels.iter().all(|l| on_column_lattice(l.center().0))) {
            break;
        }
        first_content -= 1;
    }
    for chrome in &rows[..first_content] {
        debug!(
            "Ignoring chrome row at y={:.0}: {:?}",
            chrome.center_y,
            chrome.labels.iter().map(|l| l.text.as_str()).collect::<Vec<_>>()
        );
    }
    let content_rows = &rows[first_content..];

    let top_boundary = content_rows
        .first()
        .map(|r| (r.center_y - config.label_anchor * cell_h).round() as i32);

    // 5. Column lattice
    let x0 = content_rows
        .iter()
        .flat_map(|r| r.labels.iter().map(|l| l.center().0))
        .fold(f64::INFINITY, f64::min);

    let column_of = |cx: f64| -> usize {
        match column_pitch {
            Some(cp) => ((cx - x0) / cp).round().max(0.0) as usize,
            None => 0,
        }
    };

    let max_detected_col = content_rows
        .iter()
        .flat_map(|r| r.labels.iter().map(|l| column_of(l.center().0)))
        .max()
        .unwrap_or(0);

    let fit_cols = match column_pitch {
        Some(cp) => {
            let room = image_width as f64 - cell_w / 2.0 - x0;
            if room < 0.0 {
                1
            } else {
                (room / cp).floor() as usize + 1
            }
        }
        None => 1,
    };
    let n_cols = fit_cols.max(max_detected_col + 1);

    // 6. Cells
    let mut grid_rows = Vec::with_capacity(content_rows.len());
    for (r, row) in content_rows.iter().enumerate() {
        let mut by_col: BTreeMap<usize, (f64, String)> = BTreeMap::new();
        let mut sorted = row.labels.clone();
        sorted.sort_by(|a, b| a.center().0.total_cmp(&b.center().0));
        for label in sorted {
            let cx = label.center().0;
            let col = column_of(cx);
            match by_col.get_mut(&col) {
                Some((_, text)) => {
                    text.push(' ');
                    text.push_str(&label.text);
                }
                None => {
                    by_col.insert(col, (cx, label.text.clone()));
                }
            }
        }

        // The last row, even a lone one, stops at its last label
        let row_len = if r + 1 == content_rows.len() {
            by_col.keys().next_back().map_or(0, |&c| c + 1).min(n_cols)
        } else {
            n_cols
        };

        let top = (row.center_y - config.label_anchor * cell_h).round() as i32;
        let cells: Vec<GridCell> = (0..row_len)
            .map(|c| {
                let (cx, text) = match by_col.get(&c) {
                    Some((cx, text)) => (*cx, Some(text.clone())),
                    None => (x0 + c as f64 * column_pitch.unwrap_or(cell_w), None),
                };
                let bounds = PixelRect::new(
                    (cx - cell_w / 2.0).round() as i32,
                    top,
                    cell_w.round() as u32,
                    cell_h.round() as u32,
                );
                GridCell::new(r, c, bounds, text)
            })
            .collect();
        grid_rows.push(cells);
    }

    let mut estimate = GridEstimate {
        rows: grid_rows,
        top_boundary,
        column_pitch,
        row_pitch,
    };

    // 7. Power ratings
    for num in numerics {
        let (nx, ny) = num.center();
        if top_boundary.is_some_and(|top| ny < top as f64) {
            continue;
        }
        if let Some(cell) = estimate
            .cells_mut()
            .find(|c| c.bounds.contains(nx, ny) && c.power_rating.is_none())
        {
            cell.power_rating = num.numeric_value();
        }
    }

    debug!(
        "Estimated grid: {} row(s), {} cell(s), top boundary {:?} (image {}x{})",
        estimate.rows.len(),
        estimate.cell_count(),
        estimate.top_boundary,
        image_width,
        image_height
    );
    estimate
}

/// Group labels into rows by vertical center proximity
fn group_rows<'a>(labels: &[&'a TextCluster], tolerance: f64) -> Vec<LabelRow<'a>> {
    let mut sorted: Vec<&TextCluster> = labels.to_vec();
    sorted.sort_by(|a, b| a.center().1.total_cmp(&b.center().1));

    let mut rows: Vec<LabelRow> = Vec::new();
    for label in sorted {
        match rows.last_mut() {
            Some(row) if (label.center().1 - row.center_y).abs() <= tolerance => row.push(label),
            _ => rows.push(LabelRow::new(label)),
        }
    }
    rows
}

/// The most common spacing among `gaps` (members within 5% of each other),
/// preferring the smaller spacing on ties. Gaps under `min_gap` are ignored.
fn dominant_spacing(mut gaps: Vec<f64>, min_gap: f64) -> Option<f64> {
    gaps.retain(|g| *g >= min_gap.max(1.0));
    if gaps.is_empty() {
        return None;
    }
    gaps.sort_by(f64::total_cmp);

    let mut best: Option<(usize, f64)> = None;
    for &candidate in &gaps {
        let members: Vec<f64> = gaps
            .iter()
            .copied()
            .filter(|g| (g - candidate).abs() <= candidate * 0.05)
            .collect();
        let mean = members.iter().sum::<f64>() / members.len() as f64;
        if best.map_or(true, |(count, _)| members.len() > count) {
            best = Some((members.len(), mean));
        }
    }
    best.map(|(_, mean)| mean)
}

fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    Some(values[values.len() / 2])
}
