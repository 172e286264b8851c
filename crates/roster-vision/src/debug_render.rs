//! Calibration overlay: cell bounds, top boundary and labels drawn on a copy
//! of the screenshot. Never part of the production path.

use ab_glyph::FontVec;
use anyhow::{Context, Result};
use image::{Rgb, RgbImage, RgbaImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info};

use crate::color::{hsl_to_rgb, Hsl};
use crate::grid::{GridCell, GridEstimate};
use crate::hue_profile::ClassHueProfile;

const UNRESOLVED_COLOR: Rgb<u8> = Rgb([255, 64, 64]);
const UNDETERMINED_COLOR: Rgb<u8> = Rgb([160, 160, 160]);
const BOUNDARY_COLOR: Rgb<u8> = Rgb([255, 0, 255]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

pub struct DebugRenderer {
    font: Option<FontVec>,
    font_scale: f32,
    box_thickness: i32,
}

impl Default for DebugRenderer {
    fn default() -> Self {
        Self {
            font: None,
            font_scale: 16.0,
            box_thickness: 2,
        }
    }
}

impl DebugRenderer {
    pub fn with_font_path(font_path: &Path) -> Result<Self> {
        let data = std::fs::read(font_path)
            .with_context(|| format!("Failed to read font {}", font_path.display()))?;
        let font = FontVec::try_from_vec(data)
            .map_err(|_| anyhow::anyhow!("Failed to parse font {}", font_path.display()))?;
        Ok(Self {
            font: Some(font),
            ..Self::default()
        })
    }

    /// Try a few common system fonts; labels are skipped if none loads
    pub fn with_system_font() -> Self {
        let font_paths = [
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
            "/System/Library/Fonts/Supplemental/Arial.ttf",
            "C:\\Windows\\Fonts\\arial.ttf",
        ];
        for path in font_paths {
            if let Ok(renderer) = Self::with_font_path(Path::new(path)) {
                info!("Debug overlay font: {}", path);
                return renderer;
            }
        }
        debug!("No system font found, overlay labels will be skipped");
        Self::default()
    }

    /// Draw the grid onto a copy of the frame
    pub fn render(
        &self,
        frame: &RgbaImage,
        grid: &GridEstimate,
        profile: &ClassHueProfile,
    ) -> RgbImage {
        let mut canvas = image::DynamicImage::ImageRgba8(frame.clone()).to_rgb8();
        let width = canvas.width() as f32;

        if let Some(top) = grid.top_boundary {
            draw_line_segment_mut(&mut canvas, (0.0, top as f32), (width, top as f32), BOUNDARY_COLOR);
        }

        for cell in grid.cells() {
            let color = cell_color(cell, profile);
            for t in 0..self.box_thickness {
                let w = cell.bounds.width as i32 + 2 * t;
                let h = cell.bounds.height as i32 + 2 * t;
                if w <= 0 || h <= 0 {
                    continue;
                }
                let rect = Rect::at(cell.bounds.x - t, cell.bounds.y - t).of_size(w as u32, h as u32);
                draw_hollow_rect_mut(&mut canvas, rect, color);
            }

            if let Some(font) = &self.font {
                draw_text_mut(
                    &mut canvas,
                    TEXT_COLOR,
                    cell.bounds.x + 4,
                    cell.bounds.y + 4,
                    self.font_scale,
                    font,
                    &cell_label(cell),
                );
            }
        }

        canvas
    }
}

fn cell_color(cell: &GridCell, profile: &ClassHueProfile) -> Rgb<u8> {
    if !cell.is_resolved() {
        return UNRESOLVED_COLOR;
    }
    match cell.class.and_then(|c| profile.reference_hue(c)) {
        Some(h) => Rgb(hsl_to_rgb(Hsl { h, s: 0.9, l: 0.55 })),
        None => UNDETERMINED_COLOR,
    }
}

/// Short on-image label for a cell
fn cell_label(cell: &GridCell) -> String {
    match &cell.champion_name {
        Some(name) => format!("{} {}", name, stars_label(cell.stars)),
        None => match &cell.text {
            Some(text) => format!("? {}", text),
            None => "-".to_string(),
        },
    }
}

fn stars_label(stars: Option<u8>) -> String {
    match stars {
        Some(s) => format!("{}★", s),
        None => "?★".to_string(),
    }
}

/// Human-readable listing of every resolved cell, in grid order
pub fn summarize<'a>(cells: impl IntoIterator<Item = &'a GridCell>) -> String {
    let lines: Vec<String> = cells
        .into_iter()
        .filter_map(|cell| {
            let name = cell.champion_name.as_ref()?;
            let mut line = format!("[{},{}] {} {}", cell.row, cell.col, name, stars_label(cell.stars));
            if cell.is_awakened {
                line.push_str(" (awakened)");
            }
            if cell.is_ascended {
                line.push_str(" (ascended)");
            }
            if let Some(power) = cell.power_rating {
                line.push_str(&format!(" PI {}", power));
            }
            Some(line)
        })
        .collect();

    if lines.is_empty() {
        return "No champions recognized".to_string();
    }
    format!("Recognized {} champion(s):\n{}", lines.len(), lines.join("\n"))
}

/// PNG-encode an overlay
pub fn encode_png(img: &RgbImage) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png)
        .context("Failed to encode debug overlay")?;
    Ok(buf.into_inner())
}
