use image::RgbaImage;
use serde::{Deserialize, Serialize};

pub mod detect;
pub mod source;

pub use detect::{HttpTextDetector, Point, RawDetection, ReplayDetector, TextDetector};
pub use source::ImageSource;

/// Region expressed as fractions (0.0-1.0) of an enclosing rectangle.
/// Used for sub-regions of a grid cell so sampling scales with resolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelativeRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl RelativeRect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Resolve this region against a rectangle in pixel space
    pub fn within(&self, outer: &PixelRect) -> PixelRect {
        let ow = outer.width as f64;
        let oh = outer.height as f64;
        PixelRect {
            x: outer.x + (self.x * ow).round() as i32,
            y: outer.y + (self.y * oh).round() as i32,
            width: (self.width * ow).round().max(0.0) as u32,
            height: (self.height * oh).round().max(0.0) as u32,
        }
    }
}

/// Axis-aligned rectangle in image pixels.
/// The origin may be negative when a cell is inferred partly off-screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }

    pub fn contains(&self, px: f64, py: f64) -> bool {
        px >= self.x as f64 && px < self.right() as f64 && py >= self.y as f64 && py < self.bottom() as f64
    }

    /// Smallest rectangle covering both
    pub fn union(&self, other: &PixelRect) -> PixelRect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        PixelRect {
            x,
            y,
            width: (right - x) as u32,
            height: (bottom - y) as u32,
        }
    }

    /// Whether the rectangle is non-empty and lies fully inside a `width`x`height` image
    pub fn fits_in(&self, width: u32, height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.x >= 0
            && self.y >= 0
            && self.right() <= width as i32
            && self.bottom() <= height as i32
    }
}

/// Crop a pixel region out of a frame.
/// Returns `None` for empty regions or regions that leave the frame;
/// callers treat that as "undetermined" rather than clamping.
pub fn crop_region(frame: &RgbaImage, region: &PixelRect) -> Option<RgbaImage> {
    if !region.fits_in(frame.width(), frame.height()) {
        return None;
    }
    Some(
        image::imageops::crop_imm(
            frame,
            region.x as u32,
            region.y as u32,
            region.width,
            region.height,
        )
        .to_image(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_rect_within() {
        let cell = PixelRect::new(100, 50, 200, 100);
        let strip = RelativeRect::new(0.1, 0.5, 0.8, 0.1).within(&cell);
        assert_eq!(strip, PixelRect::new(120, 100, 160, 10));
    }

    #[test]
    fn test_crop_region_in_bounds() {
        let frame = RgbaImage::from_fn(40, 30, |x, y| image::Rgba([x as u8, y as u8, 0, 255]));
        let crop = crop_region(&frame, &PixelRect::new(10, 5, 8, 4)).unwrap();
        assert_eq!(crop.dimensions(), (8, 4));
        assert_eq!(crop.get_pixel(0, 0)[0], 10);
        assert_eq!(crop.get_pixel(0, 0)[1], 5);
    }

    #[test]
    fn test_crop_region_out_of_bounds() {
        let frame = RgbaImage::new(40, 30);
        assert!(crop_region(&frame, &PixelRect::new(-1, 0, 5, 5)).is_none());
        assert!(crop_region(&frame, &PixelRect::new(36, 0, 5, 5)).is_none());
        assert!(crop_region(&frame, &PixelRect::new(0, 0, 0, 5)).is_none());
    }

    #[test]
    fn test_union_and_contains() {
        let a = PixelRect::new(0, 0, 10, 10);
        let b = PixelRect::new(20, 5, 10, 10);
        let u = a.union(&b);
        assert_eq!(u, PixelRect::new(0, 0, 30, 15));
        assert!(u.contains(15.0, 7.0));
        assert!(!u.contains(30.0, 7.0));
    }
}
