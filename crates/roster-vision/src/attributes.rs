use image::RgbaImage;
use roster_data::ChampionClass;
use roster_source::{crop_region, PixelRect, RelativeRect};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::color::{average_color, luminance, mean_hue, rgb_to_hsl, Hsl};
use crate::grid::GridCell;
use crate::hue_profile::{qualifying_hues, ClassHueProfile, HueFilter};

/// Sub-regions of a cell sampled by the classifiers, relative to cell bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeRegions {
    pub star_strip: RelativeRect,
    pub class_icon: RelativeRect,
    pub ascension_badge: RelativeRect,
    pub awakened_gem: RelativeRect,
    /// Narrow crop used to tell apart champions sharing a short name
    pub disambiguation_region: RelativeRect,
}

impl Default for AttributeRegions {
    fn default() -> Self {
        Self {
            star_strip: RelativeRect::new(0.08, 0.02, 0.84, 0.06),
            class_icon: RelativeRect::new(0.03, 0.10, 0.20, 0.15),
            ascension_badge: RelativeRect::new(0.77, 0.10, 0.20, 0.15),
            awakened_gem: RelativeRect::new(0.40, 0.50, 0.20, 0.08),
            disambiguation_region: RelativeRect::new(0.06, 0.13, 0.14, 0.09),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierThresholds {
    /// Pixels at or below this saturation are ignored for class hue
    pub min_saturation: f64,
    /// Pixels at or below this lightness are ignored for class hue
    pub min_lightness: f64,
    pub min_class_pixels: usize,
    /// Max circular hue distance, in degrees, to accept a class
    pub max_class_distance: f64,
    /// Luminance (0-255) a star-strip column must exceed to count as lit
    pub star_brightness: f64,
    pub ascension_hue_min: f64,
    pub ascension_hue_max: f64,
    pub ascension_min_saturation: f64,
    pub ascension_min_lightness: f64,
    pub awakened_min_saturation: f64,
    pub awakened_min_lightness: f64,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            min_saturation: 0.15,
            min_lightness: 0.20,
            min_class_pixels: 10,
            max_class_distance: 30.0,
            star_brightness: 120.0,
            ascension_hue_min: 25.0,
            ascension_hue_max: 65.0,
            ascension_min_saturation: 0.20,
            ascension_min_lightness: 0.20,
            awakened_min_saturation: 0.35,
            awakened_min_lightness: 0.55,
        }
    }
}

impl ClassifierThresholds {
    fn hue_filter(&self) -> HueFilter {
        HueFilter {
            min_saturation: self.min_saturation,
            min_lightness: self.min_lightness,
        }
    }
}

/// Outcome of the class classifier, with its raw measurements
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassReading {
    pub class: Option<ChampionClass>,
    pub hue: Option<f64>,
    pub distance: Option<f64>,
    pub pixels: usize,
}

/// Classify the dominant hue of an icon crop against the class profile
pub fn classify_class(
    crop: &RgbaImage,
    profile: &ClassHueProfile,
    thresholds: &ClassifierThresholds,
) -> ClassReading {
    let hues = qualifying_hues(crop, thresholds.hue_filter());
    let pixels = hues.len();
    if pixels < thresholds.min_class_pixels {
        return ClassReading {
            class: None,
            hue: None,
            distance: None,
            pixels,
        };
    }

    let hue = mean_hue(&hues);
    let nearest = hue.and_then(|h| profile.nearest(h));
    let class = nearest
        .filter(|(_, d)| *d <= thresholds.max_class_distance)
        .map(|(c, _)| c);

    ClassReading {
        class,
        hue,
        distance: nearest.map(|(_, d)| d),
        pixels,
    }
}

/// Map the lit fraction of the star bar to a tier; intervals are half-open `(lo, hi]`
pub fn star_tier_for_ratio(ratio: f64) -> u8 {
    match ratio {
        r if r > 0.90 => 7,
        r if r > 0.75 => 6,
        r if r > 0.60 => 5,
        r if r > 0.45 => 4,
        r if r > 0.30 => 3,
        r if r > 0.15 => 2,
        _ => 1,
    }
}

/// Longest contiguous run of lit columns divided by the strip width.
/// Each column's brightness is its mean luminance over the strip's rows.
pub fn lit_width_ratio(strip: &RgbaImage, brightness: f64) -> Option<f64> {
    let (w, h) = strip.dimensions();
    if w == 0 || h == 0 {
        return None;
    }

    let mut longest = 0u32;
    let mut run = 0u32;
    for x in 0..w {
        let mean = (0..h).map(|y| luminance(strip.get_pixel(x, y))).sum::<f64>() / h as f64;
        if mean > brightness {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    Some(longest as f64 / w as f64)
}

/// Gold badge check on an averaged color
pub fn is_ascended_hsl(hsl: Hsl, thresholds: &ClassifierThresholds) -> bool {
    hsl.h >= thresholds.ascension_hue_min
        && hsl.h <= thresholds.ascension_hue_max
        && hsl.s > thresholds.ascension_min_saturation
        && hsl.l > thresholds.ascension_min_lightness
}

/// Lit awakened gem check on an averaged color
pub fn is_awakened_hsl(hsl: Hsl, thresholds: &ClassifierThresholds) -> bool {
    hsl.s > thresholds.awakened_min_saturation && hsl.l > thresholds.awakened_min_lightness
}

fn average_hsl(crop: &RgbaImage) -> Option<Hsl> {
    average_color(crop).map(|[r, g, b]| rgb_to_hsl(r, g, b))
}

/// Samples cell sub-regions to fill in star tier, class, ascension and awakened state
pub struct AttributeClassifier {
    profile: Arc<ClassHueProfile>,
    regions: AttributeRegions,
    thresholds: ClassifierThresholds,
}

impl AttributeClassifier {
    pub fn new(
        profile: Arc<ClassHueProfile>,
        regions: AttributeRegions,
        thresholds: ClassifierThresholds,
    ) -> Self {
        Self {
            profile,
            regions,
            thresholds,
        }
    }

    pub fn profile(&self) -> &ClassHueProfile {
        &self.profile
    }

    pub fn regions(&self) -> &AttributeRegions {
        &self.regions
    }

    /// Class reading for an arbitrary sub-region of a cell.
    /// Out-of-bounds regions read as undetermined.
    pub fn read_class(
        &self,
        frame: &RgbaImage,
        cell_bounds: &PixelRect,
        region: &RelativeRect,
    ) -> Option<ClassReading> {
        let crop = crop_region(frame, &region.within(cell_bounds))?;
        Some(classify_class(&crop, &self.profile, &self.thresholds))
    }

    /// Run all sub-classifiers on one cell. Each degrades independently.
    pub fn classify_cell(&self, frame: &RgbaImage, cell: &mut GridCell) {
        let bounds = cell.bounds;

        match crop_region(frame, &self.regions.star_strip.within(&bounds))
            .and_then(|strip| lit_width_ratio(&strip, self.thresholds.star_brightness))
        {
            Some(ratio) => {
                cell.stars = Some(star_tier_for_ratio(ratio));
                cell.note("star_ratio", ratio);
            }
            None => {
                cell.stars = None;
                debug!(
                    "Cell ({},{}): star strip out of bounds, tier undetermined",
                    cell.row, cell.col
                );
            }
        }

        match self.read_class(frame, &bounds, &self.regions.class_icon) {
            Some(reading) => {
                cell.class = reading.class;
                cell.note("class_pixels", reading.pixels as f64);
                if let Some(h) = reading.hue {
                    cell.note("class_hue", h);
                }
                if let Some(d) = reading.distance {
                    cell.note("class_distance", d);
                }
                if reading.class.is_none() {
                    debug!(
                        "Cell ({},{}): class undetermined ({} px, hue {:?}, distance {:?})",
                        cell.row, cell.col, reading.pixels, reading.hue, reading.distance
                    );
                }
            }
            None => {
                cell.class = None;
                debug!("Cell ({},{}): class icon out of bounds", cell.row, cell.col);
            }
        }

        match crop_region(frame, &self.regions.ascension_badge.within(&bounds))
            .and_then(|crop| average_hsl(&crop))
        {
            Some(hsl) => {
                cell.is_ascended = is_ascended_hsl(hsl, &self.thresholds);
                cell.note("ascension_hue", hsl.h);
                cell.note("ascension_saturation", hsl.s);
                cell.note("ascension_lightness", hsl.l);
            }
            None => {
                cell.is_ascended = false;
                debug!("Cell ({},{}): ascension badge out of bounds", cell.row, cell.col);
            }
        }

        match crop_region(frame, &self.regions.awakened_gem.within(&bounds))
            .and_then(|crop| average_hsl(&crop))
        {
            Some(hsl) => {
                cell.is_awakened = is_awakened_hsl(hsl, &self.thresholds);
                cell.note("gem_saturation", hsl.s);
                cell.note("gem_lightness", hsl.l);
            }
            None => {
                cell.is_awakened = false;
                debug!("Cell ({},{}): awakened gem out of bounds", cell.row, cell.col);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::hsl_to_rgb;

    fn fill(w: u32, h: u32, hsl: Hsl) -> RgbaImage {
        let [r, g, b] = hsl_to_rgb(hsl);
        RgbaImage::from_pixel(w, h, image::Rgba([r, g, b, 255]))
    }

    /// 100px strip with `lit` bright columns starting at x=5
    fn star_strip(lit: u32) -> RgbaImage {
        RgbaImage::from_fn(100, 6, |x, _| {
            if x >= 5 && x < 5 + lit {
                image::Rgba([250, 220, 120, 255])
            } else {
                image::Rgba([30, 30, 40, 255])
            }
        })
    }

    #[test]
    fn test_star_breakpoints_half_open() {
        assert_eq!(star_tier_for_ratio(0.80), 6);
        assert_eq!(star_tier_for_ratio(0.50), 4);
        assert_eq!(star_tier_for_ratio(0.90), 6);
        assert_eq!(star_tier_for_ratio(0.91), 7);
        assert_eq!(star_tier_for_ratio(0.75), 5);
        assert_eq!(star_tier_for_ratio(0.76), 6);
        assert_eq!(star_tier_for_ratio(0.15), 1);
        assert_eq!(star_tier_for_ratio(0.0), 1);
        assert_eq!(star_tier_for_ratio(1.0), 7);
    }

    #[test]
    fn test_lit_width_ratio_from_pixels() {
        let ratio = lit_width_ratio(&star_strip(80), 120.0).unwrap();
        assert!((ratio - 0.80).abs() < 1e-9);
        assert_eq!(star_tier_for_ratio(ratio), 6);

        let ratio = lit_width_ratio(&star_strip(50), 120.0).unwrap();
        assert_eq!(star_tier_for_ratio(ratio), 4);
    }

    #[test]
    fn test_lit_width_uses_longest_run() {
        let strip = RgbaImage::from_fn(100, 2, |x, _| {
            if (0..20).contains(&x) || (40..75).contains(&x) {
                image::Rgba([255, 255, 255, 255])
            } else {
                image::Rgba([0, 0, 0, 255])
            }
        });
        let ratio = lit_width_ratio(&strip, 120.0).unwrap();
        assert!((ratio - 0.35).abs() < 1e-9);
    }

    #[test]
    fn test_ascension_gold_vs_blue() {
        let t = ClassifierThresholds::default();
        assert!(is_ascended_hsl(Hsl { h: 45.0, s: 0.6, l: 0.5 }, &t));
        assert!(!is_ascended_hsl(Hsl { h: 220.0, s: 0.6, l: 0.5 }, &t));

        let gold = average_hsl(&fill(8, 8, Hsl { h: 45.0, s: 0.6, l: 0.5 })).unwrap();
        assert!(is_ascended_hsl(gold, &t));
        let blue = average_hsl(&fill(8, 8, Hsl { h: 220.0, s: 0.6, l: 0.5 })).unwrap();
        assert!(!is_ascended_hsl(blue, &t));
    }

    #[test]
    fn test_class_wraparound_match() {
        let profile = ClassHueProfile::from_hues([
            (ChampionClass::Skill, 350.0),
            (ChampionClass::Science, 120.0),
        ]);
        let crop = fill(8, 8, Hsl { h: 5.0, s: 0.8, l: 0.5 });
        let reading = classify_class(&crop, &profile, &ClassifierThresholds::default());
        assert_eq!(reading.class, Some(ChampionClass::Skill));
        let d = reading.distance.unwrap();
        assert!((d - 15.0).abs() < 1.5, "distance {}", d);
    }

    #[test]
    fn test_class_too_far_is_undetermined() {
        let profile = ClassHueProfile::from_hues([(ChampionClass::Science, 120.0)]);
        let crop = fill(8, 8, Hsl { h: 200.0, s: 0.8, l: 0.5 });
        let reading = classify_class(&crop, &profile, &ClassifierThresholds::default());
        assert_eq!(reading.class, None);
        assert!(reading.hue.is_some());
    }

    #[test]
    fn test_class_needs_enough_pixels() {
        let profile = ClassHueProfile::default();
        let crop = fill(3, 3, Hsl { h: 120.0, s: 0.8, l: 0.5 });
        let reading = classify_class(&crop, &profile, &ClassifierThresholds::default());
        assert_eq!(reading.pixels, 9);
        assert_eq!(reading.class, None);

        let grey = RgbaImage::from_pixel(20, 20, image::Rgba([90, 90, 90, 255]));
        assert_eq!(
            classify_class(&grey, &profile, &ClassifierThresholds::default()).class,
            None
        );
    }

    #[test]
    fn test_classify_cell_out_of_bounds_degrades() {
        let classifier = AttributeClassifier::new(
            Arc::new(ClassHueProfile::default()),
            AttributeRegions::default(),
            ClassifierThresholds::default(),
        );
        let frame = RgbaImage::from_pixel(50, 50, image::Rgba([200, 200, 200, 255]));
        let mut cell = GridCell::new(0, 0, PixelRect::new(-40, -40, 60, 80), Some("Hulk".into()));
        cell.stars = Some(3);
        classifier.classify_cell(&frame, &mut cell);
        assert_eq!(cell.stars, None);
        assert_eq!(cell.class, None);
        assert!(!cell.is_ascended);
    }

    #[test]
    fn test_classify_cell_reads_painted_regions() {
        let regions = AttributeRegions::default();
        let classifier = AttributeClassifier::new(
            Arc::new(ClassHueProfile::default()),
            regions.clone(),
            ClassifierThresholds::default(),
        );
        let bounds = PixelRect::new(10, 10, 150, 200);
        let mut frame = RgbaImage::from_pixel(200, 240, image::Rgba([20, 20, 25, 255]));

        let paint = |frame: &mut RgbaImage, rect: PixelRect, rgb: [u8; 3]| {
            for y in rect.y..rect.bottom() {
                for x in rect.x..rect.right() {
                    frame.put_pixel(x as u32, y as u32, image::Rgba([rgb[0], rgb[1], rgb[2], 255]));
                }
            }
        };

        let strip = regions.star_strip.within(&bounds);
        let lit = PixelRect::new(strip.x, strip.y, (strip.width as f64 * 0.55) as u32, strip.height);
        paint(&mut frame, lit, [255, 230, 150]);
        paint(
            &mut frame,
            regions.class_icon.within(&bounds),
            hsl_to_rgb(Hsl { h: 120.0, s: 0.7, l: 0.45 }),
        );
        paint(
            &mut frame,
            regions.ascension_badge.within(&bounds),
            hsl_to_rgb(Hsl { h: 45.0, s: 0.6, l: 0.5 }),
        );

        let mut cell = GridCell::new(0, 0, bounds, Some("Hulk".into()));
        classifier.classify_cell(&frame, &mut cell);
        assert_eq!(cell.stars, Some(4));
        assert_eq!(cell.class, Some(ChampionClass::Science));
        assert!(cell.is_ascended);
        assert!(!cell.is_awakened);
        assert!(cell.diagnostics.contains_key("star_ratio"));
        assert!(cell.diagnostics.contains_key("class_hue"));
    }
}
