use anyhow::Result;
use image::RgbaImage;
use roster_data::ChampionClass;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::color::{hue_distance, mean_hue, rgb_to_hsl};

/// Cosmic's icon shares Tech's blue tones, so its reference hue is set by hand
/// instead of being measured from the icon.
pub const COSMIC_HUE_OVERRIDE: f64 = 185.0;

/// Reference hues measured from the stock class icons
const DEFAULT_HUES: [(ChampionClass, f64); 6] = [
    (ChampionClass::Cosmic, COSMIC_HUE_OVERRIDE),
    (ChampionClass::Tech, 215.0),
    (ChampionClass::Mutant, 50.0),
    (ChampionClass::Skill, 0.0),
    (ChampionClass::Science, 120.0),
    (ChampionClass::Mystic, 280.0),
];

/// Pixel filter shared by icon measurement and the class classifier
#[derive(Debug, Clone, Copy)]
pub struct HueFilter {
    pub min_saturation: f64,
    pub min_lightness: f64,
}

impl Default for HueFilter {
    fn default() -> Self {
        Self {
            min_saturation: 0.15,
            min_lightness: 0.20,
        }
    }
}

/// Hues of the pixels that are saturated and bright enough to carry color.
/// Pixels with saturation or lightness at or below the filter are background.
pub fn qualifying_hues(img: &RgbaImage, filter: HueFilter) -> Vec<f64> {
    img.pixels()
        .filter(|px| px[3] > 0)
        .map(|px| rgb_to_hsl(px[0], px[1], px[2]))
        .filter(|hsl| hsl.s > filter.min_saturation && hsl.l > filter.min_lightness)
        .map(|hsl| hsl.h)
        .collect()
}

/// Per-class reference hue, built once per process and shared read-only
#[derive(Debug, Clone)]
pub struct ClassHueProfile {
    hues: BTreeMap<ChampionClass, f64>,
}

impl Default for ClassHueProfile {
    fn default() -> Self {
        Self::from_hues(DEFAULT_HUES)
    }
}

impl ClassHueProfile {
    pub fn from_hues(hues: impl IntoIterator<Item = (ChampionClass, f64)>) -> Self {
        Self {
            hues: hues
                .into_iter()
                .map(|(class, h)| (class, h.rem_euclid(360.0)))
                .collect(),
        }
    }

    /// Measure reference hues from `templates_dir/<class>.png`.
    /// Classes without a usable icon keep the stock hue; Cosmic is always overridden.
    pub fn load(templates_dir: &Path) -> Result<Self> {
        let mut hues = BTreeMap::new();
        let filter = HueFilter::default();

        for (class, default_hue) in DEFAULT_HUES {
            if class == ChampionClass::Cosmic {
                hues.insert(class, COSMIC_HUE_OVERRIDE);
                continue;
            }

            let icon_path = templates_dir.join(class.icon_file());
            if !icon_path.exists() {
                debug!("Missing class icon {}", icon_path.display());
                hues.insert(class, default_hue);
                continue;
            }

            let icon = match image::open(&icon_path) {
                Ok(img) => img.to_rgba8(),
                Err(e) => {
                    warn!(
                        "Failed to decode class icon {}: {}, using stock hue",
                        icon_path.display(),
                        e
                    );
                    hues.insert(class, default_hue);
                    continue;
                }
            };
            match mean_hue(&qualifying_hues(&icon, filter)) {
                Some(h) => {
                    debug!("Class {} reference hue {:.1} from icon", class, h);
                    hues.insert(class, h);
                }
                None => {
                    warn!(
                        "Class icon {} has no colored pixels, using stock hue",
                        icon_path.display()
                    );
                    hues.insert(class, default_hue);
                }
            }
        }

        info!(
            "ClassHueProfile loaded from {}: {:?}",
            templates_dir.display(),
            hues
        );
        Ok(Self { hues })
    }

    pub fn reference_hue(&self, class: ChampionClass) -> Option<f64> {
        self.hues.get(&class).copied()
    }

    /// Closest class by circular hue distance, with that distance
    pub fn nearest(&self, hue: f64) -> Option<(ChampionClass, f64)> {
        self.hues
            .iter()
            .map(|(&class, &reference)| (class, hue_distance(hue, reference)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }
}
