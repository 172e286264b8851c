use anyhow::{Context, Result};
use roster_vision::{AmbiguousGroup, AttributeRegions, ClassifierThresholds, GridConfig, DEFAULT_MIN_SCORE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NameMatchConfig {
    /// Minimum similarity in [0, 1] for a cell's text to match a champion
    pub min_score: f64,
}

impl Default for NameMatchConfig {
    fn default() -> Self {
        Self {
            min_score: DEFAULT_MIN_SCORE,
        }
    }
}

/// Everything a scan needs besides the screenshot itself.
/// Missing fields fall back to the calibrated defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Holds `champions.json` and `templates/classes/<class>.png`
    pub data_dir: PathBuf,
    pub grid: GridConfig,
    pub names: NameMatchConfig,
    pub regions: AttributeRegions,
    pub thresholds: ClassifierThresholds,
    /// Short names the OCR confuses beyond those the corpus already shares
    pub ambiguous_groups: Vec<AmbiguousGroup>,
    /// OCR endpoint receiving the raw image bytes
    pub detector_endpoint: Option<String>,
    pub detector_timeout_secs: u64,
    pub render_debug_image: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            grid: GridConfig::default(),
            names: NameMatchConfig::default(),
            regions: AttributeRegions::default(),
            thresholds: ClassifierThresholds::default(),
            ambiguous_groups: Vec::new(),
            detector_endpoint: None,
            detector_timeout_secs: 30,
            render_debug_image: true,
        }
    }
}

impl ScanConfig {
    /// Read a JSON config. A missing file gives the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Config {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        info!("Loaded scan config from {}", path.display());
        Ok(config)
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.data_dir.join("templates").join("classes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ScanConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.names.min_score, DEFAULT_MIN_SCORE);
        assert!(config.render_debug_image);
        assert_eq!(config.templates_dir(), PathBuf::from("data/templates/classes"));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.json");
        std::fs::write(
            &path,
            r#"{
                "names": { "min_score": 0.8 },
                "grid": { "cell_fill": 0.9 },
                "ambiguous_groups": [
                    { "short_name": "Hulk", "champion_ids": ["hulk", "joe_fixit"] }
                ]
            }"#,
        )
        .unwrap();

        let config = ScanConfig::load(&path).unwrap();
        assert_eq!(config.names.min_score, 0.8);
        assert_eq!(config.grid.cell_fill, 0.9);
        assert_eq!(config.grid.icon_aspect, GridConfig::default().icon_aspect);
        assert_eq!(config.ambiguous_groups.len(), 1);
        assert_eq!(config.detector_timeout_secs, 30);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.json");
        std::fs::write(&path, "{ nope").unwrap();
        assert!(ScanConfig::load(&path).is_err());
    }
}
