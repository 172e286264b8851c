//! Screenshot-to-roster vision: text clustering, grid inference, name and
//! attribute recognition, and the calibration overlay.

pub mod ambiguity;
pub mod attributes;
pub mod color;
pub mod debug_render;
pub mod grid;
pub mod hue_profile;
pub mod name_resolver;
pub mod normalize;

pub use ambiguity::{AmbiguityResolver, AmbiguousGroup};
pub use attributes::{AttributeClassifier, AttributeRegions, ClassReading, ClassifierThresholds};
pub use debug_render::{encode_png, summarize, DebugRenderer};
pub use grid::{estimate_grid, GridCell, GridConfig, GridEstimate};
pub use hue_profile::ClassHueProfile;
pub use name_resolver::{MatchResult, MatchedField, NameResolver, DEFAULT_MIN_SCORE};
pub use normalize::{normalize_detections, TextCluster};
