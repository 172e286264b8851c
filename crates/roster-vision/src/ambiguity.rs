use image::RgbaImage;
use roster_data::{ChampionCorpus, ChampionCorpusEntry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::attributes::AttributeClassifier;
use crate::grid::GridCell;

/// Extra group of champions the OCR cannot tell apart, beyond the
/// short names the corpus itself shares between entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmbiguousGroup {
    pub short_name: String,
    pub champion_ids: Vec<String>,
}

/// Picks the right variant for cells whose short name maps to several champions,
/// by classifying a narrow crop that contains the class icon.
pub struct AmbiguityResolver {
    corpus: Arc<ChampionCorpus>,
    groups: Vec<AmbiguousGroup>,
}

impl AmbiguityResolver {
    pub fn new(corpus: Arc<ChampionCorpus>, groups: Vec<AmbiguousGroup>) -> Self {
        Self { corpus, groups }
    }

    /// Every champion that could hide behind `short_name`, in corpus order
    pub fn candidates(&self, short_name: &str) -> Vec<&ChampionCorpusEntry> {
        let mut candidates = self.corpus.variants(short_name);
        for group in self
            .groups
            .iter()
            .filter(|g| g.short_name.eq_ignore_ascii_case(short_name))
        {
            for id in &group.champion_ids {
                match self.corpus.get(id) {
                    Some(entry) if !candidates.iter().any(|c| c.id == entry.id) => {
                        candidates.push(entry)
                    }
                    Some(_) => {}
                    None => debug!("Ambiguous group {} names unknown id {}", group.short_name, id),
                }
            }
        }
        candidates
    }

    pub fn is_ambiguous(&self, short_name: &str) -> bool {
        self.candidates(short_name).len() > 1
    }

    /// Re-examine ambiguous cells. Returns how many changed identity.
    /// The choice depends only on the short name and the measured crop,
    /// so running this twice gives the same result.
    pub fn resolve_cells<'a>(
        &self,
        frame: &RgbaImage,
        classifier: &AttributeClassifier,
        cells: impl IntoIterator<Item = &'a mut GridCell>,
    ) -> usize {
        cells
            .into_iter()
            .map(|cell| self.resolve_cell(frame, classifier, cell))
            .filter(|changed| *changed)
            .count()
    }

    fn resolve_cell(
        &self,
        frame: &RgbaImage,
        classifier: &AttributeClassifier,
        cell: &mut GridCell,
    ) -> bool {
        let Some(short_name) = cell.champion_name.clone() else {
            return false;
        };
        let candidates = self.candidates(&short_name);
        if candidates.len() < 2 {
            return false;
        }

        let reading = classifier.read_class(
            frame,
            &cell.bounds,
            &classifier.regions().disambiguation_region,
        );
        if let Some(h) = reading.and_then(|r| r.hue) {
            cell.note("disambiguation_hue", h);
        }

        let Some(class) = reading.and_then(|r| r.class) else {
            debug!(
                "Cell ({},{}): '{}' stays {:?}, distinguishing crop undetermined",
                cell.row, cell.col, short_name, cell.champion_id
            );
            return false;
        };

        let Some(pick) = candidates.iter().find(|c| c.class == class) else {
            debug!(
                "Cell ({},{}): no '{}' variant of class {}",
                cell.row, cell.col, short_name, class
            );
            return false;
        };

        if cell.champion_id.as_deref() == Some(pick.id.as_str()) {
            return false;
        }

        debug!(
            "Cell ({},{}): '{}' disambiguated {:?} -> {}",
            cell.row, cell.col, short_name, cell.champion_id, pick.id
        );
        cell.champion_id = Some(pick.id.clone());
        true
    }
}
