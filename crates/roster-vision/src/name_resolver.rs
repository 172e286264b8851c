use roster_data::ChampionCorpus;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::grid::GridCell;

/// Minimum similarity (1 - normalized edit distance) to accept a match
pub const DEFAULT_MIN_SCORE: f64 = 0.75;

/// Which corpus field produced the best score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchedField {
    Name,
    ShortName,
}

/// Result of matching a cell's text against the corpus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub champion_id: String,
    /// Short name of the matched entry
    pub champion_name: String,
    pub score: f64,
    pub field: MatchedField,
}

/// Pre-normalized corpus keys for matching
struct NameCandidate {
    index: usize,
    name_key: Vec<char>,
    short_key: Vec<char>,
}

/// Fuzzy matcher from OCR text to corpus entries
pub struct NameResolver {
    corpus: Arc<ChampionCorpus>,
    candidates: Vec<NameCandidate>,
    min_score: f64,
}

impl NameResolver {
    pub fn new(corpus: Arc<ChampionCorpus>, min_score: f64) -> Self {
        let candidates = corpus
            .entries()
            .iter()
            .enumerate()
            .map(|(index, entry)| NameCandidate {
                index,
                name_key: normalize_name(&entry.name).chars().collect(),
                short_key: normalize_name(&entry.short_name).chars().collect(),
            })
            .collect::<Vec<_>>();

        info!(
            "NameResolver ready: {} candidates, min score {:.2}",
            candidates.len(),
            min_score
        );

        Self {
            corpus,
            candidates,
            min_score,
        }
    }

    /// Best corpus entry for `text`, or `None` if nothing clears the threshold.
    /// Ties keep corpus order.
    pub fn match_text(&self, text: &str) -> Option<MatchResult> {
        let key: Vec<char> = normalize_name(text).chars().collect();
        if key.is_empty() {
            return None;
        }

        let mut best: Option<(f64, usize, MatchedField)> = None;
        for cand in &self.candidates {
            for (field_key, field) in [
                (&cand.short_key, MatchedField::ShortName),
                (&cand.name_key, MatchedField::Name),
            ] {
                let score = similarity(&key, field_key);
                if best.map_or(true, |(s, _, _)| score > s) {
                    best = Some((score, cand.index, field));
                }
            }
        }

        let (score, index, field) = best?;
        if score < self.min_score {
            debug!("No match for '{}' (best score {:.2})", text, score);
            return None;
        }

        let entry = &self.corpus.entries()[index];
        Some(MatchResult {
            champion_id: entry.id.clone(),
            champion_name: entry.short_name.clone(),
            score,
            field,
        })
    }

    /// Resolve every cell that carries text. Returns how many resolved.
    /// Each cell is matched independently; several cells may share a champion.
    pub fn resolve_cells<'a>(&self, cells: impl IntoIterator<Item = &'a mut GridCell>) -> usize {
        let mut resolved = 0;
        for cell in cells {
            let Some(text) = cell.text.as_deref() else {
                continue;
            };
            match self.match_text(text) {
                Some(m) => {
                    cell.note("name_score", m.score);
                    cell.champion_id = Some(m.champion_id);
                    cell.champion_name = Some(m.champion_name);
                    resolved += 1;
                }
                None => {
                    cell.champion_id = None;
                    cell.champion_name = None;
                }
            }
        }
        resolved
    }
}

/// Lowercase, undo common OCR digit/letter confusions, drop everything
/// that is not alphanumeric ("Dr. Doom" and "DrDoom" normalize alike).
pub fn normalize_name(text: &str) -> String {
    text.chars()
        .flat_map(|c| c.to_lowercase())
        .map(|c| match c {
            '0' => 'o',
            '1' | '|' => 'l',
            '5' | '$' => 's',
            '8' => 'b',
            other => other,
        })
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// 1 - levenshtein / longer length, in [0, 1]
pub fn similarity(a: &[char], b: &[char]) -> f64 {
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_data::{ChampionClass, ChampionCorpusEntry};
    use roster_source::PixelRect;

    fn corpus() -> Arc<ChampionCorpus> {
        let entry = |id: &str, name: &str, short: &str, class| ChampionCorpusEntry {
            id: id.into(),
            name: name.into(),
            short_name: short.into(),
            class,
        };
        Arc::new(ChampionCorpus::from_entries(vec![
            entry("doom", "Doctor Doom", "DrDoom", ChampionClass::Mystic),
            entry("hulk", "Hulk", "Hulk", ChampionClass::Science),
            entry("spidey", "Spider-Man (Classic)", "Spider-Man", ChampionClass::Science),
            entry("spidey_stark", "Spider-Man (Stark Enhanced)", "Spider-Man", ChampionClass::Tech),
            entry("ultron", "Ultron", "Ultron", ChampionClass::Tech),
        ]))
    }

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn test_dr_doom_resolves_to_short_name() {
        let resolver = NameResolver::new(corpus(), DEFAULT_MIN_SCORE);
        let m = resolver.match_text("Dr Doom").unwrap();
        assert_eq!(m.champion_name, "DrDoom");
        assert_eq!(m.champion_id, "doom");
        assert_eq!(m.field, MatchedField::ShortName);
        assert!((m.score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_ocr_digit_noise_tolerated() {
        let resolver = NameResolver::new(corpus(), DEFAULT_MIN_SCORE);
        assert_eq!(resolver.match_text("U1tr0n").unwrap().champion_id, "ultron");
        assert_eq!(resolver.match_text("Spider Man").unwrap().champion_id, "spidey");
    }

    #[test]
    fn test_below_threshold_is_none() {
        let resolver = NameResolver::new(corpus(), DEFAULT_MIN_SCORE);
        assert!(resolver.match_text("Xyzzy Quux").is_none());
        assert!(resolver.match_text("...").is_none());
    }

    #[test]
    fn test_levenshtein_basics() {
        assert_eq!(levenshtein(&chars("kitten"), &chars("sitting")), 3);
        assert_eq!(levenshtein(&chars(""), &chars("abc")), 3);
        assert!((similarity(&chars("hulk"), &chars("hulc")) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_resolve_cells_is_per_cell() {
        let resolver = NameResolver::new(corpus(), DEFAULT_MIN_SCORE);
        let bounds = PixelRect::new(0, 0, 10, 10);
        let mut cells = vec![
            GridCell::new(0, 0, bounds, Some("Hulk".into())),
            GridCell::new(0, 1, bounds, Some("HULK".into())),
            GridCell::new(0, 2, bounds, None),
            GridCell::new(0, 3, bounds, Some("Mystery".into())),
        ];
        let resolved = resolver.resolve_cells(cells.iter_mut());
        assert_eq!(resolved, 2);
        assert_eq!(cells[0].champion_id.as_deref(), Some("hulk"));
        assert_eq!(cells[1].champion_id.as_deref(), Some("hulk"));
        assert!(cells[2].champion_name.is_none());
        assert!(cells[3].champion_name.is_none());
        assert!(cells[0].diagnostics.contains_key("name_score"));
    }
}
