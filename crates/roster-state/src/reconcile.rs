use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

use crate::{RosterKey, RosterRecord, RosterStore, RosterUpdate};

/// A grid cell that matched a champion, ready to be written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedCell {
    pub row: usize,
    pub col: usize,
    pub text: Option<String>,
    pub champion_id: String,
    pub stars: Option<u8>,
    pub is_awakened: bool,
    pub is_ascended: bool,
    pub power_rating: Option<u32>,
}

/// Caller-supplied values that win over what was read from the cells
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpsertOverrides {
    pub stars: Option<u8>,
    pub rank: Option<u8>,
    pub sig_level: Option<u32>,
}

/// A cell that produced no record, and why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedCell {
    pub row: usize,
    pub col: usize,
    pub text: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub persisted: Vec<RosterRecord>,
    pub skipped: Vec<SkippedCell>,
}

fn skip(cell: &ResolvedCell, reason: impl Into<String>) -> SkippedCell {
    SkippedCell {
        row: cell.row,
        col: cell.col,
        text: cell.text.clone(),
        reason: reason.into(),
    }
}

/// Upsert one record per distinct (champion, tier).
///
/// Cells sharing a key collapse to the last one in input order. A failing
/// cell is reported in `skipped` and does not undo the others.
pub fn reconcile(
    store: &dyn RosterStore,
    player_id: &str,
    cells: &[ResolvedCell],
    overrides: &UpsertOverrides,
) -> ReconcileReport {
    let mut report = ReconcileReport::default();
    let mut pending: Vec<(RosterKey, RosterUpdate, &ResolvedCell)> = Vec::new();
    let mut slot_of: HashMap<RosterKey, usize> = HashMap::new();

    for cell in cells {
        let Some(stars) = overrides.stars.or(cell.stars) else {
            report.skipped.push(skip(cell, "star tier undetermined"));
            continue;
        };
        let key = RosterKey::new(player_id, &cell.champion_id, stars);
        let update = RosterUpdate {
            rank: overrides.rank,
            sig_level: overrides.sig_level,
            is_awakened: cell.is_awakened,
            is_ascended: cell.is_ascended,
            power_rating: cell.power_rating,
        };
        match slot_of.get(&key) {
            Some(&i) => pending[i] = (key, update, cell),
            None => {
                slot_of.insert(key.clone(), pending.len());
                pending.push((key, update, cell));
            }
        }
    }

    for (key, update, cell) in pending {
        match store.upsert(&key, &update) {
            Ok(record) => report.persisted.push(record),
            Err(e) => {
                warn!(
                    "Skipping cell ({},{}) {}: {}",
                    cell.row, cell.col, cell.champion_id, e
                );
                report.skipped.push(skip(cell, e.to_string()));
            }
        }
    }

    info!(
        "Reconciled roster for {}: {} persisted, {} skipped",
        player_id,
        report.persisted.len(),
        report.skipped.len()
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryRosterStore;

    fn cell(col: usize, champion_id: &str, stars: Option<u8>) -> ResolvedCell {
        ResolvedCell {
            row: 0,
            col,
            text: Some(champion_id.to_uppercase()),
            champion_id: champion_id.into(),
            stars,
            is_awakened: false,
            is_ascended: false,
            power_rating: None,
        }
    }

    #[test]
    fn test_one_upsert_per_distinct_pair() {
        let store = InMemoryRosterStore::new();
        let mut late = cell(3, "hulk", Some(5));
        late.is_awakened = true;
        let cells = vec![
            cell(0, "hulk", Some(5)),
            cell(1, "hulk", Some(6)),
            cell(2, "ultron", Some(5)),
            late,
        ];

        let report = reconcile(&store, "p1", &cells, &UpsertOverrides::default());
        assert_eq!(report.persisted.len(), 3);
        assert!(report.skipped.is_empty());

        let records = store.records_for("p1");
        assert_eq!(records.len(), 3);
        let hulk5 = records
            .iter()
            .find(|r| r.champion_id == "hulk" && r.stars == 5)
            .unwrap();
        // Last write wins
        assert!(hulk5.is_awakened);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let store = InMemoryRosterStore::new();
        let cells = vec![cell(0, "hulk", Some(5)), cell(1, "ultron", Some(4))];

        reconcile(&store, "p1", &cells, &UpsertOverrides::default());
        let first = store.records_for("p1");
        reconcile(&store, "p1", &cells, &UpsertOverrides::default());
        assert_eq!(store.records_for("p1"), first);
    }

    #[test]
    fn test_failures_are_skipped_not_fatal() {
        let store = InMemoryRosterStore::with_known_champions(["hulk", "ultron"]);
        let cells = vec![
            cell(0, "hulk", Some(5)),
            cell(1, "retired_champ", Some(5)),
            cell(2, "ultron", None),
        ];

        let report = reconcile(&store, "p1", &cells, &UpsertOverrides::default());
        assert_eq!(report.persisted.len(), 1);
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(report.skipped[0].col, 2);
        assert_eq!(report.skipped[0].reason, "star tier undetermined");
        assert_eq!(report.skipped[1].col, 1);
        assert!(report.skipped[1].reason.contains("retired_champ"));
        assert_eq!(store.records_for("p1").len(), 1);
    }

    #[test]
    fn test_overrides_take_precedence() {
        let store = InMemoryRosterStore::new();
        let overrides = UpsertOverrides {
            stars: Some(6),
            rank: Some(3),
            sig_level: Some(120),
        };
        let report = reconcile(&store, "p1", &[cell(0, "hulk", None)], &overrides);
        assert_eq!(report.persisted.len(), 1);
        let record = &report.persisted[0];
        assert_eq!(record.stars, 6);
        assert_eq!(record.rank, Some(3));
        assert_eq!(record.sig_level, Some(120));
    }
}
