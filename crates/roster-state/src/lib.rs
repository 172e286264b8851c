use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

mod reconcile;
mod store;

pub use reconcile::{reconcile, ReconcileReport, ResolvedCell, SkippedCell, UpsertOverrides};
pub use store::{InMemoryRosterStore, JsonFileRosterStore};

/// Highest star tier a champion can reach
pub const MAX_STARS: u8 = 7;

/// Identity of a roster entry: one player owns at most one record per champion and tier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RosterKey {
    pub player_id: String,
    pub champion_id: String,
    pub stars: u8,
}

impl RosterKey {
    pub fn new(player_id: impl Into<String>, champion_id: impl Into<String>, stars: u8) -> Self {
        Self {
            player_id: player_id.into(),
            champion_id: champion_id.into(),
            stars,
        }
    }
}

/// Mutable attributes written by an upsert.
/// `None` leaves the stored value alone; the flags always overwrite.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RosterUpdate {
    pub rank: Option<u8>,
    pub sig_level: Option<u32>,
    pub is_awakened: bool,
    pub is_ascended: bool,
    pub power_rating: Option<u32>,
}

/// One persisted roster entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterRecord {
    pub player_id: String,
    pub champion_id: String,
    pub stars: u8,
    pub rank: Option<u8>,
    pub sig_level: Option<u32>,
    pub is_awakened: bool,
    pub is_ascended: bool,
    pub power_rating: Option<u32>,
    pub updated_at: DateTime<Utc>,
}

impl RosterRecord {
    pub fn new(key: &RosterKey, update: &RosterUpdate, now: DateTime<Utc>) -> Self {
        Self {
            player_id: key.player_id.clone(),
            champion_id: key.champion_id.clone(),
            stars: key.stars,
            rank: update.rank,
            sig_level: update.sig_level,
            is_awakened: update.is_awakened,
            is_ascended: update.is_ascended,
            power_rating: update.power_rating,
            updated_at: now,
        }
    }

    pub fn key(&self) -> RosterKey {
        RosterKey::new(&self.player_id, &self.champion_id, self.stars)
    }

    /// Merge an update in. `updated_at` only moves when something changed,
    /// so replaying the same update leaves the record identical.
    pub fn apply(&mut self, update: &RosterUpdate, now: DateTime<Utc>) -> bool {
        let mut merged = self.clone();
        merged.rank = update.rank.or(self.rank);
        merged.sig_level = update.sig_level.or(self.sig_level);
        merged.power_rating = update.power_rating.or(self.power_rating);
        merged.is_awakened = update.is_awakened;
        merged.is_ascended = update.is_ascended;

        if merged == *self {
            return false;
        }
        merged.updated_at = now;
        *self = merged;
        true
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("unknown champion id: {champion_id}")]
    UnknownChampion { champion_id: String },

    #[error("star tier {stars} outside 1..={max}", max = MAX_STARS)]
    InvalidStars { stars: u8 },

    #[error("empty player id")]
    MissingPlayer,

    #[error("roster file I/O failed: {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("roster file is not valid JSON: {path}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize roster for {path}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("roster store lock poisoned")]
    Poisoned,
}

/// Persistence contract for roster records.
/// Upserting the same key twice leaves one record.
pub trait RosterStore: Send + Sync {
    fn upsert(&self, key: &RosterKey, update: &RosterUpdate) -> Result<RosterRecord, StoreError>;

    /// Every record of `player_id`, ordered by champion then tier
    fn records_for(&self, player_id: &str) -> Vec<RosterRecord>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_keeps_unset_fields_and_timestamp() {
        let t0 = Utc::now();
        let key = RosterKey::new("p1", "hulk", 5);
        let mut record = RosterRecord::new(
            &key,
            &RosterUpdate {
                rank: Some(3),
                sig_level: Some(20),
                ..Default::default()
            },
            t0,
        );

        // Grid scan knows nothing about rank or signature level
        let grid_update = RosterUpdate {
            is_awakened: true,
            ..Default::default()
        };
        let t1 = t0 + chrono::Duration::seconds(5);
        assert!(record.apply(&grid_update, t1));
        assert_eq!(record.rank, Some(3));
        assert_eq!(record.sig_level, Some(20));
        assert!(record.is_awakened);
        assert_eq!(record.updated_at, t1);

        let t2 = t1 + chrono::Duration::seconds(5);
        assert!(!record.apply(&grid_update, t2));
        assert_eq!(record.updated_at, t1);
        assert_eq!(record.key(), key);
    }

    #[test]
    fn test_store_error_messages() {
        assert_eq!(
            StoreError::InvalidStars { stars: 9 }.to_string(),
            "star tier 9 outside 1..=7"
        );
        assert_eq!(
            StoreError::UnknownChampion {
                champion_id: "ghost".into()
            }
            .to_string(),
            "unknown champion id: ghost"
        );
    }
}
