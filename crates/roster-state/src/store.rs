use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::{RosterKey, RosterRecord, RosterStore, RosterUpdate, StoreError, MAX_STARS};

type RosterTable = BTreeMap<RosterKey, RosterRecord>;

fn validate(key: &RosterKey, known: Option<&HashSet<String>>) -> Result<(), StoreError> {
    if key.player_id.is_empty() {
        return Err(StoreError::MissingPlayer);
    }
    if !(1..=MAX_STARS).contains(&key.stars) {
        return Err(StoreError::InvalidStars { stars: key.stars });
    }
    if let Some(known) = known {
        if !known.contains(&key.champion_id) {
            return Err(StoreError::UnknownChampion {
                champion_id: key.champion_id.clone(),
            });
        }
    }
    Ok(())
}

/// Insert or merge into `table`, returning the stored record
fn upsert_into(table: &mut RosterTable, key: &RosterKey, update: &RosterUpdate) -> RosterRecord {
    let now = Utc::now();
    match table.get_mut(key) {
        Some(existing) => {
            if existing.apply(update, now) {
                debug!("Updated {:?}", key);
            }
            existing.clone()
        }
        None => {
            debug!("Inserted {:?}", key);
            let record = RosterRecord::new(key, update, now);
            table.insert(key.clone(), record.clone());
            record
        }
    }
}

fn player_records(table: &RosterTable, player_id: &str) -> Vec<RosterRecord> {
    table
        .values()
        .filter(|r| r.player_id == player_id)
        .cloned()
        .collect()
}

fn to_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<String, StoreError> {
    serde_json::to_string_pretty(value).map_err(|source| StoreError::Serialize {
        path: path.to_path_buf(),
        source,
    })
}

fn lock(table: &Mutex<RosterTable>) -> Result<MutexGuard<'_, RosterTable>, StoreError> {
    table.lock().map_err(|_| StoreError::Poisoned)
}

/// Process-local store. With a champion registry it rejects ids the game
/// no longer knows, like a database with a foreign key would.
#[derive(Default)]
pub struct InMemoryRosterStore {
    records: Mutex<RosterTable>,
    known_champions: Option<HashSet<String>>,
}

impl InMemoryRosterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_known_champions(ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            records: Mutex::default(),
            known_champions: Some(ids.into_iter().map(Into::into).collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RosterStore for InMemoryRosterStore {
    fn upsert(&self, key: &RosterKey, update: &RosterUpdate) -> Result<RosterRecord, StoreError> {
        validate(key, self.known_champions.as_ref())?;
        let mut table = lock(&self.records)?;
        Ok(upsert_into(&mut table, key, update))
    }

    fn records_for(&self, player_id: &str) -> Vec<RosterRecord> {
        match self.records.lock() {
            Ok(table) => player_records(&table, player_id),
            Err(_) => Vec::new(),
        }
    }
}

/// Store backed by a JSON array on disk, rewritten after every upsert
pub struct JsonFileRosterStore {
    path: PathBuf,
    records: Mutex<RosterTable>,
    known_champions: Option<HashSet<String>>,
}

impl JsonFileRosterStore {
    /// Open `path`, starting empty if it does not exist yet
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let records = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let list: Vec<RosterRecord> =
                serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
                    path: path.to_path_buf(),
                    source,
                })?;
            list.into_iter().map(|r| (r.key(), r)).collect()
        } else {
            RosterTable::new()
        };

        info!("Roster store {} opened with {} records", path.display(), records.len());
        Ok(Self {
            path: path.to_path_buf(),
            records: Mutex::new(records),
            known_champions: None,
        })
    }

    pub fn with_known_champions(mut self, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.known_champions = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, table: &RosterTable) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        let list: Vec<&RosterRecord> = table.values().collect();
        let json = to_json(&self.path, &list)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }
}

impl RosterStore for JsonFileRosterStore {
    fn upsert(&self, key: &RosterKey, update: &RosterUpdate) -> Result<RosterRecord, StoreError> {
        validate(key, self.known_champions.as_ref())?;
        let mut table = lock(&self.records)?;
        let previous = table.get(key).cloned();
        let record = upsert_into(&mut table, key, update);

        if previous.as_ref() == Some(&record) {
            return Ok(record);
        }
        if let Err(e) = self.persist(&table) {
            // Keep memory in step with the file
            match previous {
                Some(prev) => table.insert(key.clone(), prev),
                None => table.remove(key),
            };
            return Err(e);
        }
        Ok(record)
    }

    fn records_for(&self, player_id: &str) -> Vec<RosterRecord> {
        match self.records.lock() {
            Ok(table) => player_records(&table, player_id),
            Err(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(awakened: bool) -> RosterUpdate {
        RosterUpdate {
            is_awakened: awakened,
            ..Default::default()
        }
    }

    #[test]
    fn test_in_memory_upsert_is_keyed() {
        let store = InMemoryRosterStore::new();
        store.upsert(&RosterKey::new("p1", "hulk", 5), &update(false)).unwrap();
        store.upsert(&RosterKey::new("p1", "hulk", 5), &update(true)).unwrap();
        store.upsert(&RosterKey::new("p1", "hulk", 6), &update(false)).unwrap();
        store.upsert(&RosterKey::new("p2", "hulk", 5), &update(false)).unwrap();

        let p1 = store.records_for("p1");
        assert_eq!(p1.len(), 2);
        assert!(p1[0].is_awakened);
        assert_eq!(p1[1].stars, 6);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_rejects_invalid_keys() {
        let store = InMemoryRosterStore::with_known_champions(["hulk"]);
        assert!(matches!(
            store.upsert(&RosterKey::new("p1", "ghost", 5), &update(false)),
            Err(StoreError::UnknownChampion { .. })
        ));
        assert!(matches!(
            store.upsert(&RosterKey::new("p1", "hulk", 8), &update(false)),
            Err(StoreError::InvalidStars { stars: 8 })
        ));
        assert!(matches!(
            store.upsert(&RosterKey::new("", "hulk", 5), &update(false)),
            Err(StoreError::MissingPlayer)
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_json_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("roster.json");

        let store = JsonFileRosterStore::open(&path).unwrap();
        let first = store.upsert(&RosterKey::new("p1", "hulk", 5), &update(true)).unwrap();
        store.upsert(&RosterKey::new("p1", "ultron", 4), &update(false)).unwrap();
        drop(store);

        let reopened = JsonFileRosterStore::open(&path).unwrap();
        let records = reopened.records_for("p1");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], first);
        assert_eq!(records[1].champion_id, "ultron");
    }

    #[test]
    fn test_write_side_failure_is_not_reported_as_corrupt() {
        // JSON object keys must be strings
        let mut bad = BTreeMap::new();
        bad.insert((1u8, 2u8), "x");
        let err = to_json(Path::new("roster.json"), &bad).unwrap_err();
        assert!(matches!(err, StoreError::Serialize { .. }));
        assert_eq!(err.to_string(), "failed to serialize roster for roster.json");
    }

    #[test]
    fn test_json_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            JsonFileRosterStore::open(&path),
            Err(StoreError::Corrupt { .. })
        ));
    }
}
