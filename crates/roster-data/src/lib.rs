use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Champion class, shown as a colored icon on every roster portrait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChampionClass {
    Cosmic,
    Tech,
    Mutant,
    Skill,
    Science,
    Mystic,
}

impl ChampionClass {
    pub const ALL: [ChampionClass; 6] = [
        ChampionClass::Cosmic,
        ChampionClass::Tech,
        ChampionClass::Mutant,
        ChampionClass::Skill,
        ChampionClass::Science,
        ChampionClass::Mystic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChampionClass::Cosmic => "cosmic",
            ChampionClass::Tech => "tech",
            ChampionClass::Mutant => "mutant",
            ChampionClass::Skill => "skill",
            ChampionClass::Science => "science",
            ChampionClass::Mystic => "mystic",
        }
    }

    /// File name of the class icon under `templates/classes/`
    pub fn icon_file(&self) -> String {
        format!("{}.png", self.as_str())
    }
}

impl fmt::Display for ChampionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One champion known to the game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChampionCorpusEntry {
    pub id: String,
    pub name: String,
    #[serde(alias = "shortName")]
    pub short_name: String,
    pub class: ChampionClass,
}

/// Raw champions.json file format
#[derive(Debug, Deserialize)]
struct ChampionsFile {
    #[allow(dead_code)]
    #[serde(default)]
    version: Option<String>,
    champions: Vec<ChampionCorpusEntry>,
}

/// Read-only champion registry, built once and shared between scans
#[derive(Debug, Clone, Default)]
pub struct ChampionCorpus {
    entries: Vec<ChampionCorpusEntry>,
    by_id: HashMap<String, usize>,
    /// Lowercased short name -> entry indices, in corpus order
    by_short_name: HashMap<String, Vec<usize>>,
}

impl ChampionCorpus {
    /// Load the corpus from `data_dir/champions.json`.
    /// A missing file yields an empty corpus.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let champions_path = data_dir.join("champions.json");
        if !champions_path.exists() {
            tracing::warn!(
                "No champions.json found at {}. Name resolution will match nothing",
                champions_path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&champions_path)
            .with_context(|| format!("Failed to read {}", champions_path.display()))?;
        let file: ChampionsFile =
            serde_json::from_str(&content).context("Failed to parse champions.json")?;

        let corpus = Self::from_entries(file.champions);
        tracing::info!(
            "Loaded {} champions ({} ambiguous short names)",
            corpus.len(),
            corpus.ambiguous_short_names().len()
        );
        Ok(corpus)
    }

    /// Build a corpus from entries. Later duplicates of an id are dropped.
    pub fn from_entries(entries: impl IntoIterator<Item = ChampionCorpusEntry>) -> Self {
        let mut corpus = Self::default();
        for entry in entries {
            if corpus.by_id.contains_key(&entry.id) {
                tracing::warn!("Duplicate champion id {} ignored", entry.id);
                continue;
            }
            let idx = corpus.entries.len();
            corpus.by_id.insert(entry.id.clone(), idx);
            corpus
                .by_short_name
                .entry(entry.short_name.to_lowercase())
                .or_default()
                .push(idx);
            corpus.entries.push(entry);
        }
        corpus
    }

    pub fn entries(&self) -> &[ChampionCorpusEntry] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&ChampionCorpusEntry> {
        self.by_id.get(id).map(|&i| &self.entries[i])
    }

    /// All entries displayed under the given short name, in corpus order
    pub fn variants(&self, short_name: &str) -> Vec<&ChampionCorpusEntry> {
        self.by_short_name
            .get(&short_name.to_lowercase())
            .map(|idxs| idxs.iter().map(|&i| &self.entries[i]).collect())
            .unwrap_or_default()
    }

    /// Whether more than one champion shares this short name
    pub fn is_ambiguous(&self, short_name: &str) -> bool {
        self.by_short_name
            .get(&short_name.to_lowercase())
            .is_some_and(|idxs| idxs.len() > 1)
    }

    /// Short names shared by several champions, sorted
    pub fn ambiguous_short_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .by_short_name
            .values()
            .filter(|idxs| idxs.len() > 1)
            .map(|idxs| self.entries[idxs[0]].short_name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
