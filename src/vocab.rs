use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::info;

use crate::store::StoreError;

const POS_PRIORITY: [&str; 4] = ["noun", "verb", "adjective", "adverb"];

/// One dictionary sense.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VocabEntry {
    pub word: String,
    #[serde(default, alias = "part_of_speech")]
    pub pos: Option<String>,
    #[serde(default)]
    pub definition: String,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default)]
    pub synonyms: Vec<String>,
}

/// Read-only dictionary indexed by lowercased headword.
#[derive(Debug, Default)]
pub struct VocabStore {
    entries: Vec<VocabEntry>,
    index_by_word: HashMap<String, Vec<usize>>,
}

impl VocabStore {
    pub fn new(entries: Vec<VocabEntry>) -> Self {
        let mut index_by_word: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, entry) in entries.iter().enumerate() {
            index_by_word.entry(entry.word.to_lowercase()).or_default().push(i);
        }
        Self {
            entries,
            index_by_word,
        }
    }

    /// Loads a JSON array of entries. No file means an empty dictionary.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            info!("No dictionary at {:?}, lookups go straight to the model", path);
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)?;
        let store = Self::new(serde_json::from_str(&raw)?);
        info!("Loaded {} dictionary entries", store.entries.len());
        Ok(store)
    }

    pub fn lookup(&self, word: &str) -> Vec<&VocabEntry> {
        self.index_by_word
            .get(&word.to_lowercase())
            .map(|ids| ids.iter().map(|&i| &self.entries[i]).collect())
            .unwrap_or_default()
    }

    pub fn search_substring(&self, text: &str) -> Vec<&VocabEntry> {
        let text = text.to_lowercase();
        self.entries
            .iter()
            .filter(|e| e.word.to_lowercase().contains(&text))
            .collect()
    }

    /// Exact headword matches, else every entry containing `target`.
    pub fn find(&self, target: &str) -> Vec<&VocabEntry> {
        let exact = self.lookup(target);
        if exact.is_empty() {
            self.search_substring(target)
        } else {
            exact
        }
    }

    /// The sense to show for `target`: nouns before verbs before adjectives
    /// before adverbs, otherwise the first match.
    pub fn best_entry(&self, target: &str) -> Option<&VocabEntry> {
        let entries = self.find(target);
        POS_PRIORITY
            .iter()
            .find_map(|wanted| {
                entries.iter().copied().find(|e| {
                    e.pos
                        .as_deref()
                        .map_or(false, |pos| pos.eq_ignore_ascii_case(wanted))
                })
            })
            .or_else(|| entries.first().copied())
    }
}
