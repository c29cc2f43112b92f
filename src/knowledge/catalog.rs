//! Monument catalog with keyword-overlap ranking

use super::KnowledgeError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Words that carry no routing signal
const STOPWORDS: &[&str] = &[
    "a", "about", "an", "and", "are", "can", "did", "do", "does", "for", "give", "how", "i",
    "in", "is", "it", "me", "more", "of", "on", "please", "tell", "the", "to", "was", "what",
    "when", "where", "which", "who", "why", "with", "you",
];

const NAME_WEIGHT: u32 = 3;
const LOCATION_WEIGHT: u32 = 2;
const DESCRIPTION_WEIGHT: u32 = 1;

/// Minimum score for a record to count as a match. A single description-only
/// hit stays below it.
pub const DEFAULT_MIN_SCORE: u32 = 2;

/// One catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Monument {
    pub name: String,
    pub location: String,
    pub description: String,
}

impl Monument {
    pub fn new(
        name: impl Into<String>,
        location: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            description: description.into(),
        }
    }

    /// `Name (Location): description`
    pub fn context_line(&self) -> String {
        format!("{} ({}): {}", self.name, self.location, self.description)
    }
}

struct IndexedMonument {
    monument: Monument,
    name_terms: HashSet<String>,
    location_terms: HashSet<String>,
    description_terms: HashSet<String>,
}

/// In-memory catalog loaded from a JSON array of monuments
pub struct MonumentCatalog {
    entries: Vec<IndexedMonument>,
    min_score: u32,
}

impl MonumentCatalog {
    pub fn new(monuments: Vec<Monument>) -> Self {
        let entries = monuments
            .into_iter()
            .map(|monument| IndexedMonument {
                name_terms: terms(&monument.name),
                location_terms: terms(&monument.location),
                description_terms: terms(&monument.description),
                monument,
            })
            .collect();
        Self {
            entries,
            min_score: DEFAULT_MIN_SCORE,
        }
    }

    /// Load the catalog from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, KnowledgeError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            KnowledgeError::catalog(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, KnowledgeError> {
        let monuments: Vec<Monument> = serde_json::from_str(raw)
            .map_err(|e| KnowledgeError::catalog(format!("Invalid catalog JSON: {e}")))?;
        Ok(Self::new(monuments))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rank entries against `query` and return at most `k` matches, best first.
    /// Ties keep catalog order.
    pub fn search(&self, query: &str, k: usize) -> Vec<Monument> {
        let query_terms = terms(query);
        if query_terms.is_empty() || k == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(u32, usize)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| (score(entry, &query_terms), idx))
            .filter(|(score, _)| *score >= self.min_score)
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        scored
            .into_iter()
            .take(k)
            .map(|(_, idx)| self.entries[idx].monument.clone())
            .collect()
    }
}

fn score(entry: &IndexedMonument, query_terms: &HashSet<String>) -> u32 {
    query_terms
        .iter()
        .map(|term| {
            if entry.name_terms.contains(term) {
                NAME_WEIGHT
            } else if entry.location_terms.contains(term) {
                LOCATION_WEIGHT
            } else if entry.description_terms.contains(term) {
                DESCRIPTION_WEIGHT
            } else {
                0
            }
        })
        .sum()
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.len() > 1)
        .map(str::to_lowercase)
        .filter(|word| !STOPWORDS.contains(&word.as_str()))
        .collect()
}
