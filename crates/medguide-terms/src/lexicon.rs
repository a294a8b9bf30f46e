//! The versioned synonym lexicon.

use std::collections::HashMap;
use std::path::Path;

use medguide_core::models::term::TermCategory;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::TermsError;

const BUNDLED_LEXICON: &str = include_str!("../data/lexicon.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexiconEntry {
    pub code: String,
    pub label: String,
    pub category: TermCategory,
    #[serde(default)]
    pub drug_class: Option<String>,
    #[serde(default)]
    pub synonyms: Vec<String>,
}

impl LexiconEntry {
    /// Label and synonyms, lowercased.
    pub fn forms(&self) -> impl Iterator<Item = String> + '_ {
        std::iter::once(&self.label)
            .chain(self.synonyms.iter())
            .map(|s| s.to_ascii_lowercase())
    }
}

#[derive(Debug, Deserialize)]
struct LexiconFile {
    version: String,
    entries: Vec<LexiconEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub code: String,
    pub label: String,
    pub matched: String,
    pub confidence: f32,
}

#[derive(Debug, Clone)]
pub struct Lexicon {
    version: String,
    entries: Vec<LexiconEntry>,
    by_code: HashMap<String, usize>,
}

impl Lexicon {
    /// The lexicon compiled into the binary.
    pub fn bundled() -> Result<Self, TermsError> {
        Self::from_json(BUNDLED_LEXICON)
    }

    pub fn load(path: &Path) -> Result<Self, TermsError> {
        let raw = std::fs::read_to_string(path)?;
        let lexicon = Self::from_json(&raw)?;
        info!(path = %path.display(), version = %lexicon.version, "loaded lexicon");
        Ok(lexicon)
    }

    pub fn from_json(raw: &str) -> Result<Self, TermsError> {
        let file: LexiconFile = serde_json::from_str(raw)?;
        let mut by_code = HashMap::with_capacity(file.entries.len());
        for (idx, entry) in file.entries.iter().enumerate() {
            if by_code.insert(entry.code.clone(), idx).is_some() {
                return Err(TermsError::DuplicateCode(entry.code.clone()));
            }
        }
        Ok(Self {
            version: file.version,
            entries: file.entries,
            by_code,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn entries(&self) -> &[LexiconEntry] {
        &self.entries
    }

    pub fn entry(&self, code: &str) -> Option<&LexiconEntry> {
        self.by_code.get(code).map(|idx| &self.entries[*idx])
    }

    pub fn category_of(&self, code: &str) -> Option<TermCategory> {
        self.entry(code).map(|e| e.category)
    }

    pub fn aliases(&self, code: &str) -> Vec<&str> {
        self.entry(code)
            .map(|e| e.synonyms.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Labels and aliases for the given codes, for feeding a text search.
    /// Unknown codes are skipped.
    pub fn expand_query(&self, codes: &[String]) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for code in codes {
            let Some(entry) = self.entry(code) else {
                continue;
            };
            for form in entry.forms() {
                if !out.contains(&form) {
                    out.push(form);
                }
            }
        }
        out
    }

    /// Candidate codes for a partial term, best first.
    pub fn suggest(&self, partial: &str, limit: usize) -> Vec<Suggestion> {
        let needle = partial.trim().to_ascii_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        let mut out: Vec<Suggestion> = Vec::new();
        for entry in &self.entries {
            let label = entry.label.to_ascii_lowercase();
            let mut best: Option<(f32, String)> = None;
            for form in entry.forms() {
                let score = if form == needle {
                    1.0
                } else if label.contains(&needle) {
                    0.9
                } else if form.contains(&needle) {
                    0.8
                } else {
                    continue;
                };
                if best.as_ref().is_none_or(|(s, _)| score > *s) {
                    best = Some((score, form));
                }
            }
            if let Some((confidence, matched)) = best {
                out.push(Suggestion {
                    code: entry.code.clone(),
                    label: entry.label.clone(),
                    matched,
                    confidence,
                });
            }
        }
        out.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| a.code.cmp(&b.code))
        });
        out.truncate(limit);
        out
    }

    /// Adds an alias for an existing code. Runs at engine start only.
    pub fn add_mapping(&mut self, alias: &str, code: &str) -> Result<(), TermsError> {
        let normalized = alias.trim().to_ascii_lowercase();
        if let Some(existing) = self
            .entries
            .iter()
            .find(|e| e.forms().any(|f| f == normalized))
        {
            return Err(TermsError::DuplicateAlias {
                alias: alias.to_string(),
                existing: existing.code.clone(),
            });
        }
        let idx = *self
            .by_code
            .get(code)
            .ok_or_else(|| TermsError::UnknownCode(code.to_string()))?;
        self.entries[idx].synonyms.push(alias.trim().to_string());
        Ok(())
    }
}
