//! Evidence items and the locators that point back at their origin.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Namespace for name-based evidence ids. An id is the v5 UUID of the
/// locator URI, so the id of an item can always be re-derived from its
/// locator.
const EVIDENCE_NAMESPACE: Uuid = Uuid::from_u128(0x5f0c_2a71_9b3e_4d8a_a1c6_7e2f_90b4_d35e);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvidenceId(pub Uuid);

impl EvidenceId {
    pub fn for_locator(locator: &Locator) -> Self {
        Self(Uuid::new_v5(&EVIDENCE_NAMESPACE, locator.to_string().as_bytes()))
    }
}

impl fmt::Display for EvidenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Document,
    Table,
    Relational,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Document => "document",
            SourceKind::Table => "table",
            SourceKind::Relational => "relational",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clinical evidence grade. Variants are declared weakest first so the
/// derived `Ord` puts `IA` on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "ungraded")]
    Ungraded,
    #[serde(rename = "III")]
    III,
    #[serde(rename = "IIB")]
    IIB,
    #[serde(rename = "IIA")]
    IIA,
    #[serde(rename = "IB")]
    IB,
    #[serde(rename = "IA")]
    IA,
}

impl Grade {
    pub fn as_str(self) -> &'static str {
        match self {
            Grade::IA => "IA",
            Grade::IB => "IB",
            Grade::IIA => "IIA",
            Grade::IIB => "IIB",
            Grade::III => "III",
            Grade::Ungraded => "ungraded",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grade {
    type Err = CoreError;

    /// Accepts Latin (`IIA`, `2a`) and Roman-numeral (`ⅡA`) spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .map(|c| match c {
                'Ⅰ' => "I".to_string(),
                'Ⅱ' => "II".to_string(),
                'Ⅲ' => "III".to_string(),
                '1' => "I".to_string(),
                '2' => "II".to_string(),
                '3' => "III".to_string(),
                other => other.to_ascii_uppercase().to_string(),
            })
            .collect::<String>()
            .replace([' ', '-', '_'], "");
        match normalized.as_str() {
            "IA" => Ok(Grade::IA),
            "IB" => Ok(Grade::IB),
            "IIA" => Ok(Grade::IIA),
            "IIB" => Ok(Grade::IIB),
            "III" => Ok(Grade::III),
            "" | "UNGRADED" => Ok(Grade::Ungraded),
            _ => Err(CoreError::InvalidGrade(s.to_string())),
        }
    }
}

/// Exact origin of an evidence item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Locator {
    Document { document: String, page: u32 },
    Table { table: String, first_row: u32, last_row: u32 },
    Relational { table: String, key_column: String, key: String },
}

impl Locator {
    pub fn source_kind(&self) -> SourceKind {
        match self {
            Locator::Document { .. } => SourceKind::Document,
            Locator::Table { .. } => SourceKind::Table,
            Locator::Relational { .. } => SourceKind::Relational,
        }
    }

    /// Identifier of the originating container (document name or table).
    pub fn origin(&self) -> &str {
        match self {
            Locator::Document { document, .. } => document,
            Locator::Table { table, .. } | Locator::Relational { table, .. } => table,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Document { document, page } => write!(f, "doc://{document}#page={page}"),
            Locator::Table {
                table,
                first_row,
                last_row,
            } => write!(f, "table://{table}#rows={first_row}-{last_row}"),
            Locator::Relational {
                table,
                key_column,
                key,
            } => write!(f, "rel://{table}/{key_column}={key}"),
        }
    }
}

impl FromStr for Locator {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidLocator(s.to_string());

        if let Some(rest) = s.strip_prefix("doc://") {
            let (document, fragment) = rest.rsplit_once('#').ok_or_else(invalid)?;
            let page = fragment
                .strip_prefix("page=")
                .and_then(|p| p.parse().ok())
                .ok_or_else(invalid)?;
            if document.is_empty() {
                return Err(invalid());
            }
            return Ok(Locator::Document {
                document: document.to_string(),
                page,
            });
        }

        if let Some(rest) = s.strip_prefix("table://") {
            let (table, fragment) = rest.rsplit_once('#').ok_or_else(invalid)?;
            let (first, last) = fragment
                .strip_prefix("rows=")
                .and_then(|r| r.split_once('-'))
                .ok_or_else(invalid)?;
            let first_row: u32 = first.parse().map_err(|_| invalid())?;
            let last_row: u32 = last.parse().map_err(|_| invalid())?;
            if table.is_empty() || last_row < first_row {
                return Err(invalid());
            }
            return Ok(Locator::Table {
                table: table.to_string(),
                first_row,
                last_row,
            });
        }

        if let Some(rest) = s.strip_prefix("rel://") {
            let (table, key_part) = rest.split_once('/').ok_or_else(invalid)?;
            let (key_column, key) = key_part.split_once('=').ok_or_else(invalid)?;
            if table.is_empty() || key_column.is_empty() || key.is_empty() {
                return Err(invalid());
            }
            return Ok(Locator::Relational {
                table: table.to_string(),
                key_column: key_column.to_string(),
                key: key.to_string(),
            });
        }

        Err(invalid())
    }
}

/// A single piece of retrieved evidence. Fields are private and the only
/// way to change anything is a consuming `with_*` call that returns a new
/// value, so an item handed out is never altered in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    id: EvidenceId,
    text: String,
    source_kind: SourceKind,
    locator: Locator,
    grade: Grade,
    title: Option<String>,
    recency_timestamp: Option<jiff::Timestamp>,
    superseded_candidate: bool,
    relevance: f32,
    terms: Vec<String>,
    secondary_locators: Vec<Locator>,
}

impl EvidenceItem {
    pub fn new(text: impl Into<String>, locator: Locator, grade: Grade) -> Self {
        Self {
            id: EvidenceId::for_locator(&locator),
            text: text.into(),
            source_kind: locator.source_kind(),
            locator,
            grade,
            title: None,
            recency_timestamp: None,
            superseded_candidate: false,
            relevance: 0.0,
            terms: Vec::new(),
            secondary_locators: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_recency(mut self, at: jiff::Timestamp) -> Self {
        self.recency_timestamp = Some(at);
        self
    }

    pub fn with_relevance(mut self, relevance: f32) -> Self {
        self.relevance = relevance;
        self
    }

    /// Canonical term codes this item is about.
    pub fn with_terms<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.terms = terms.into_iter().map(Into::into).collect();
        self.terms.sort();
        self.terms.dedup();
        self
    }

    pub fn flag_superseded(mut self) -> Self {
        self.superseded_candidate = true;
        self
    }

    /// Appends locators of merged duplicates. Ids are not affected.
    pub fn with_secondary_locators(mut self, locators: impl IntoIterator<Item = Locator>) -> Self {
        for locator in locators {
            if locator != self.locator && !self.secondary_locators.contains(&locator) {
                self.secondary_locators.push(locator);
            }
        }
        self
    }

    /// Merges term codes from a duplicate into this item.
    pub fn with_merged_terms(mut self, other: &[String]) -> Self {
        self.terms.extend(other.iter().cloned());
        self.terms.sort();
        self.terms.dedup();
        self
    }

    pub fn id(&self) -> EvidenceId {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source_kind(&self) -> SourceKind {
        self.source_kind
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn grade(&self) -> Grade {
        self.grade
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn recency_timestamp(&self) -> Option<jiff::Timestamp> {
        self.recency_timestamp
    }

    pub fn superseded_candidate(&self) -> bool {
        self.superseded_candidate
    }

    pub fn relevance(&self) -> f32 {
        self.relevance
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn mentions(&self, term: &str) -> bool {
        self.terms.iter().any(|t| t == term)
    }

    pub fn secondary_locators(&self) -> &[Locator] {
        &self.secondary_locators
    }
}
