//! Ranking and deduplication of retrieved evidence.
//!
//! Items are ordered by grade (strongest first), then current before
//! superseded candidates, then recency (newest first, undated last), then
//! retrieval relevance and finally id. Near-identical texts merge into the
//! higher-ranked item, whose secondary locators keep every merged origin.
//! When candidates span several source kinds, the returned window holds at
//! least one item of each kind that fits.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};

use medguide_core::models::evidence::{EvidenceItem, SourceKind};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Token Jaccard similarity at or above which two texts are merged.
    pub dedup_similarity: f64,
    pub limit: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            dedup_similarity: 0.85,
            limit: 12,
        }
    }
}

/// What the bundle is for. Items that mention more of `terms` win ties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryContext {
    pub terms: Vec<String>,
}

pub fn fuse(context: &QueryContext, candidates: Vec<EvidenceItem>, config: &FusionConfig) -> Vec<EvidenceItem> {
    let input = candidates.len();
    let mut ranked = candidates;
    ranked.sort_by(|a, b| rank_cmp(context, a, b));

    let deduped = dedup(ranked, config.dedup_similarity);
    let merged = input - deduped.len();

    let window = diversify(context, deduped, config.limit);
    debug!(input, merged, output = window.len(), "evidence fused");
    window
}

fn rank_cmp(context: &QueryContext, a: &EvidenceItem, b: &EvidenceItem) -> Ordering {
    b.grade()
        .cmp(&a.grade())
        .then_with(|| a.superseded_candidate().cmp(&b.superseded_candidate()))
        .then_with(|| match (a.recency_timestamp(), b.recency_timestamp()) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| coverage(context, b).cmp(&coverage(context, a)))
        .then_with(|| b.relevance().total_cmp(&a.relevance()))
        .then_with(|| a.id().0.cmp(&b.id().0))
}

fn coverage(context: &QueryContext, item: &EvidenceItem) -> usize {
    context.terms.iter().filter(|t| item.mentions(t)).count()
}

/// Input must already be in rank order, so the first of a group of
/// duplicates is the one that survives.
fn dedup(ranked: Vec<EvidenceItem>, threshold: f64) -> Vec<EvidenceItem> {
    let mut kept: Vec<(EvidenceItem, HashSet<String>)> = Vec::new();

    for item in ranked {
        let tokens = tokens(item.text());
        match kept
            .iter_mut()
            .find(|(_, existing)| jaccard(existing, &tokens) >= threshold)
        {
            Some((keeper, _)) => {
                let mut locators = vec![item.locator().clone()];
                locators.extend(item.secondary_locators().iter().cloned());
                let merged = keeper
                    .clone()
                    .with_secondary_locators(locators)
                    .with_merged_terms(item.terms());
                *keeper = merged;
            }
            None => kept.push((item, tokens)),
        }
    }
    kept.into_iter().map(|(item, _)| item).collect()
}

fn tokens(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let shared = a.intersection(b).count();
    let union = a.len() + b.len() - shared;
    shared as f64 / union as f64
}

fn diversify(context: &QueryContext, mut ranked: Vec<EvidenceItem>, limit: usize) -> Vec<EvidenceItem> {
    if ranked.len() <= limit {
        return ranked;
    }

    let all_kinds: BTreeSet<SourceKind> = ranked.iter().map(|i| i.source_kind()).collect();
    let mut window: Vec<EvidenceItem> = ranked.drain(..limit).collect();
    let mut window_kinds: BTreeSet<SourceKind> = window.iter().map(|i| i.source_kind()).collect();

    for kind in all_kinds.difference(&window_kinds.clone()) {
        if window_kinds.len() >= limit {
            break;
        }
        let Some(pos) = ranked.iter().position(|i| i.source_kind() == *kind) else {
            continue;
        };
        // evict the lowest-ranked item whose kind is still represented twice
        let Some(evict) = window.iter().rposition(|i| {
            window.iter().filter(|o| o.source_kind() == i.source_kind()).count() > 1
        }) else {
            break;
        };
        window.remove(evict);
        window.push(ranked.remove(pos));
        window_kinds.insert(*kind);
    }

    window.sort_by(|a, b| rank_cmp(context, a, b));
    window
}
