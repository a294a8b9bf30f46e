//! Utterance normalization.
//!
//! Latin-script forms match whole words, case-insensitively; forms
//! containing CJK characters match as substrings. A single-word form of six
//! or more letters also matches a word sharing a six-letter prefix with it
//! (`diabetic` for `diabetes`) at reduced confidence. Where spans overlap
//! the longest wins. Candidates for the identical span with different codes
//! are all kept and reported as an ambiguity group.

use std::collections::BTreeMap;

use medguide_core::models::term::{AmbiguityGroup, CanonicalTerm, Span};
use serde::Serialize;
use tracing::debug;

use crate::lexicon::{Lexicon, LexiconEntry};

const EXACT_CONFIDENCE: f32 = 1.0;
const STEM_CONFIDENCE: f32 = 0.8;
const STEM_PREFIX: usize = 6;
const NEGATION_WINDOW: usize = 3;
const LATIN_NEGATIONS: [&str; 6] = ["no", "denies", "denied", "without", "not", "never"];
const CJK_NEGATIONS: [&str; 4] = ["无", "否认", "没有", "未"];

/// Text the lexicon did not recognize. Kept so downstream consumers see the
/// whole utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fragment {
    pub text: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Normalization {
    pub raw: String,
    /// Recognized terms ordered by position, ambiguous candidates included.
    pub terms: Vec<CanonicalTerm>,
    pub ambiguities: Vec<AmbiguityGroup>,
    pub unmatched: Vec<Fragment>,
}

impl Normalization {
    /// Distinct codes of non-negated, unambiguous terms.
    pub fn asserted_codes(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for term in &self.terms {
            if term.negated || self.is_ambiguous(&term.span) {
                continue;
            }
            if !out.contains(&term.code.as_str()) {
                out.push(&term.code);
            }
        }
        out
    }

    pub fn is_ambiguous(&self, span: &Span) -> bool {
        self.ambiguities.iter().any(|g| g.span == *span)
    }
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    lexicon: Lexicon,
    min_confidence: f32,
}

struct Candidate<'a> {
    entry: &'a LexiconEntry,
    span: Span,
    confidence: f32,
}

impl Normalizer {
    pub fn new(lexicon: Lexicon, min_confidence: f32) -> Self {
        Self {
            lexicon,
            min_confidence,
        }
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    pub fn normalize(&self, raw: &str) -> Normalization {
        // ASCII lowercasing keeps byte offsets aligned with `raw`.
        let lowered = raw.to_ascii_lowercase();
        let candidates = self.candidates(&lowered);

        let mut by_span: BTreeMap<Span, Vec<Candidate<'_>>> = BTreeMap::new();
        for candidate in candidates {
            if candidate.confidence < self.min_confidence {
                continue;
            }
            let group = by_span.entry(candidate.span).or_default();
            match group.iter_mut().find(|c| c.entry.code == candidate.entry.code) {
                Some(existing) if existing.confidence >= candidate.confidence => {}
                Some(existing) => *existing = candidate,
                None => group.push(candidate),
            }
        }

        let mut spans: Vec<Span> = by_span.keys().copied().collect();
        spans.sort_by(|a, b| b.len().cmp(&a.len()).then(a.start.cmp(&b.start)));
        let mut accepted: Vec<Span> = Vec::new();
        for span in spans {
            if accepted.iter().all(|a| !a.overlaps(&span)) {
                accepted.push(span);
            }
        }
        accepted.sort();

        let mut terms = Vec::new();
        let mut ambiguities = Vec::new();
        for span in &accepted {
            let Some(mut group) = by_span.remove(span) else {
                continue;
            };
            group.sort_by(|a, b| {
                b.confidence
                    .total_cmp(&a.confidence)
                    .then_with(|| a.entry.code.cmp(&b.entry.code))
            });
            let negated = is_negated(&lowered, *span);
            let matched_text = raw[span.start..span.end].to_string();
            let group_terms: Vec<CanonicalTerm> = group
                .iter()
                .map(|c| CanonicalTerm {
                    code: c.entry.code.clone(),
                    label: c.entry.label.clone(),
                    category: c.entry.category,
                    drug_class: c.entry.drug_class.clone(),
                    confidence: c.confidence,
                    matched_text: matched_text.clone(),
                    span: *span,
                    negated,
                })
                .collect();
            if group_terms.len() > 1 {
                ambiguities.push(AmbiguityGroup {
                    matched_text: matched_text.clone(),
                    span: *span,
                    candidates: group_terms.clone(),
                });
            }
            terms.extend(group_terms);
        }

        let unmatched = unmatched_fragments(raw, &accepted);
        debug!(
            terms = terms.len(),
            ambiguities = ambiguities.len(),
            unmatched = unmatched.len(),
            "normalized utterance"
        );
        Normalization {
            raw: raw.to_string(),
            terms,
            ambiguities,
            unmatched,
        }
    }

    fn candidates<'a>(&'a self, lowered: &str) -> Vec<Candidate<'a>> {
        let mut out = Vec::new();
        let words = latin_words(lowered);
        for entry in self.lexicon.entries() {
            for form in entry.forms() {
                if form.is_empty() {
                    continue;
                }
                let cjk = form.chars().any(is_cjk);
                for (start, _) in lowered.match_indices(form.as_str()) {
                    let end = start + form.len();
                    if cjk || on_word_boundary(lowered, start, end) {
                        out.push(Candidate {
                            entry,
                            span: Span { start, end },
                            confidence: EXACT_CONFIDENCE,
                        });
                    }
                }
                if !cjk && form.len() >= STEM_PREFIX && form.bytes().all(|b| b.is_ascii_alphabetic()) {
                    for &(start, end) in &words {
                        let word = &lowered[start..end];
                        if word != form
                            && word.len() >= STEM_PREFIX
                            && common_prefix(word, &form) >= STEM_PREFIX
                        {
                            out.push(Candidate {
                                entry,
                                span: Span { start, end },
                                confidence: STEM_CONFIDENCE,
                            });
                        }
                    }
                }
            }
        }
        out
    }
}

fn is_cjk(c: char) -> bool {
    matches!(c, '\u{4e00}'..='\u{9fff}' | '\u{3400}'..='\u{4dbf}')
}

fn on_word_boundary(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    let is_word = |c: char| c.is_ascii_alphanumeric();
    !before.is_some_and(is_word) && !after.is_some_and(is_word)
}

fn latin_words(text: &str) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut start: Option<usize> = None;
    for (idx, c) in text.char_indices() {
        if c.is_ascii_alphabetic() {
            start.get_or_insert(idx);
        } else if let Some(s) = start.take() {
            out.push((s, idx));
        }
    }
    if let Some(s) = start {
        out.push((s, text.len()));
    }
    out
}

fn common_prefix(a: &str, b: &str) -> usize {
    a.bytes().zip(b.bytes()).take_while(|(x, y)| x == y).count()
}

fn is_clause_break(c: char) -> bool {
    matches!(c, '.' | ',' | ';' | ':' | '!' | '?' | '\n' | '。' | '，' | '；' | '：' | '！' | '？' | '、')
}

/// Negation cue within the last few words of the same clause.
fn is_negated(lowered: &str, span: Span) -> bool {
    let prefix = &lowered[..span.start];
    let clause_start = prefix
        .char_indices()
        .rev()
        .find(|(_, c)| is_clause_break(*c))
        .map(|(idx, c)| idx + c.len_utf8())
        .unwrap_or(0);
    let clause = &prefix[clause_start..];

    let tokens: Vec<&str> = clause.split_whitespace().collect();
    let window = &tokens[tokens.len().saturating_sub(NEGATION_WINDOW)..];
    if window.iter().any(|t| {
        let t = t.trim_matches(|c: char| !c.is_ascii_alphanumeric());
        LATIN_NEGATIONS.contains(&t)
    }) {
        return true;
    }
    if window.windows(2).any(|w| w[0] == "negative" && w[1] == "for") {
        return true;
    }

    let tail: String = {
        let chars: Vec<char> = clause.trim_end().chars().collect();
        chars[chars.len().saturating_sub(4)..].iter().collect()
    };
    CJK_NEGATIONS.iter().any(|cue| tail.contains(cue))
}

fn unmatched_fragments(raw: &str, accepted: &[Span]) -> Vec<Fragment> {
    let mut out = Vec::new();
    let mut cursor = 0;
    let mut gaps: Vec<(usize, usize)> = Vec::new();
    for span in accepted {
        if span.start > cursor {
            gaps.push((cursor, span.start));
        }
        cursor = cursor.max(span.end);
    }
    if cursor < raw.len() {
        gaps.push((cursor, raw.len()));
    }
    for (gap_start, gap_end) in gaps {
        let gap = &raw[gap_start..gap_end];
        let mut piece_start = gap_start;
        for (idx, c) in gap.char_indices() {
            if is_clause_break(c) {
                push_fragment(raw, piece_start, gap_start + idx, &mut out);
                piece_start = gap_start + idx + c.len_utf8();
            }
        }
        push_fragment(raw, piece_start, gap_end, &mut out);
    }
    out
}

fn push_fragment(raw: &str, start: usize, end: usize, out: &mut Vec<Fragment>) {
    let piece = &raw[start..end];
    let trimmed = piece.trim();
    if trimmed.is_empty() || trimmed.chars().all(|c| !c.is_alphanumeric()) {
        return;
    }
    let offset = piece.len() - piece.trim_start().len();
    out.push(Fragment {
        text: trimmed.to_string(),
        span: Span {
            start: start + offset,
            end: start + offset + trimmed.len(),
        },
    });
}
