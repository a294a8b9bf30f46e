//! medguide-terms
//!
//! Maps free-text clinical wording (English and Chinese synonyms,
//! abbreviations, brand names) to the canonical codes the rule engines use,
//! and pulls structured measurements (age, blood pressure, labs) out of an
//! utterance.

pub mod error;
pub mod extract;
pub mod lexicon;
pub mod normalize;

pub use crate::error::TermsError;
pub use crate::extract::{extract_facts, ExtractedFacts};
pub use crate::lexicon::{Lexicon, LexiconEntry, Suggestion};
pub use crate::normalize::{Fragment, Normalization, Normalizer};
