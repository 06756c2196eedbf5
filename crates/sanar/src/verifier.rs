//! Match verification: pick one element when a descriptor matches several.
//!
//! Each candidate element's snapshot is scored against the reference
//! snapshot (the last element this locator resolved to). A candidate whose
//! tag differs from the reference scores 0. Otherwise the score is the
//! weighted mean of per-attribute similarities over the weighted attributes
//! present in the reference:
//!
//! - `text`: normalized Levenshtein on whitespace-normalized, lowercased text
//! - `class`: Jaccard overlap of class tokens
//! - `position`: closeness of DOM depth and sibling index
//! - anything else: normalized Levenshtein on the raw value
//!
//! Scoring is deterministic, so disambiguating the same inputs twice gives
//! the same answer.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::{HealingConfig, POSITION_WEIGHT};
use crate::snapshot::{AttributeSnapshot, CLASS, TEXT};

/// Outcome of disambiguating several matching elements
#[derive(Debug, Clone, PartialEq)]
pub enum Disambiguation {
    /// One element clearly scored best
    Unique {
        /// Index into the candidate list
        index: usize,
        /// Its score
        score: f64,
    },
    /// The top two scores are within the tie margin
    Ambiguous {
        /// All scores, best first
        scores: Vec<f64>,
    },
    /// Even the best score is under the minimum
    BelowThreshold {
        /// Best score seen
        best: f64,
    },
}

impl Disambiguation {
    /// Index of the chosen element, if one was chosen
    #[must_use]
    pub const fn chosen(&self) -> Option<usize> {
        match self {
            Self::Unique { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// Scores candidate snapshots against a reference snapshot
#[derive(Debug, Clone)]
pub struct MatchVerifier {
    weights: BTreeMap<String, f64>,
    tie_margin: f64,
    min_score: f64,
}

impl Default for MatchVerifier {
    fn default() -> Self {
        Self::new(&HealingConfig::default())
    }
}

impl MatchVerifier {
    /// Create a verifier from the weights, tie margin and minimum score
    #[must_use]
    pub fn new(config: &HealingConfig) -> Self {
        Self {
            weights: config.attribute_weights.clone(),
            tie_margin: config.tie_margin,
            min_score: config.min_score,
        }
    }

    /// Similarity of `candidate` to `reference`, in `[0, 1]`
    #[must_use]
    pub fn score(&self, candidate: &AttributeSnapshot, reference: &AttributeSnapshot) -> f64 {
        if let Some(tag) = reference.tag() {
            if candidate.tag() != Some(tag) {
                return 0.0;
            }
        }

        let mut total = 0.0;
        let mut weight_sum = 0.0;
        for (key, weight) in self.weights.iter().filter(|(_, w)| **w > 0.0) {
            let similarity = match key.as_str() {
                TEXT => reference
                    .text()
                    .map(|text| text_similarity(&text, candidate.text().as_deref())),
                CLASS => reference
                    .get(CLASS)
                    .map(|_| class_similarity(candidate, reference)),
                POSITION_WEIGHT => position_similarity(candidate, reference),
                other => reference.get(other).map(|value| {
                    candidate
                        .get(other)
                        .map_or(0.0, |c| strsim::normalized_levenshtein(value, c))
                }),
            };
            if let Some(similarity) = similarity {
                total += weight * similarity;
                weight_sum += weight;
            }
        }

        if weight_sum > 0.0 {
            (total / weight_sum).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Scores of every candidate, best first
    #[must_use]
    pub fn scores(&self, candidates: &[AttributeSnapshot], reference: &AttributeSnapshot) -> Vec<f64> {
        let mut scores: Vec<f64> = candidates.iter().map(|c| self.score(c, reference)).collect();
        scores.sort_by(|a, b| b.total_cmp(a));
        scores
    }

    /// Choose among `candidates` by similarity to `reference`
    #[must_use]
    pub fn disambiguate(
        &self,
        candidates: &[AttributeSnapshot],
        reference: &AttributeSnapshot,
    ) -> Disambiguation {
        let mut ranked: Vec<(usize, f64)> = candidates
            .iter()
            .map(|c| self.score(c, reference))
            .enumerate()
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        let Some(&(index, best)) = ranked.first() else {
            return Disambiguation::BelowThreshold { best: 0.0 };
        };
        if best < self.min_score {
            return Disambiguation::BelowThreshold { best };
        }
        if let Some(&(_, second)) = ranked.get(1) {
            if best - second <= self.tie_margin {
                return Disambiguation::Ambiguous {
                    scores: ranked.into_iter().map(|(_, s)| s).collect(),
                };
            }
        }
        Disambiguation::Unique { index, score: best }
    }
}

fn text_similarity(reference: &str, candidate: Option<&str>) -> f64 {
    candidate.map_or(0.0, |c| {
        strsim::normalized_levenshtein(&reference.to_lowercase(), &c.to_lowercase())
    })
}

fn class_similarity(candidate: &AttributeSnapshot, reference: &AttributeSnapshot) -> f64 {
    let a: BTreeSet<&str> = reference.classes().collect();
    let b: BTreeSet<&str> = candidate.classes().collect();
    let union = a.union(&b).count();
    if union == 0 {
        return 1.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

fn position_similarity(candidate: &AttributeSnapshot, reference: &AttributeSnapshot) -> Option<f64> {
    let closeness = |r: Option<u32>, c: Option<u32>| {
        r.map(|r| c.map_or(0.0, |c| 1.0 / (1.0 + f64::from(r.abs_diff(c)))))
    };
    let parts: Vec<f64> = [
        closeness(reference.depth(), candidate.depth()),
        closeness(reference.index(), candidate.index()),
    ]
    .into_iter()
    .flatten()
    .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.iter().sum::<f64>() / parts.len() as f64)
    }
}
