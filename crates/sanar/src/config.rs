//! Healing configuration.
//!
//! Loaded from YAML or JSON (chosen by file extension) with camelCase keys.
//! Every field has a default, so an empty document is a valid configuration:
//!
//! ```yaml
//! maxCandidates: 20
//! tieMargin: 0.05
//! minScore: 0.45
//! attributeWeights:
//!   text: 0.5
//!   id: 0.2
//! perResolutionTimeoutMs: 10000
//! providerTimeoutMs: 2000
//! healLog: reports/healing_log.jsonl
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::result::{SanarError, SanarResult};

/// Weight key for structural closeness (depth and sibling index)
pub const POSITION_WEIGHT: &str = "position";

/// Default cap on generated candidates per resolution
pub const DEFAULT_MAX_CANDIDATES: usize = 20;
/// Default score gap below which two candidates tie
pub const DEFAULT_TIE_MARGIN: f64 = 0.05;
/// Default lowest score a verified candidate may have
pub const DEFAULT_MIN_SCORE: f64 = 0.45;
/// Default per-resolution budget
pub const DEFAULT_RESOLUTION_TIMEOUT_MS: u64 = 10_000;
/// Default per-query budget
pub const DEFAULT_PROVIDER_TIMEOUT_MS: u64 = 2_000;

/// Default attribute weights used by the match verifier
#[must_use]
pub fn default_attribute_weights() -> BTreeMap<String, f64> {
    [
        ("text", 0.5),
        ("id", 0.2),
        ("name", 0.15),
        ("class", 0.1),
        ("aria-label", 0.05),
        (POSITION_WEIGHT, 0.1),
        ("type", 0.05),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

/// Configuration for candidate generation, verification and time budgets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct HealingConfig {
    /// Maximum generated candidates tried per resolution
    pub max_candidates: usize,
    /// Top-two score gap at or below which a match is ambiguous
    pub tie_margin: f64,
    /// Best score below which no candidate is accepted
    pub min_score: f64,
    /// Attribute name → weight used when scoring candidates
    pub attribute_weights: BTreeMap<String, f64>,
    /// Wall-clock budget for one whole resolution
    pub per_resolution_timeout_ms: u64,
    /// Budget for one provider query
    pub provider_timeout_ms: u64,
    /// Heal journal path (JSON lines); no journal when unset
    pub heal_log: Option<PathBuf>,
}

impl Default for HealingConfig {
    fn default() -> Self {
        Self {
            max_candidates: DEFAULT_MAX_CANDIDATES,
            tie_margin: DEFAULT_TIE_MARGIN,
            min_score: DEFAULT_MIN_SCORE,
            attribute_weights: default_attribute_weights(),
            per_resolution_timeout_ms: DEFAULT_RESOLUTION_TIMEOUT_MS,
            provider_timeout_ms: DEFAULT_PROVIDER_TIMEOUT_MS,
            heal_log: None,
        }
    }
}

impl HealingConfig {
    /// Create a configuration with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the candidate cap
    #[must_use]
    pub const fn with_max_candidates(mut self, max: usize) -> Self {
        self.max_candidates = max;
        self
    }

    /// Set the tie margin
    #[must_use]
    pub fn with_tie_margin(mut self, margin: f64) -> Self {
        self.tie_margin = margin;
        self
    }

    /// Set the minimum accepted score
    #[must_use]
    pub fn with_min_score(mut self, score: f64) -> Self {
        self.min_score = score;
        self
    }

    /// Set one attribute weight
    #[must_use]
    pub fn with_attribute_weight(mut self, attribute: impl Into<String>, weight: f64) -> Self {
        self.attribute_weights.insert(attribute.into(), weight);
        self
    }

    /// Set the per-resolution budget
    #[must_use]
    pub const fn with_resolution_timeout(mut self, timeout_ms: u64) -> Self {
        self.per_resolution_timeout_ms = timeout_ms;
        self
    }

    /// Set the per-query budget
    #[must_use]
    pub const fn with_provider_timeout(mut self, timeout_ms: u64) -> Self {
        self.provider_timeout_ms = timeout_ms;
        self
    }

    /// Enable the heal journal
    #[must_use]
    pub fn with_heal_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.heal_log = Some(path.into());
        self
    }

    /// Per-resolution budget as a duration
    #[must_use]
    pub const fn resolution_timeout(&self) -> Duration {
        Duration::from_millis(self.per_resolution_timeout_ms)
    }

    /// Per-query budget as a duration
    #[must_use]
    pub const fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }

    /// Weight for an attribute, 0.0 when not configured
    #[must_use]
    pub fn weight(&self, attribute: &str) -> f64 {
        self.attribute_weights.get(attribute).copied().unwrap_or(0.0)
    }

    /// Parse YAML
    pub fn from_yaml_str(yaml: &str) -> SanarResult<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Parse JSON
    pub fn from_json_str(json: &str) -> SanarResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load and validate a file; `.json` is read as JSON, anything else as YAML
    pub fn from_path(path: &Path) -> SanarResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config = if is_json {
            Self::from_json_str(&content)?
        } else {
            Self::from_yaml_str(&content)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> SanarResult<()> {
        if self.max_candidates == 0 {
            return Err(SanarError::config("maxCandidates must be at least 1"));
        }
        if !(0.0..1.0).contains(&self.tie_margin) {
            return Err(SanarError::config(format!(
                "tieMargin must be in [0, 1), got {}",
                self.tie_margin
            )));
        }
        if !(0.0..=1.0).contains(&self.min_score) {
            return Err(SanarError::config(format!(
                "minScore must be in [0, 1], got {}",
                self.min_score
            )));
        }
        if let Some((name, weight)) = self
            .attribute_weights
            .iter()
            .find(|(_, w)| !w.is_finite() || **w < 0.0)
        {
            return Err(SanarError::config(format!(
                "attribute weight '{name}' must be a non-negative number, got {weight}"
            )));
        }
        if !self.attribute_weights.values().any(|w| *w > 0.0) {
            return Err(SanarError::config(
                "attributeWeights needs at least one positive weight",
            ));
        }
        if self.per_resolution_timeout_ms == 0 {
            return Err(SanarError::config("perResolutionTimeoutMs must be positive"));
        }
        if self.provider_timeout_ms == 0 {
            return Err(SanarError::config("providerTimeoutMs must be positive"));
        }
        Ok(())
    }
}
