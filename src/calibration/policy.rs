//! Recommendation policy
//!
//! Every (classifier, division) computes the same set of candidate
//! thresholds; the policy decides which one is published as the RecHHF.
//! Decisions are hand-tuned per classifier and kept in a static table
//! (`data/rec_hhf_policy.json`). Undecided keys fall back to:
//!
//! 1. the 85% candidate (`r5`) for divisions known to have too few scores
//! 2. the configured default (`r1`, the 95% candidate) otherwise

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::ConfigError;

const BUILTIN_POLICY: &str = include_str!("../../data/rec_hhf_policy.json");

/// Which candidate threshold becomes the published recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationChoice {
    /// 1st percentile at 95%
    #[default]
    R1,
    /// 4.75th percentile at 85%
    R5,
    /// 14.5th percentile at 75%
    R15,
    Wbl1,
    Wbl3,
    Wbl5,
    Wbl15,
}

impl RecommendationChoice {
    pub fn tag(self) -> &'static str {
        match self {
            RecommendationChoice::R1 => "r1",
            RecommendationChoice::R5 => "r5",
            RecommendationChoice::R15 => "r15",
            RecommendationChoice::Wbl1 => "wbl1",
            RecommendationChoice::Wbl3 => "wbl3",
            RecommendationChoice::Wbl5 => "wbl5",
            RecommendationChoice::Wbl15 => "wbl15",
        }
    }

    /// Pick this choice's value out of the candidates
    pub fn pick(self, candidates: &Candidates) -> f64 {
        match self {
            RecommendationChoice::R1 => candidates.r1,
            RecommendationChoice::R5 => candidates.r5,
            RecommendationChoice::R15 => candidates.r15,
            RecommendationChoice::Wbl1 => candidates.wbl1,
            RecommendationChoice::Wbl3 => candidates.wbl3,
            RecommendationChoice::Wbl5 => candidates.wbl5,
            RecommendationChoice::Wbl15 => candidates.wbl15,
        }
    }
}

impl fmt::Display for RecommendationChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Every candidate threshold computed for one key
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Candidates {
    pub r1: f64,
    pub r5: f64,
    pub r15: f64,
    pub wbl1: f64,
    pub wbl3: f64,
    pub wbl5: f64,
    pub wbl15: f64,
}

/// Per-division, per-classifier choice table with fallbacks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationPolicy {
    /// Divisions that fall back to `r5` when undecided
    #[serde(default)]
    pub low_sample_divisions: Vec<String>,
    #[serde(default)]
    pub default_choice: RecommendationChoice,
    /// division -> classifier -> choice
    #[serde(default)]
    pub decided: BTreeMap<String, BTreeMap<String, RecommendationChoice>>,
}

impl Default for RecommendationPolicy {
    fn default() -> Self {
        Self {
            low_sample_divisions: Vec::new(),
            default_choice: RecommendationChoice::R1,
            decided: BTreeMap::new(),
        }
    }
}

impl RecommendationPolicy {
    /// Policy table shipped with the crate
    pub fn builtin() -> Result<Self, ConfigError> {
        serde_json::from_str(BUILTIN_POLICY)
            .map_err(|e| ConfigError::Invalid(format!("built-in policy: {}", e)))
    }

    pub fn choice_for(&self, classifier: &str, division: &str) -> RecommendationChoice {
        if let Some(choice) = self
            .decided
            .get(division)
            .and_then(|by_classifier| by_classifier.get(classifier))
        {
            return *choice;
        }

        if self.low_sample_divisions.iter().any(|d| d == division) {
            return RecommendationChoice::R5;
        }

        self.default_choice
    }

    /// Number of explicitly decided (division, classifier) entries
    pub fn decided_count(&self) -> usize {
        self.decided.values().map(BTreeMap::len).sum()
    }
}
