//! Pooled populations and percentile-matching recommendations
//!
//! A pooled population is every valid score for one (classifier, division)
//! after division expansion, sorted by HF descending. Each entry's percentile
//! is the share of the population that scored strictly higher:
//! `100 * (entries with higher HF) / population size`. The best score sits at
//! percentile 0 and tied scores share a percentile.
//!
//! The recommender picks the sample nearest a target percentile and scales
//! it so that sample lands on a target percent of the recommended HHF. It is
//! a nearest-sample heuristic, not interpolation: sparse populations give
//! coarse answers, which is why the curve fit runs alongside it.

use serde::{Deserialize, Serialize};

use crate::types::ClassifierDivision;
use crate::utils::numbers::round4;

/// One score inside a pooled population
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PooledScore {
    pub member_number: String,
    /// Division the score was shot in (may be a source division)
    pub division: String,
    /// HF used for calibration (minor-equivalent where the division needs it)
    pub hf: f64,
    /// Share of the population with a strictly higher HF, 0..100
    pub percentile: f64,
    pub timestamp: Option<i64>,
}

impl PooledScore {
    pub fn new(member_number: impl Into<String>, division: impl Into<String>, hf: f64) -> Self {
        Self {
            member_number: member_number.into(),
            division: division.into(),
            hf,
            percentile: 0.0,
            timestamp: None,
        }
    }
}

/// Sorted, percentile-annotated scores for one key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PooledPopulation {
    pub key: ClassifierDivision,
    pub scores: Vec<PooledScore>,
    /// Scores dropped because their HF failed reconstruction
    pub invalid_runs: usize,
}

impl PooledPopulation {
    /// Sort by HF descending (stable) and annotate percentiles
    pub fn new(key: ClassifierDivision, mut scores: Vec<PooledScore>, invalid_runs: usize) -> Self {
        scores.sort_by(|a, b| b.hf.total_cmp(&a.hf));
        annotate_percentiles(&mut scores);
        Self {
            key,
            scores,
            invalid_runs,
        }
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// HFs in population order (descending)
    pub fn hfs(&self) -> Vec<f64> {
        self.scores.iter().map(|s| s.hf).collect()
    }

    /// HFs of the entries shot in one division
    pub fn hfs_for_division(&self, division: &str) -> Vec<f64> {
        self.scores
            .iter()
            .filter(|s| s.division == division)
            .map(|s| s.hf)
            .collect()
    }

    /// Distinct divisions present, in order of first appearance
    pub fn divisions(&self) -> Vec<String> {
        let mut divisions: Vec<String> = Vec::new();
        for s in &self.scores {
            if !divisions.contains(&s.division) {
                divisions.push(s.division.clone());
            }
        }
        divisions
    }
}

/// Percentile per entry of a descending-sorted slice
pub fn annotate_percentiles(sorted_desc: &mut [PooledScore]) {
    let n = sorted_desc.len() as f64;
    let mut rank = 0usize;
    for i in 0..sorted_desc.len() {
        if i > 0 && sorted_desc[i].hf != sorted_desc[i - 1].hf {
            rank = i;
        }
        sorted_desc[i].percentile = 100.0 * rank as f64 / n;
    }
}

/// A (percentile, percent) pair to calibrate against
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentileTarget {
    /// Share of the population expected to beat the sample
    pub percentile: f64,
    /// Percent of HHF that sample should represent
    pub percent: f64,
}

/// Grand master: top 1% should reach 95%
pub const GM_TARGET: PercentileTarget = PercentileTarget { percentile: 1.0, percent: 95.0 };
/// Master: top 4.75% should reach 85%
pub const M_TARGET: PercentileTarget = PercentileTarget { percentile: 4.75, percent: 85.0 };
/// A class: top 14.5% should reach 75%
pub const A_TARGET: PercentileTarget = PercentileTarget { percentile: 14.5, percent: 75.0 };

/// Entry whose percentile is closest to the target; the first one wins ties
pub fn closest_to_percentile(
    scores: &[PooledScore],
    target_percentile: f64,
) -> Option<&PooledScore> {
    let mut best: Option<(&PooledScore, f64)> = None;
    for s in scores {
        let distance = (s.percentile - target_percentile).abs();
        match best {
            Some((_, d)) if distance >= d => {}
            _ => best = Some((s, distance)),
        }
    }
    best.map(|(s, _)| s)
}

/// Recommended HHF from percentile matching
///
/// `hf * (1 + (percentile - target_percentile) / 100) * (100 / percent)`,
/// rounded to 4 decimals. The miss correction nudges the result up when the
/// chosen sample sits at a higher percentile than targeted (more shooters
/// beat it) and down when lower. An empty population recommends 0.
pub fn recommended_hhf(scores: &[PooledScore], target_percentile: f64, target_percent: f64) -> f64 {
    let Some(closest) = closest_to_percentile(scores, target_percentile) else {
        return 0.0;
    };

    let miss_correction = 1.0 + (closest.percentile - target_percentile) / 100.0;
    let percent_scale = 100.0 / target_percent;

    round4(closest.hf * miss_correction * percent_scale)
}

/// [`recommended_hhf`] for a predefined target
pub fn recommended_for_target(scores: &[PooledScore], target: PercentileTarget) -> f64 {
    recommended_hhf(scores, target.percentile, target.percent)
}
