//! Calibration quality
//!
//! Two independent signals, both comparative (for ranking classifiers against
//! each other) rather than bounded scores.
//!
//! **Percentile distance**: for each percent-of-RecHHF level, the percentile
//! of the population that reached it. Ideal ranks are 1 at 95%, 5 at 85%,
//! 15 at 75%, 45 at 60% and 85 at 40%. Weighted absolute misses are
//! subtracted from 100 and a sample size offset is added:
//!
//! | runs      | offset |
//! |-----------|--------|
//! | < 200     | -40    |
//! | < 400     | -20    |
//! | < 750     | -10    |
//! | < 1400    | -5     |
//! | otherwise | 0      |
//!
//! **Correlation**: Pearson correlation between HF and an independent skill
//! indicator (ELO, recommended classification percent), one best score per
//! member, combined as `(200 * elo + 100 * class) / 2.4 - super MSE`.

use rustc_hash::FxHashSet;

use crate::calibration::percentile::{PooledPopulation, PooledScore};
use crate::store::SkillLookup;
use crate::types::{QualityRecord, RecHhf};
use crate::utils::numbers::{percent, positive_or_minus_one};
use crate::utils::statistics::pearson;

/// (percent of RecHHF, ideal percentile, weight)
pub const QUALITY_TARGETS: [(f64, f64, f64); 5] = [
    (95.0, 1.0, 10.0),
    (85.0, 5.0, 4.0),
    (75.0, 15.0, 1.0),
    (60.0, 45.0, 0.5),
    (40.0, 85.0, 0.3),
];

/// Correlations need at least this many members
pub const MIN_CORRELATION_POINTS: usize = 4;

/// Quality penalty for small populations
pub fn sample_size_offset(runs: usize) -> f64 {
    match runs {
        0..=199 => -40.0,
        200..=399 => -20.0,
        400..=749 => -10.0,
        750..=1399 => -5.0,
        _ => 0.0,
    }
}

/// Percentile at which the population stops reaching `target_percent` of `rec_hhf`
///
/// Index of the last score (HF descending) with `100 * hf / rec_hhf >=
/// target_percent`, as a percent of the population. -1 when no score
/// reaches it or there is no RecHHF.
pub fn inverse_percentile(hfs_desc: &[f64], rec_hhf: f64, target_percent: f64) -> f64 {
    if rec_hhf <= 0.0 || hfs_desc.is_empty() {
        return -1.0;
    }
    match hfs_desc.iter().rposition(|hf| 100.0 * hf / rec_hhf >= target_percent) {
        Some(index) => positive_or_minus_one(percent(index as f64, hfs_desc.len() as f64)),
        None => -1.0,
    }
}

/// Inverse percentiles at every reported level
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InversePercentiles {
    pub p100: f64,
    pub p95: f64,
    pub p85: f64,
    pub p75: f64,
    pub p60: f64,
    pub p40: f64,
}

impl InversePercentiles {
    pub fn compute(hfs_desc: &[f64], rec_hhf: f64) -> Self {
        let at = |p| inverse_percentile(hfs_desc, rec_hhf, p);
        Self {
            p100: at(100.0),
            p95: at(95.0),
            p85: at(85.0),
            p75: at(75.0),
            p60: at(60.0),
            p40: at(40.0),
        }
    }

    /// Figures in [`QUALITY_TARGETS`] order
    fn targets(&self) -> [f64; 5] {
        [self.p95, self.p85, self.p75, self.p60, self.p40]
    }
}

/// Percentile-distance quality including the sample size offset
pub fn percentile_distance_quality(inverse: &InversePercentiles, runs: usize) -> f64 {
    let distance: f64 = QUALITY_TARGETS
        .iter()
        .zip(inverse.targets())
        .map(|(&(_, ideal, weight), actual)| weight * (ideal - actual).abs())
        .sum();

    sample_size_offset(runs) + percent(100.0 - distance, 100.0)
}

/// One member's score paired with a skill indicator
#[derive(Debug, Clone, PartialEq)]
pub struct SkillPoint {
    pub member_number: String,
    pub indicator: f64,
    pub hf: f64,
}

/// Pearson correlation between indicator and HF, best score per member
///
/// Points without a positive indicator and HF are ignored. Fewer than
/// [`MIN_CORRELATION_POINTS`] members gives 0.
pub fn skill_correlation(points: &[SkillPoint]) -> f64 {
    let mut usable: Vec<&SkillPoint> = points
        .iter()
        .filter(|p| p.indicator > 0.0 && p.hf > 0.0)
        .collect();
    usable.sort_by(|a, b| b.hf.total_cmp(&a.hf));

    let mut seen: FxHashSet<&str> = FxHashSet::default();
    usable.retain(|p| seen.insert(p.member_number.as_str()));

    if usable.len() < MIN_CORRELATION_POINTS {
        return 0.0;
    }

    let indicators: Vec<f64> = usable.iter().map(|p| p.indicator).collect();
    let hfs: Vec<f64> = usable.iter().map(|p| p.hf).collect();
    pearson(&indicators, &hfs)
}

/// `(200 * elo + 100 * class) / 2.4 - super_mse`
pub fn correlation_quality(
    elo_correlation: f64,
    classification_correlation: f64,
    super_mse: f64,
) -> f64 {
    (200.0 * elo_correlation + 100.0 * classification_correlation) / 2.4 - super_mse
}

/// Builds quality records from a RecHHF and its display population
pub struct QualityScorer<'a> {
    skills: &'a dyn SkillLookup,
}

impl<'a> QualityScorer<'a> {
    pub fn new(skills: &'a dyn SkillLookup) -> Self {
        Self { skills }
    }

    fn points(
        &self,
        scores: &[PooledScore],
        key_division: &str,
        indicator: impl Fn(&str, &str) -> Option<f64>,
    ) -> Vec<SkillPoint> {
        scores
            .iter()
            .filter_map(|s| {
                let value = indicator(&s.member_number, &s.division)
                    .or_else(|| indicator(&s.member_number, key_division))?;
                Some(SkillPoint {
                    member_number: s.member_number.clone(),
                    indicator: value,
                    hf: s.hf,
                })
            })
            .collect()
    }

    pub fn score(&self, rec: &RecHhf, display: &PooledPopulation) -> QualityRecord {
        let hfs = display.hfs();
        let inverse = InversePercentiles::compute(&hfs, rec.rec_hhf);
        let quality = percentile_distance_quality(&inverse, display.len());
        let inverse_cur = InversePercentiles::compute(&hfs, rec.cur_hhf);
        let hq_quality =
            (rec.cur_hhf > 0.0).then(|| percentile_distance_quality(&inverse_cur, display.len()));

        let division = rec.division.as_str();
        let elo_points = self.points(&display.scores, division, |m, d| self.skills.elo(m, d));
        let class_points = self.points(&display.scores, division, |m, d| {
            self.skills.rec_percent(m, d)
        });
        let elo_correlation = skill_correlation(&elo_points);
        let classification_correlation = skill_correlation(&class_points);

        QualityRecord {
            classifier: rec.classifier.clone(),
            division: rec.division.clone(),
            runs: display.len(),
            rec_hhf: rec.rec_hhf,
            inverse100_percentile: inverse.p100,
            inverse95_percentile: inverse.p95,
            inverse85_percentile: inverse.p85,
            inverse75_percentile: inverse.p75,
            inverse60_percentile: inverse.p60,
            inverse40_percentile: inverse.p40,
            cur_hhf: rec.cur_hhf,
            inverse100_cur_percentile: inverse_cur.p100,
            inverse95_cur_percentile: inverse_cur.p95,
            inverse85_cur_percentile: inverse_cur.p85,
            inverse75_cur_percentile: inverse_cur.p75,
            inverse60_cur_percentile: inverse_cur.p60,
            inverse40_cur_percentile: inverse_cur.p40,
            elo_correlation,
            classification_correlation,
            quality,
            hq_quality,
            cc_quality: correlation_quality(
                elo_correlation,
                classification_correlation,
                rec.super_mean_squared_error,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn point(member: &str, indicator: f64, hf: f64) -> SkillPoint {
        SkillPoint {
            member_number: member.into(),
            indicator,
            hf,
        }
    }

    #[test]
    fn test_sample_size_offsets() {
        assert_eq!(sample_size_offset(0), -40.0);
        assert_eq!(sample_size_offset(199), -40.0);
        assert_eq!(sample_size_offset(200), -20.0);
        assert_eq!(sample_size_offset(749), -10.0);
        assert_eq!(sample_size_offset(1399), -5.0);
        assert_eq!(sample_size_offset(1400), 0.0);
    }

    #[test]
    fn test_offset_only_differs_by_size() {
        let inverse = InversePercentiles {
            p100: 0.0,
            p95: 2.0,
            p85: 6.0,
            p75: 14.0,
            p60: 40.0,
            p40: 80.0,
        };
        let small = percentile_distance_quality(&inverse, 100);
        let large = percentile_distance_quality(&inverse, 2000);
        assert_relative_eq!(large - small, 40.0, epsilon = 1e-9);
        // 10*1 + 4*1 + 1*1 + 0.5*5 + 0.3*5 = 19
        assert_relative_eq!(large, 81.0, epsilon = 1e-9);
    }

    #[test]
    fn test_ideal_distribution() {
        let inverse = InversePercentiles {
            p100: 0.0,
            p95: 1.0,
            p85: 5.0,
            p75: 15.0,
            p60: 45.0,
            p40: 85.0,
        };
        assert_relative_eq!(percentile_distance_quality(&inverse, 5000), 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_inverse_percentile() {
        let hfs = [10.0, 9.0, 8.0, 7.0, 6.0];
        // 95% of 10 = 9.5: only index 0 reaches it
        assert_eq!(inverse_percentile(&hfs, 10.0, 95.0), 0.0);
        // 75% of 10 = 7.5: last reaching index 2
        assert_eq!(inverse_percentile(&hfs, 10.0, 75.0), 40.0);
        assert_eq!(inverse_percentile(&hfs, 20.0, 95.0), -1.0);
        assert_eq!(inverse_percentile(&hfs, 0.0, 95.0), -1.0);
        assert_eq!(inverse_percentile(&[], 10.0, 95.0), -1.0);
    }

    #[test]
    fn test_correlation_requires_four_members() {
        let points = vec![
            point("A", 1.0, 4.0),
            point("B", 2.0, 5.0),
            point("C", 3.0, 6.0),
            point("C", 3.0, 5.5),
        ];
        assert_eq!(skill_correlation(&points), 0.0);
    }

    #[test]
    fn test_correlation_keeps_best_per_member() {
        let points = vec![
            point("A", 1.0, 4.0),
            point("B", 2.0, 5.0),
            point("C", 3.0, 6.0),
            point("D", 4.0, 7.0),
            // worse repeat of D would break linearity if kept
            point("D", 4.0, 1.0),
            point("E", 0.0, 9.0),
            point("F", 5.0, 0.0),
        ];
        assert_relative_eq!(skill_correlation(&points), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_correlation_quality() {
        assert_relative_eq!(
            correlation_quality(0.6, 0.3, 2.0),
            (120.0 + 30.0) / 2.4 - 2.0,
            epsilon = 1e-12
        );
    }
}
