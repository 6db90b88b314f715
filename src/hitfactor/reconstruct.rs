//! Hit factor reconstruction
//!
//! Recomputes a score's hit factor from its raw hits, steel and string times
//! under both power-factor point tables, and checks the claimed HF against
//! them. Used two ways:
//!
//! 1. As a validation gate: a claimed HF that reproduces under neither table
//!    is corrupt and must not reach calibration.
//! 2. As an adapter: divisions that mix major and minor power factors are
//!    calibrated on the minor-equivalent HF, which this returns.
//!
//! The separate "penalties" field of score exports is not added to the point
//! totals; its meaning is inconsistent between sources.

use serde::{Deserialize, Serialize};

use super::decoder::{HitCounts, HitZone};
use crate::error::ReconstructionError;
use crate::utils::numbers::{fuzzy_equal, round4};

const POINTS_A: i64 = 5;
const POINTS_MIKE: i64 = -10;
const POINTS_NO_SHOOT: i64 = -10;

/// Point table selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerFactor {
    Major,
    Minor,
}

impl PowerFactor {
    /// Points for one hit in a zone
    pub fn points(self, zone: HitZone) -> i64 {
        match (self, zone) {
            (_, HitZone::A) => POINTS_A,
            (PowerFactor::Major, HitZone::B | HitZone::C) => 4,
            (PowerFactor::Minor, HitZone::B | HitZone::C) => 3,
            (PowerFactor::Major, HitZone::D) => 2,
            (PowerFactor::Minor, HitZone::D) => 1,
            (_, HitZone::Mike) => POINTS_MIKE,
            (_, HitZone::NoShoot) => POINTS_NO_SHOOT,
            (_, HitZone::NoPenaltyMike) => 0,
        }
    }

    /// Target points for a set of decoded hits
    pub fn target_points(self, hits: &HitCounts) -> i64 {
        HitZone::ALL
            .iter()
            .map(|&zone| i64::from(hits.count(zone)) * self.points(zone))
            .sum()
    }
}

/// Borrowed view of the score fields reconstruction needs
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreFields<'a> {
    pub hf: Option<f64>,
    /// One packed hit encoding per target
    pub target_hits: Option<&'a [u32]>,
    /// Elapsed time per string, in seconds
    pub strings: Option<&'a [f64]>,
    pub steel_hits: Option<f64>,
    pub steel_mikes: Option<f64>,
    pub steel_no_shoots: Option<f64>,
}

/// Outcome of a successful reconstruction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reconstruction {
    pub claimed_hf: f64,
    pub major_hf: f64,
    pub minor_hf: f64,
    /// Table that reproduced the claimed HF; `None` for a zero score
    pub power_factor: Option<PowerFactor>,
}

impl Reconstruction {
    fn zero() -> Self {
        Self {
            claimed_hf: 0.0,
            major_hf: 0.0,
            minor_hf: 0.0,
            power_factor: None,
        }
    }
}

/// Sum of string times; a zero total means a fixed-time stage (HF = points)
fn total_time(strings: &[f64]) -> Result<f64, ReconstructionError> {
    if strings.is_empty() || strings.iter().any(|t| !t.is_finite() || *t < 0.0) {
        return Err(ReconstructionError::MissingFields("strings"));
    }
    let total: f64 = strings.iter().sum();
    Ok(if total == 0.0 { 1.0 } else { total })
}

fn steel_points(fields: &ScoreFields) -> Result<f64, ReconstructionError> {
    let points = fields.steel_hits.unwrap_or(0.0) * POINTS_A as f64
        + fields.steel_mikes.unwrap_or(0.0) * POINTS_MIKE as f64
        + fields.steel_no_shoots.unwrap_or(0.0) * POINTS_NO_SHOOT as f64;
    if points.is_finite() {
        Ok(points)
    } else {
        Err(ReconstructionError::InvalidSteel)
    }
}

/// Recompute major and minor HF and validate the claimed HF against them
pub fn reconstruct(fields: &ScoreFields) -> Result<Reconstruction, ReconstructionError> {
    let claimed = match fields.hf {
        Some(hf) if hf.is_finite() => hf,
        _ => return Err(ReconstructionError::MissingHitFactor),
    };
    let (target_hits, strings) = match (fields.target_hits, fields.strings) {
        (Some(hits), Some(strings)) => (hits, strings),
        (None, _) => return Err(ReconstructionError::MissingFields("target_hits")),
        (_, None) => return Err(ReconstructionError::MissingFields("strings")),
    };

    let time = total_time(strings)?;
    let steel = steel_points(fields)?;

    if claimed == 0.0 {
        return Ok(Reconstruction::zero());
    }

    let hits = HitCounts::decode_all(target_hits);
    let major_points = PowerFactor::Major.target_points(&hits) as f64 + steel;
    let minor_points = PowerFactor::Minor.target_points(&hits) as f64 + steel;
    let major_hf = round4(major_points / time);
    let minor_hf = round4(minor_points / time);

    let power_factor = if fuzzy_equal(major_hf, claimed) {
        PowerFactor::Major
    } else if fuzzy_equal(minor_hf, claimed) {
        PowerFactor::Minor
    } else {
        return Err(ReconstructionError::Inconsistent {
            claimed,
            major: major_hf,
            minor: minor_hf,
        });
    };

    Ok(Reconstruction {
        claimed_hf: claimed,
        major_hf,
        minor_hf,
        power_factor: Some(power_factor),
    })
}

/// Minor-equivalent HF, or -1 when the score cannot be reconstructed
///
/// A claimed HF of exactly 0 is a valid zero score and returns 0.
pub fn minor_hf(fields: &ScoreFields) -> f64 {
    match reconstruct(fields) {
        Ok(r) => r.minor_hf,
        Err(e) => {
            tracing::debug!("score rejected by reconstruction: {}", e);
            -1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn fields<'a>(hf: f64, hits: &'a [u32], strings: &'a [f64]) -> ScoreFields<'a> {
        ScoreFields {
            hf: Some(hf),
            target_hits: Some(hits),
            strings: Some(strings),
            ..Default::default()
        }
    }

    #[test]
    fn test_minor_claimed_reconstructs() {
        // 2A + 1C = 13 minor points over 8.04s
        let hits = [2, 256];
        let strings = [4.0, 4.04];
        assert_relative_eq!(minor_hf(&fields(1.6169, &hits, &strings)), 1.6169, epsilon = 1e-9);
        assert_eq!(minor_hf(&fields(2.0, &hits, &strings)), -1.0);
    }

    #[test]
    fn test_major_claimed_returns_minor_equivalent() {
        // 11A 1C: major 59, minor 58 over 8.04s
        let hits = [4, 4, 259];
        let strings = [4.17, 3.87];
        let r = reconstruct(&fields(7.3383, &hits, &strings)).unwrap();
        assert_eq!(r.power_factor, Some(PowerFactor::Major));
        assert_relative_eq!(r.minor_hf, 7.2139, epsilon = 1e-9);
    }

    #[test]
    fn test_penalties_and_mikes() {
        // 9A 5C 1D 1M: major 57 / 8.67, minor 51 / 8.67
        let hits = [1_048_579, 514, 4609, 259];
        let strings = [8.67];
        assert_relative_eq!(minor_hf(&fields(6.5744, &hits, &strings)), 5.8824, epsilon = 1e-9);
    }

    #[test]
    fn test_steel_only() {
        let f = ScoreFields {
            hf: Some(5.3571),
            target_hits: Some(&[]),
            strings: Some(&[5.6]),
            steel_hits: Some(6.0),
            steel_mikes: Some(0.0),
            steel_no_shoots: Some(0.0),
        };
        assert_relative_eq!(minor_hf(&f), 5.3571, epsilon = 1e-9);
    }

    #[test]
    fn test_bad_math() {
        let hits = [4, 4354, 1_048_579, 4];
        assert_eq!(minor_hf(&fields(7.0055, &hits, &[7.28])), -1.0);
    }

    #[test]
    fn test_separate_penalty_field_not_applied() {
        // 6A 4C 1D 1M: major 38 / 9.88 = 3.8462, minor 33 / 9.88 = 3.3401
        let hits = [2, 257, 2, 257, 4352, 1_048_832];
        assert_relative_eq!(minor_hf(&fields(3.8462, &hits, &[9.88])), 3.3401, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_hf_is_valid() {
        let hits = [4];
        assert_eq!(minor_hf(&fields(0.0, &hits, &[3.0])), 0.0);
    }

    #[test]
    fn test_fixed_time_stage() {
        // zero total time: HF is raw points
        let hits = [4]; // 4A = 20
        assert_relative_eq!(minor_hf(&fields(20.0, &hits, &[0.0])), 20.0, epsilon = 1e-9);
    }

    #[test]
    fn test_missing_fields() {
        let f = ScoreFields {
            hf: Some(5.0),
            strings: Some(&[3.0]),
            ..Default::default()
        };
        assert_eq!(reconstruct(&f), Err(ReconstructionError::MissingFields("target_hits")));
        assert_eq!(minor_hf(&f), -1.0);

        let hits = [1];
        let f = ScoreFields {
            hf: Some(5.0),
            target_hits: Some(&hits),
            ..Default::default()
        };
        assert_eq!(reconstruct(&f), Err(ReconstructionError::MissingFields("strings")));

        let f = ScoreFields {
            hf: None,
            target_hits: Some(&hits),
            strings: Some(&[1.0]),
            ..Default::default()
        };
        assert_eq!(reconstruct(&f), Err(ReconstructionError::MissingHitFactor));
    }

    #[test]
    fn test_non_finite_steel() {
        let hits = [1];
        let f = ScoreFields {
            hf: Some(5.0),
            target_hits: Some(&hits),
            strings: Some(&[1.0]),
            steel_hits: Some(f64::NAN),
            ..Default::default()
        };
        assert_eq!(reconstruct(&f), Err(ReconstructionError::InvalidSteel));
    }

    #[test]
    fn test_generated_scores_never_rejected() {
        let cases: Vec<(Vec<u32>, Vec<f64>)> = vec![
            (vec![4, 4, 259], vec![4.17, 3.87]),
            (vec![0x1111, 0x0103, 5], vec![2.31]),
            (vec![0x10_0025, 0x44], vec![1.9, 2.05, 3.33]),
            (vec![0x0F0F], vec![11.02]),
        ];
        for (hits, strings) in &cases {
            let counts = HitCounts::decode_all(hits);
            let time: f64 = strings.iter().sum();
            for pf in [PowerFactor::Major, PowerFactor::Minor] {
                let hf = round4(pf.target_points(&counts) as f64 / time);
                let expected_minor =
                    round4(PowerFactor::Minor.target_points(&counts) as f64 / time);
                let got = minor_hf(&fields(hf, hits, strings));
                assert_ne!(got, -1.0);
                assert_relative_eq!(got, expected_minor, epsilon = 1e-9);
                if pf == PowerFactor::Minor {
                    assert!(fuzzy_equal(got, hf));
                }
            }
        }
    }

    #[test]
    fn test_perturbed_hf_rejected() {
        let hits = [4, 4, 259];
        let strings = [4.17, 3.87];
        // major 7.3383, minor 7.2139
        assert_eq!(minor_hf(&fields(7.3383 + 0.0005, &hits, &strings)), -1.0);
        assert_eq!(minor_hf(&fields(7.2139 - 0.0005, &hits, &strings)), -1.0);
        assert_eq!(minor_hf(&fields(7.28, &hits, &strings)), -1.0);
    }
}
