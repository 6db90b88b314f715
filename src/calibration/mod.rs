//! Threshold calibration
//!
//! - `percentile`: pooled populations and percentile-matching candidates
//! - `weibull`: curve-fit candidates behind the `CurveCalibrator` trait
//! - `policy`: which candidate gets published

pub mod percentile;
pub mod policy;
pub mod weibull;

pub use percentile::{
    annotate_percentiles, closest_to_percentile, recommended_for_target, recommended_hhf,
    PercentileTarget, PooledPopulation, PooledScore, A_TARGET, GM_TARGET, M_TARGET,
};
pub use policy::{Candidates, RecommendationChoice, RecommendationPolicy};
pub use weibull::{CurveCalibrator, CurveFit, WeibullCalibrator};
