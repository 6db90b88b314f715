//! Core records: raw scores in, RecHHF and quality records out

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::calibration::policy::RecommendationChoice;
use crate::hitfactor::ScoreFields;

/// Where a score came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ScoreSource {
    /// Club-level stage score with full hit data
    #[default]
    #[serde(rename = "Stage Score")]
    StageScore,
    /// Externally scored major match result (percent only, no usable HF)
    #[serde(rename = "Major Match")]
    MajorMatch,
}

impl ScoreSource {
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "Major Match" => ScoreSource::MajorMatch,
            _ => ScoreSource::StageScore,
        }
    }
}

/// Compound (classifier, division) key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassifierDivision {
    pub classifier: String,
    pub division: String,
}

impl ClassifierDivision {
    pub fn new(classifier: impl Into<String>, division: impl Into<String>) -> Self {
        Self {
            classifier: classifier.into(),
            division: division.into(),
        }
    }
}

impl fmt::Display for ClassifierDivision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.classifier, self.division)
    }
}

/// One competitor's result on one classifier run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawScore {
    pub classifier: String,
    pub division: String,
    pub member_number: String,
    /// Claimed hit factor
    pub hf: Option<f64>,
    /// Percent of HHF when supplied directly (major matches)
    pub percent: Option<f64>,
    /// Packed hit encoding per target
    pub target_hits: Option<Vec<u32>>,
    /// String times in seconds
    pub strings: Option<Vec<f64>>,
    pub steel_hits: Option<f64>,
    pub steel_mikes: Option<f64>,
    pub steel_no_shoots: Option<f64>,
    pub source: ScoreSource,
    /// Unix epoch milliseconds
    pub timestamp: Option<i64>,
}

impl RawScore {
    pub fn key(&self) -> ClassifierDivision {
        ClassifierDivision::new(self.classifier.clone(), self.division.clone())
    }

    pub fn is_major_match(&self) -> bool {
        self.source == ScoreSource::MajorMatch
    }

    /// View used by hit factor reconstruction
    pub fn fields(&self) -> ScoreFields<'_> {
        ScoreFields {
            hf: self.hf,
            target_hits: self.target_hits.as_deref(),
            strings: self.strings.as_deref(),
            steel_hits: self.steel_hits,
            steel_mikes: self.steel_mikes,
            steel_no_shoots: self.steel_no_shoots,
        }
    }
}

/// Recommended HHF record for one (classifier, division)
///
/// Upserted as a whole; every recalculation replaces the previous record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecHhf {
    pub classifier: String,
    pub division: String,
    pub classifier_division: String,

    /// Published HHF, -1 when none is published
    pub cur_hhf: f64,
    /// Selected recommendation
    pub rec_hhf: f64,
    pub choice: RecommendationChoice,

    // Percentile matching (1st/95%, 4.75th/85%, 14.5th/75%)
    pub rec1_hhf: f64,
    pub rec5_hhf: f64,
    pub rec15_hhf: f64,

    // Weibull
    pub k: f64,
    pub lambda: f64,
    pub wbl1_hhf: f64,
    pub wbl3_hhf: f64,
    pub wbl5_hhf: f64,
    pub wbl15_hhf: f64,
    pub kurtosis: f64,
    pub skewness: f64,
    pub mean_squared_error: f64,
    pub mean_absolute_error: f64,
    pub super_mean_squared_error: f64,
    pub super_mean_absolute_error: f64,
    pub max_error: f64,

    /// Scores in the pooled population
    pub runs: usize,
    /// Scores rejected by reconstruction
    pub invalid_runs: usize,
    /// Weibull wbl5 per contributing source division, when the pool spans several
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub division_hhfs: BTreeMap<String, f64>,
}

impl RecHhf {
    pub fn key(&self) -> ClassifierDivision {
        ClassifierDivision::new(self.classifier.clone(), self.division.clone())
    }
}

/// Calibration quality for one (classifier, division), computed on read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityRecord {
    pub classifier: String,
    pub division: String,
    pub runs: usize,
    pub rec_hhf: f64,

    /// Percentile of the population reaching each percent of RecHHF
    pub inverse100_percentile: f64,
    pub inverse95_percentile: f64,
    pub inverse85_percentile: f64,
    pub inverse75_percentile: f64,
    pub inverse60_percentile: f64,
    pub inverse40_percentile: f64,

    /// Published HHF, -1 when none is published
    pub cur_hhf: f64,
    /// Same figures against the published HHF, -1 without one
    pub inverse100_cur_percentile: f64,
    pub inverse95_cur_percentile: f64,
    pub inverse85_cur_percentile: f64,
    pub inverse75_cur_percentile: f64,
    pub inverse60_cur_percentile: f64,
    pub inverse40_cur_percentile: f64,

    pub elo_correlation: f64,
    pub classification_correlation: f64,

    /// Percentile-distance quality including the sample size offset
    pub quality: f64,
    /// Percentile-distance quality of the published HHF
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hq_quality: Option<f64>,
    /// Correlation quality
    pub cc_quality: f64,
}
