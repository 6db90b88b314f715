//! HHF Calibration
//!
//! Recommends high hit factor (HHF) thresholds per classifier and division
//! from the population of recorded scores, and scores how well each
//! calibration fits.
//!
//! - `hitfactor/`: bit-packed hit decoding and HF reconstruction
//! - `divisions`: division equivalence maps and explosion
//! - `calibration/`: percentile matching, Weibull fit, publication policy
//! - `engine`: per-key pipeline, batch reconciliation
//! - `quality`, `quality_cache`: percentile-distance and correlation quality
//! - `data`: Polars loaders for score exports and lookups

pub mod calibration;
pub mod config;
pub mod data;
pub mod divisions;
pub mod engine;
pub mod error;
pub mod hitfactor;
pub mod quality;
pub mod quality_cache;
pub mod store;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use calibration::{
    CurveCalibrator, CurveFit, PooledPopulation, RecommendationChoice, RecommendationPolicy,
    WeibullCalibrator,
};
pub use config::EngineConfig;
pub use data::ScoreData;
pub use divisions::{Direction, DivisionEquivalence, DivisionMapConfig, MapVariant};
pub use engine::{BatchReport, RecommendationEngine};
pub use error::{ConfigError, ReconstructionError, StoreError};
pub use hitfactor::{minor_hf, reconstruct, HitCounts, HitZone, PowerFactor};
pub use quality::QualityScorer;
pub use quality_cache::{ClassifierQuality, QualityCache};
pub use store::{
    InMemoryRecHhfStore, InMemoryScores, InMemorySkills, RecHhfStore, ScoreRepository, SkillLookup,
};
pub use types::{ClassifierDivision, QualityRecord, RawScore, RecHhf, ScoreSource};
