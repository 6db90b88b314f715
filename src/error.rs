//! Error types for calibration
//!
//! Domain failures are typed; loaders and the binary wrap them in
//! `anyhow::Error` with context.

use thiserror::Error;

/// Why a raw score could not be reconstructed
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReconstructionError {
    /// Hit encodings or string times absent or malformed
    #[error("missing or malformed fields: {0}")]
    MissingFields(&'static str),

    /// Claimed hit factor absent or not a number
    #[error("missing hit factor")]
    MissingHitFactor,

    /// Steel counts do not add up to a finite number of points
    #[error("invalid steel counts")]
    InvalidSteel,

    /// Claimed HF reproduces under neither major nor minor scoring
    #[error("hit factor {claimed} matches neither major {major} nor minor {minor}")]
    Inconsistent { claimed: f64, major: f64, minor: f64 },
}

/// Configuration rejected at load time
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("division '{0}' is both a derived division and a source")]
    ChainedEquivalence(String),

    #[error("derived division '{0}' lists itself as a source")]
    SelfEquivalence(String),

    #[error("excluded division '{0}' is not a source of any derived division")]
    UnknownExclusion(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Persistence failure in a RecHHF store
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("upsert rejected for {key}: {reason}")]
    Rejected { key: String, reason: String },
}
