//! Utility modules for calibration
//!
//! Contains shared functionality used across the engine:
//! - Numbers: fixed-precision rounding, percent, tolerance comparison
//! - Statistics: moments and correlation over hit-factor samples

pub mod numbers;
pub mod statistics;

// Re-export commonly used helpers
pub use numbers::{fuzzy_equal, percent, positive_or_minus_one, round4, HF_TOLERANCE};
pub use statistics::{mean, pearson, sample_kurtosis, sample_skewness, variance};
