//! Numeric helpers shared by reconstruction, calibration and quality scoring
//!
//! Hit factors are stored with 4 decimals, percentages with 2. Every
//! published figure goes through one of these so that values computed in
//! different places compare equal.

/// Absolute tolerance when comparing a claimed hit factor with a recomputed one
pub const HF_TOLERANCE: f64 = 1e-4;

/// Round to a fixed number of decimals
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Hit factor precision (4 decimals)
pub fn round4(value: f64) -> f64 {
    round_to(value, 4)
}

/// `100 * n / total`, rounded to 2 decimals
///
/// A zero total yields 0 rather than NaN/inf.
pub fn percent(n: f64, total: f64) -> f64 {
    if total == 0.0 {
        return 0.0;
    }
    round_to(100.0 * n / total, 2)
}

/// Clamp negative values to the -1 sentinel
pub fn positive_or_minus_one(value: f64) -> f64 {
    if value >= 0.0 {
        value
    } else {
        -1.0
    }
}

/// Hit factors are equal when within [`HF_TOLERANCE`]
pub fn fuzzy_equal(a: f64, b: f64) -> bool {
    (a - b).abs() <= HF_TOLERANCE
}
