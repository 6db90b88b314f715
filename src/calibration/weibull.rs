//! Weibull curve calibration
//!
//! The engine consumes curve fitting through the [`CurveCalibrator`] trait.
//! [`WeibullCalibrator`] is the implementation used by default:
//!
//! - Maximum likelihood fit of shape `k` and scale `lambda` by Nelder-Mead
//!   over `(ln k, ln lambda)`, on samples scaled by their mean
//! - Survival curve `S(x) = 100 * exp(-(x / lambda)^k)`: the percent of
//!   shooters expected to beat `x`
//! - Thresholds `S^-1(p) / (percent / 100)` for (1, 95), (3, 90), (5, 85)
//!   and (15, 75)
//! - Errors of `S` against the empirical rank percentile `100 * i / n`
//!
//! Only positive HFs enter the fit. Fewer than [`MIN_FIT_SAMPLES`] of them,
//! or no spread, gives a degraded fit instead of an error.

use serde::{Deserialize, Serialize};

use crate::utils::numbers::round4;
use crate::utils::statistics::{mean, sample_kurtosis, sample_skewness, variance};

/// Smallest sample the fit is attempted on
pub const MIN_FIT_SAMPLES: usize = 4;

/// Error metrics reported by a degraded fit
pub const DEGRADED_ERROR: f64 = 100.0;

/// Result of a curve fit over one pooled population
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveFit {
    pub k: f64,
    pub lambda: f64,
    pub wbl1: f64,
    pub wbl3: f64,
    pub wbl5: f64,
    pub wbl15: f64,
    pub skewness: f64,
    pub kurtosis: f64,
    pub mean_squared_error: f64,
    pub mean_absolute_error: f64,
    pub super_mean_squared_error: f64,
    pub super_mean_absolute_error: f64,
    pub max_error: f64,
    /// False for degraded fits and solver runs that hit the iteration cap
    pub converged: bool,
}

impl CurveFit {
    /// Placeholder fit for samples too small or flat to fit
    pub fn degraded(hfs: &[f64]) -> Self {
        Self {
            k: 1.0,
            lambda: 1.0,
            wbl1: 0.0,
            wbl3: 0.0,
            wbl5: 0.0,
            wbl15: 0.0,
            skewness: sample_skewness(hfs),
            kurtosis: sample_kurtosis(hfs),
            mean_squared_error: DEGRADED_ERROR,
            mean_absolute_error: DEGRADED_ERROR,
            super_mean_squared_error: DEGRADED_ERROR,
            super_mean_absolute_error: DEGRADED_ERROR,
            max_error: DEGRADED_ERROR,
            converged: false,
        }
    }

    pub fn is_degraded(&self) -> bool {
        !self.converged && self.wbl1 == 0.0
    }

    /// Percent of the population expected to beat `hf`
    pub fn survival(&self, hf: f64) -> f64 {
        weibull_survival(hf, self.k, self.lambda)
    }
}

/// Distribution fitting consumed by the recommendation engine
///
/// Must be deterministic for a given sample and must never fail: poor or
/// impossible fits are reported through the error metrics.
pub trait CurveCalibrator: Send + Sync {
    fn fit(&self, hfs: &[f64]) -> CurveFit;
}

/// `100 * exp(-(x / lambda)^k)`
pub fn weibull_survival(x: f64, k: f64, lambda: f64) -> f64 {
    if x <= 0.0 {
        return 100.0;
    }
    100.0 * (-(x / lambda).powf(k)).exp()
}

/// HF that `percent` of the population is expected to beat
pub fn weibull_inverse_survival(percent: f64, k: f64, lambda: f64) -> f64 {
    lambda * (100.0 / percent).ln().powf(1.0 / k)
}

/// Nelder-Mead maximum likelihood Weibull fit
#[derive(Debug, Clone)]
pub struct WeibullCalibrator {
    pub max_iterations: usize,
    /// Relative spread of simplex values at which the solver stops
    pub tolerance: f64,
}

impl Default for WeibullCalibrator {
    fn default() -> Self {
        Self {
            max_iterations: 2000,
            tolerance: 1e-10,
        }
    }
}

impl CurveCalibrator for WeibullCalibrator {
    fn fit(&self, hfs: &[f64]) -> CurveFit {
        let mut samples: Vec<f64> = hfs
            .iter()
            .copied()
            .filter(|hf| *hf > 0.0 && hf.is_finite())
            .collect();
        if samples.len() < MIN_FIT_SAMPLES || variance(&samples) <= 0.0 {
            tracing::debug!("degraded weibull fit over {} samples", samples.len());
            return CurveFit::degraded(hfs);
        }
        samples.sort_by(|a, b| b.total_cmp(a));

        let scale = mean(&samples);
        let scaled: Vec<f64> = samples.iter().map(|x| x / scale).collect();
        let cv = variance(&scaled).sqrt();
        let start = [(cv.powf(-1.086)).ln(), 0.0];

        let (best, converged) = nelder_mead(
            |p| negative_log_likelihood(&scaled, p[0].exp(), p[1].exp()),
            start,
            0.25,
            self.max_iterations,
            self.tolerance,
        );
        if !converged {
            tracing::debug!("weibull fit hit the iteration cap over {} samples", samples.len());
        }

        let k = best[0].exp();
        let lambda = best[1].exp() * scale;
        if !k.is_finite() || !lambda.is_finite() {
            return CurveFit::degraded(hfs);
        }

        let threshold = |percentile: f64, percent: f64| {
            round4(weibull_inverse_survival(percentile, k, lambda) / (percent / 100.0))
        };

        let n = samples.len() as f64;
        let (mut sum_sq, mut sum_abs, mut max_error) = (0.0, 0.0, 0.0f64);
        for (i, hf) in samples.iter().enumerate() {
            let empirical = 100.0 * i as f64 / n;
            let diff = (weibull_survival(*hf, k, lambda) - empirical).abs();
            sum_sq += diff * diff;
            sum_abs += diff;
            max_error = max_error.max(diff);
        }
        let mse = sum_sq / n;
        let mae = sum_abs / n;

        CurveFit {
            k,
            lambda,
            wbl1: threshold(1.0, 95.0),
            wbl3: threshold(3.0, 90.0),
            wbl5: threshold(5.0, 85.0),
            wbl15: threshold(15.0, 75.0),
            skewness: sample_skewness(hfs),
            kurtosis: sample_kurtosis(hfs),
            mean_squared_error: mse,
            mean_absolute_error: mae,
            super_mean_squared_error: mse * n.sqrt(),
            super_mean_absolute_error: mae * n.sqrt(),
            max_error,
            converged,
        }
    }
}

fn negative_log_likelihood(samples: &[f64], k: f64, lambda: f64) -> f64 {
    let (ln_k, ln_lambda) = (k.ln(), lambda.ln());
    let mut nll = 0.0;
    for &x in samples {
        let ln_x = x.ln();
        nll -= ln_k - ln_lambda + (k - 1.0) * (ln_x - ln_lambda) - (x / lambda).powf(k);
    }
    if nll.is_finite() {
        nll
    } else {
        f64::INFINITY
    }
}

/// Point along the line from `centroid` through `point`, at `t`
fn towards(centroid: [f64; 2], point: [f64; 2], t: f64) -> [f64; 2] {
    [
        centroid[0] + t * (point[0] - centroid[0]),
        centroid[1] + t * (point[1] - centroid[1]),
    ]
}

/// Minimise a function of two variables; returns the best point and whether
/// the simplex converged before the iteration cap
fn nelder_mead(
    f: impl Fn(&[f64; 2]) -> f64,
    start: [f64; 2],
    step: f64,
    max_iterations: usize,
    tolerance: f64,
) -> ([f64; 2], bool) {
    let vertices = [
        start,
        [start[0] + step, start[1]],
        [start[0], start[1] + step],
    ];
    let mut simplex: Vec<([f64; 2], f64)> = vertices
        .into_iter()
        .map(|p| (p, f(&p)))
        .collect();

    for _ in 0..max_iterations {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        let (best, second, worst) = (simplex[0].1, simplex[1].1, simplex[2].1);
        if (worst - best).abs() <= tolerance * (1.0 + best.abs()) {
            return (simplex[0].0, true);
        }

        let centroid = towards(simplex[0].0, simplex[1].0, 0.5);
        let worst_point = simplex[2].0;

        let reflected = towards(centroid, worst_point, -1.0);
        let f_reflected = f(&reflected);

        if f_reflected < best {
            let expanded = towards(centroid, worst_point, -2.0);
            let f_expanded = f(&expanded);
            simplex[2] = if f_expanded < f_reflected {
                (expanded, f_expanded)
            } else {
                (reflected, f_reflected)
            };
            continue;
        }
        if f_reflected < second {
            simplex[2] = (reflected, f_reflected);
            continue;
        }

        let (contracted, f_contracted) = if f_reflected < worst {
            let p = towards(centroid, worst_point, -0.5);
            (p, f(&p))
        } else {
            let p = towards(centroid, worst_point, 0.5);
            (p, f(&p))
        };
        if f_contracted < worst.min(f_reflected) {
            simplex[2] = (contracted, f_contracted);
            continue;
        }

        // shrink towards the best vertex
        let best_point = simplex[0].0;
        for vertex in simplex.iter_mut().skip(1) {
            let p = towards(best_point, vertex.0, 0.5);
            *vertex = (p, f(&p));
        }
    }

    simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
    (simplex[0].0, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Stratified Weibull sample: exact quantiles at (i + 0.5) / n
    fn weibull_quantiles(n: usize, k: f64, lambda: f64) -> Vec<f64> {
        (0..n)
            .map(|i| {
                let u = (i as f64 + 0.5) / n as f64;
                lambda * (-(1.0 - u).ln()).powf(1.0 / k)
            })
            .collect()
    }

    #[test]
    fn test_survival_inverse() {
        let x = weibull_inverse_survival(5.0, 2.5, 7.0);
        assert_relative_eq!(weibull_survival(x, 2.5, 7.0), 5.0, epsilon = 1e-9);
        assert_eq!(weibull_survival(0.0, 2.5, 7.0), 100.0);
    }

    #[test]
    fn test_recovers_parameters() {
        let hfs = weibull_quantiles(400, 3.0, 8.0);
        let fit = WeibullCalibrator::default().fit(&hfs);
        assert!(fit.converged);
        assert_relative_eq!(fit.k, 3.0, epsilon = 0.15);
        assert_relative_eq!(fit.lambda, 8.0, epsilon = 0.1);
        assert!(fit.mean_absolute_error < 1.0);
        assert!(fit.max_error < 5.0);
        assert!(fit.wbl1 > fit.wbl5 && fit.wbl5 > fit.wbl15);
        assert_relative_eq!(
            fit.super_mean_squared_error,
            fit.mean_squared_error * 20.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_thresholds_from_parameters() {
        let hfs = weibull_quantiles(200, 2.0, 5.0);
        let fit = WeibullCalibrator::default().fit(&hfs);
        let expected = round4(weibull_inverse_survival(5.0, fit.k, fit.lambda) / 0.85);
        assert_relative_eq!(fit.wbl5, expected, epsilon = 1e-9);
    }

    #[test]
    fn test_deterministic() {
        let hfs = weibull_quantiles(50, 1.7, 4.0);
        let calibrator = WeibullCalibrator::default();
        assert_eq!(calibrator.fit(&hfs), calibrator.fit(&hfs));
    }

    #[test]
    fn test_degraded_small_and_flat() {
        let calibrator = WeibullCalibrator::default();

        let small = calibrator.fit(&[5.0, 4.0, 3.0]);
        assert!(small.is_degraded());
        assert_eq!(small.k, 1.0);
        assert_eq!(small.wbl5, 0.0);
        assert_eq!(small.mean_squared_error, DEGRADED_ERROR);

        let flat = calibrator.fit(&[5.0; 10]);
        assert!(flat.is_degraded());
        assert_eq!(flat.super_mean_absolute_error, DEGRADED_ERROR);

        let empty = calibrator.fit(&[]);
        assert!(empty.is_degraded());
        assert_eq!(empty.skewness, 0.0);
    }

    #[test]
    fn test_zero_scores_ignored_by_fit() {
        let mut hfs = weibull_quantiles(100, 3.0, 8.0);
        let clean = WeibullCalibrator::default().fit(&hfs);
        hfs.extend([0.0, 0.0, -1.0]);
        let with_zeros = WeibullCalibrator::default().fit(&hfs);
        assert_relative_eq!(clean.k, with_zeros.k, epsilon = 1e-9);
        assert_relative_eq!(clean.lambda, with_zeros.lambda, epsilon = 1e-9);
    }
}
