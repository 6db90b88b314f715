//! Descriptive statistics over hit-factor samples
//!
//! Sample (bias-corrected) moments: skewness needs at least 3 values and
//! kurtosis at least 4. Below that, or with zero spread, they report 0.

/// Arithmetic mean (0 for an empty slice)
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance (0 for an empty slice)
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / values.len() as f64
}

/// Sample skewness (adjusted Fisher-Pearson)
pub fn sample_skewness(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 3 {
        return 0.0;
    }
    let m = mean(values);
    let (sum_sq, sum_cubed) = values.iter().fold((0.0, 0.0), |(sq, cu), x| {
        let d = x - m;
        (sq + d * d, cu + d * d * d)
    });
    if sum_sq == 0.0 {
        return 0.0;
    }

    let nf = n as f64;
    let sample_std = (sum_sq / (nf - 1.0)).sqrt();
    (nf * sum_cubed) / ((nf - 1.0) * (nf - 2.0) * sample_std.powi(3))
}

/// Sample excess kurtosis
pub fn sample_kurtosis(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 4 {
        return 0.0;
    }
    let m = mean(values);
    let (second, fourth) = values.iter().fold((0.0, 0.0), |(s, f), x| {
        let d = x - m;
        (s + d * d, f + d.powi(4))
    });
    if second == 0.0 {
        return 0.0;
    }

    let nf = n as f64;
    ((nf - 1.0) / ((nf - 2.0) * (nf - 3.0)))
        * ((nf * (nf + 1.0) * fourth) / (second * second) - 3.0 * (nf - 1.0))
}

/// Pearson correlation of two equally long series
///
/// Uses the shorter length if they differ. Returns 0 for fewer than 2 pairs
/// or when either series has no spread.
pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return 0.0;
    }

    let mx = mean(&xs[..n]);
    let my = mean(&ys[..n]);
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs[..n].iter().zip(&ys[..n]) {
        let dx = x - mx;
        let dy = y - my;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let den = (var_x * var_y).sqrt();
    if den <= 1e-12 {
        0.0
    } else {
        cov / den
    }
}
