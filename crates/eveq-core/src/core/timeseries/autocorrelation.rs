//! Statistical inefficiency of a (stationary) series.
//!
//! Each function returns `g >= 1`, the factor by which correlated samples must be
//! thinned to count as independent. A series without variance has `g = 1`.

use std::f64::consts::PI;

/// Below this variance a series is treated as constant.
const VARIANCE_EPSILON: f64 = 1e-300;

/// Minimum number of lags summed by the positive sequence estimator before a
/// non-positive autocorrelation may end the sum.
const MIN_POSITIVE_LAGS: usize = 3;

pub fn mean(series: &[f64]) -> f64 {
    if series.is_empty() {
        return 0.0;
    }
    series.iter().sum::<f64>() / series.len() as f64
}

/// Biased sample variance (the lag-zero autocovariance).
pub fn variance(series: &[f64]) -> f64 {
    if series.is_empty() {
        return 0.0;
    }
    let mu = mean(series);
    series.iter().map(|x| (x - mu) * (x - mu)).sum::<f64>() / series.len() as f64
}

/// Autocovariance at `lag`, normalized by the full series length.
fn autocovariance(deviations: &[f64], lag: usize) -> f64 {
    let n = deviations.len();
    if lag >= n {
        return 0.0;
    }
    deviations[..n - lag]
        .iter()
        .zip(&deviations[lag..])
        .map(|(a, b)| a * b)
        .sum::<f64>()
        / n as f64
}

fn deviations(series: &[f64]) -> Vec<f64> {
    let mu = mean(series);
    series.iter().map(|x| x - mu).collect()
}

fn clamp(g: f64) -> f64 {
    if g.is_finite() { g.max(1.0) } else { 1.0 }
}

/// Lag-window estimate with a Tukey-Hanning window of half-width `sqrt(n)`.
pub fn window_inefficiency(series: &[f64]) -> f64 {
    let n = series.len();
    if n < 2 {
        return 1.0;
    }
    let dev = deviations(series);
    let gamma0 = autocovariance(&dev, 0);
    if gamma0 <= VARIANCE_EPSILON {
        return 1.0;
    }

    let width = ((n as f64).sqrt().round() as usize).clamp(1, n - 1);
    let mut sum = 0.0;
    for lag in 1..=width {
        let weight = 0.5 * (1.0 + (PI * lag as f64 / width as f64).cos());
        sum += weight * autocovariance(&dev, lag);
    }
    clamp(1.0 + 2.0 * sum / gamma0)
}

/// Geyer's initial monotone sequence estimate.
///
/// Adjacent autocovariance pairs are summed while positive, each pair capped at
/// the value of the previous one.
pub fn initial_sequence_inefficiency(series: &[f64]) -> f64 {
    let n = series.len();
    if n < 2 {
        return 1.0;
    }
    let dev = deviations(series);
    let gamma0 = autocovariance(&dev, 0);
    if gamma0 <= VARIANCE_EPSILON {
        return 1.0;
    }

    let mut total = 0.0;
    let mut previous = f64::INFINITY;
    let mut k = 0;
    while 2 * k + 1 < n {
        let pair = autocovariance(&dev, 2 * k) + autocovariance(&dev, 2 * k + 1);
        if pair <= 0.0 {
            break;
        }
        let pair = pair.min(previous);
        total += pair;
        previous = pair;
        k += 1;
    }
    clamp((2.0 * total - gamma0) / gamma0)
}

/// Initial positive sequence estimate with a finite-length correction.
///
/// Normalized autocorrelations are accumulated, weighted by `1 - t/n`, until
/// the first non-positive value after [`MIN_POSITIVE_LAGS`] lags.
pub fn positive_sequence_inefficiency(series: &[f64]) -> f64 {
    let n = series.len();
    if n < 2 {
        return 1.0;
    }
    let dev = deviations(series);
    let sigma2 = autocovariance(&dev, 0);
    if sigma2 <= VARIANCE_EPSILON {
        return 1.0;
    }

    let mut g = 1.0;
    for t in 1..n - 1 {
        let unbiased = autocovariance(&dev, t) * n as f64 / (n - t) as f64;
        let c = unbiased / sigma2;
        if c <= 0.0 && t > MIN_POSITIVE_LAGS {
            break;
        }
        g += 2.0 * c * (1.0 - t as f64 / n as f64);
    }
    clamp(g)
}
