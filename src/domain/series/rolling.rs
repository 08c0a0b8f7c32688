//! Trailing-window statistics.
//!
//! Each output at index i summarizes x[i+1-n ..= i]. The first n-1 entries are
//! undefined (warm-up), and any window containing an undefined input yields an
//! undefined output. A window longer than the series leaves every entry
//! undefined.

use super::{percentile, sanitize, sample_std, sample_variance};

/// Applies `f` to every complete, fully-defined trailing window of length `n`.
pub fn rolling_apply<F>(x: &[f64], n: usize, f: F) -> Vec<f64>
where
    F: Fn(&[f64]) -> f64,
{
    let mut out = vec![f64::NAN; x.len()];
    if n == 0 {
        return out;
    }
    for i in (n - 1)..x.len() {
        let window = &x[i + 1 - n..=i];
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }
        out[i] = f(window);
    }
    sanitize(out)
}

pub fn ts_mean(x: &[f64], n: usize) -> Vec<f64> {
    rolling_apply(x, n, |w| w.iter().sum::<f64>() / w.len() as f64)
}

pub fn ts_sum(x: &[f64], n: usize) -> Vec<f64> {
    rolling_apply(x, n, |w| w.iter().sum())
}

/// Sample standard deviation; undefined for n = 1.
pub fn ts_std(x: &[f64], n: usize) -> Vec<f64> {
    rolling_apply(x, n, |w| sample_std(w).unwrap_or(f64::NAN))
}

pub fn ts_var(x: &[f64], n: usize) -> Vec<f64> {
    rolling_apply(x, n, |w| sample_variance(w).unwrap_or(f64::NAN))
}

pub fn ts_max(x: &[f64], n: usize) -> Vec<f64> {
    rolling_apply(x, n, |w| w.iter().copied().fold(f64::NEG_INFINITY, f64::max))
}

pub fn ts_min(x: &[f64], n: usize) -> Vec<f64> {
    rolling_apply(x, n, |w| w.iter().copied().fold(f64::INFINITY, f64::min))
}

pub fn ts_median(x: &[f64], n: usize) -> Vec<f64> {
    rolling_apply(x, n, |w| {
        let mut sorted = w.to_vec();
        sorted.sort_by(f64::total_cmp);
        percentile(&sorted, 0.5).unwrap_or(f64::NAN)
    })
}

/// Percentile rank of the newest value within its window, in [0, 1].
///
/// Uses the average rank for ties: rank = (avg_rank - 1) / (n - 1), so the
/// window minimum maps to 0 and the maximum to 1. A single-value window is 0.5.
pub fn ts_rank(x: &[f64], n: usize) -> Vec<f64> {
    rolling_apply(x, n, |w| {
        if w.len() < 2 {
            return 0.5;
        }
        let current = w[w.len() - 1];
        let less = w.iter().filter(|&&v| v < current).count() as f64;
        let equal = w.iter().filter(|&&v| v == current).count() as f64;
        let avg_rank = less + (equal + 1.0) / 2.0;
        (avg_rank - 1.0) / (w.len() - 1) as f64
    })
}

/// Adjusted Fisher-Pearson sample skewness; needs at least three values and
/// non-zero variance.
pub fn ts_skew(x: &[f64], n: usize) -> Vec<f64> {
    rolling_apply(x, n, skewness)
}

fn skewness(w: &[f64]) -> f64 {
    let len = w.len();
    if len < 3 {
        return f64::NAN;
    }
    let count = len as f64;
    let m = w.iter().sum::<f64>() / count;
    let m2 = w.iter().map(|v| (v - m).powi(2)).sum::<f64>() / count;
    let m3 = w.iter().map(|v| (v - m).powi(3)).sum::<f64>() / count;
    if m2 <= f64::EPSILON * m.abs().max(1.0) {
        return f64::NAN;
    }
    let g1 = m3 / m2.powf(1.5);
    g1 * (count * (count - 1.0)).sqrt() / (count - 2.0)
}

/// Bias-corrected sample excess kurtosis; needs at least four values and
/// non-zero variance.
pub fn ts_kurt(x: &[f64], n: usize) -> Vec<f64> {
    rolling_apply(x, n, kurtosis)
}

fn kurtosis(w: &[f64]) -> f64 {
    let len = w.len();
    if len < 4 {
        return f64::NAN;
    }
    let count = len as f64;
    let m = w.iter().sum::<f64>() / count;
    let m2 = w.iter().map(|v| (v - m).powi(2)).sum::<f64>() / count;
    let m4 = w.iter().map(|v| (v - m).powi(4)).sum::<f64>() / count;
    if m2 <= f64::EPSILON * m.abs().max(1.0) {
        return f64::NAN;
    }
    let g2 = m4 / (m2 * m2) - 3.0;
    ((count + 1.0) * g2 + 6.0) * (count - 1.0) / ((count - 2.0) * (count - 3.0))
}

/// Offset of the first maximum inside the window (0 = oldest).
pub fn ts_argmax(x: &[f64], n: usize) -> Vec<f64> {
    rolling_apply(x, n, |w| {
        let mut best = 0;
        for (i, &v) in w.iter().enumerate() {
            if v > w[best] {
                best = i;
            }
        }
        best as f64
    })
}

/// Offset of the first minimum inside the window (0 = oldest).
pub fn ts_argmin(x: &[f64], n: usize) -> Vec<f64> {
    rolling_apply(x, n, |w| {
        let mut best = 0;
        for (i, &v) in w.iter().enumerate() {
            if v < w[best] {
                best = i;
            }
        }
        best as f64
    })
}

/// (x - ts_mean) / ts_std; undefined where the window has zero dispersion.
pub fn ts_zscore(x: &[f64], n: usize) -> Vec<f64> {
    rolling_apply(x, n, |w| {
        let current = w[w.len() - 1];
        let m = w.iter().sum::<f64>() / w.len() as f64;
        match sample_std(w) {
            Some(sd) if sd > 0.0 => (current - m) / sd,
            _ => f64::NAN,
        }
    })
}
