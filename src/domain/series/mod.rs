//! Time-series function library.
//!
//! - `shift`: `ts_delay`, `ts_delta`, `ts_returns`
//! - `rolling`: trailing-window statistics (`ts_mean`, `ts_std`, `ts_rank`, ...)
//! - `pairwise`: rolling two-series statistics (`ts_corr`, `ts_cov`)
//! - `transform`: full-series transforms (`winsorize`, `standardize`, ...)
//! - `elementwise`: arithmetic and scalar math
//!
//! Undefined entries are NaN. Every function takes slices and returns a new
//! vector of the same length; nothing is mutated in place. Outputs never
//! contain infinities.

pub mod elementwise;
pub mod pairwise;
pub mod rolling;
pub mod shift;
pub mod transform;

use serde::{Serialize, Serializer};

/// Evaluated factor values, index-aligned with the panel they came from.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FactorSeries(Vec<f64>);

impl FactorSeries {
    /// Wraps raw values, mapping infinities to undefined.
    pub fn new(values: Vec<f64>) -> Self {
        Self(sanitize(values))
    }

    pub fn undefined(len: usize) -> Self {
        Self(vec![f64::NAN; len])
    }

    pub fn constant(value: f64, len: usize) -> Self {
        Self::new(vec![value; len])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn into_values(self) -> Vec<f64> {
        self.0
    }

    /// Value at `index`, or `None` when out of range or undefined.
    pub fn get(&self, index: usize) -> Option<f64> {
        self.0.get(index).copied().filter(|v| !v.is_nan())
    }

    pub fn defined_count(&self) -> usize {
        self.0.iter().filter(|v| !v.is_nan()).count()
    }

    pub fn is_all_undefined(&self) -> bool {
        self.0.iter().all(|v| v.is_nan())
    }

    pub fn to_options(&self) -> Vec<Option<f64>> {
        self.0.iter().map(|&v| defined(v)).collect()
    }
}

impl Serialize for FactorSeries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_options().serialize(serializer)
    }
}

/// Maps non-finite values to NaN.
pub fn sanitize(mut values: Vec<f64>) -> Vec<f64> {
    for v in values.iter_mut() {
        if !v.is_finite() {
            *v = f64::NAN;
        }
    }
    values
}

pub fn defined(value: f64) -> Option<f64> {
    if value.is_finite() { Some(value) } else { None }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample variance (n - 1 denominator); `None` below two values.
pub fn sample_variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Some(ss / (values.len() - 1) as f64)
}

pub fn sample_std(values: &[f64]) -> Option<f64> {
    sample_variance(values).map(f64::sqrt)
}

/// Defined entries of `values`, in order.
pub fn defined_values(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| !v.is_nan()).collect()
}

/// Linear-interpolated percentile of `sorted` (ascending) at `q` in [0, 1].
pub fn percentile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Pearson correlation of paired values; `None` below two pairs or when either
/// side has zero variance.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let mx = x[..n].iter().sum::<f64>() / n as f64;
    let my = y[..n].iter().sum::<f64>() / n as f64;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for i in 0..n {
        let dx = x[i] - mx;
        let dy = y[i] - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx <= 0.0 || syy <= 0.0 {
        return None;
    }
    defined(sxy / (sxx.sqrt() * syy.sqrt())).map(|r| r.clamp(-1.0, 1.0))
}

/// Average ranks (1-based), ties sharing the mean of their positions.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg;
        }
        i = j + 1;
    }
    ranks
}

/// Spearman rank correlation: Pearson over average ranks.
pub fn spearman(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len().min(y.len());
    pearson(&average_ranks(&x[..n]), &average_ranks(&y[..n]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn new_sanitizes_infinities() {
        let s = FactorSeries::new(vec![1.0, f64::INFINITY, f64::NEG_INFINITY, f64::NAN]);
        assert_eq!(s.get(0), Some(1.0));
        assert_eq!(s.get(1), None);
        assert_eq!(s.get(2), None);
        assert_eq!(s.defined_count(), 1);
    }

    #[test]
    fn serializes_undefined_as_null() {
        let s = FactorSeries::new(vec![1.5, f64::NAN]);
        assert_eq!(serde_json::to_string(&s).unwrap(), "[1.5,null]");
    }

    #[test]
    fn sample_statistics() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(mean(&v).unwrap(), 5.0);
        assert_relative_eq!(sample_variance(&v).unwrap(), 32.0 / 7.0, epsilon = 1e-12);
        assert!(sample_std(&[1.0]).is_none());
        assert!(mean(&[]).is_none());
    }

    #[test]
    fn percentile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(percentile(&sorted, 0.5).unwrap(), 3.0);
        assert_relative_eq!(percentile(&sorted, 0.25).unwrap(), 2.0);
        assert_relative_eq!(percentile(&sorted, 0.1).unwrap(), 1.4, epsilon = 1e-12);
        assert!(percentile(&[], 0.5).is_none());
    }

    #[test]
    fn pearson_perfect_and_degenerate() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [2.0, 4.0, 6.0, 8.0];
        assert_relative_eq!(pearson(&x, &y).unwrap(), 1.0, epsilon = 1e-12);
        let neg: Vec<f64> = y.iter().map(|v| -v).collect();
        assert_relative_eq!(pearson(&x, &neg).unwrap(), -1.0, epsilon = 1e-12);
        assert!(pearson(&x, &[1.0, 1.0, 1.0, 1.0]).is_none());
        assert!(pearson(&[1.0], &[2.0]).is_none());
    }

    #[test]
    fn average_ranks_with_ties() {
        let ranks = average_ranks(&[10.0, 20.0, 10.0, 30.0]);
        assert_eq!(ranks, vec![1.5, 3.0, 1.5, 4.0]);
    }

    #[test]
    fn spearman_is_rank_based() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [1.0, 4.0, 9.0, 16.0, 100.0];
        assert_relative_eq!(spearman(&x, &y).unwrap(), 1.0, epsilon = 1e-12);
    }
}
