//! Full-series transforms. Statistics are taken over the defined entries of the
//! whole series, not a trailing window; undefined entries stay undefined.

use super::{average_ranks, defined_values, mean, percentile, sample_std, sanitize};

const WINSOR_LOWER: f64 = 0.01;
const WINSOR_UPPER: f64 = 0.99;

fn map_defined<F>(x: &[f64], f: F) -> Vec<f64>
where
    F: Fn(f64) -> f64,
{
    sanitize(
        x.iter()
            .map(|&v| if v.is_nan() { f64::NAN } else { f(v) })
            .collect(),
    )
}

/// Clips to the series' own 1st and 99th percentiles.
pub fn winsorize(x: &[f64]) -> Vec<f64> {
    let mut sorted = defined_values(x);
    sorted.sort_by(f64::total_cmp);
    let (Some(lo), Some(hi)) = (
        percentile(&sorted, WINSOR_LOWER),
        percentile(&sorted, WINSOR_UPPER),
    ) else {
        return vec![f64::NAN; x.len()];
    };
    map_defined(x, |v| v.clamp(lo, hi))
}

/// (x - mean) / std with the sample standard deviation. A flat series has no
/// defined z-scores.
pub fn standardize(x: &[f64]) -> Vec<f64> {
    let values = defined_values(x);
    match (mean(&values), sample_std(&values)) {
        (Some(m), Some(sd)) if sd > 0.0 => map_defined(x, |v| (v - m) / sd),
        _ => vec![f64::NAN; x.len()],
    }
}

/// Min-max scaling onto [0, 1].
pub fn normalize(x: &[f64]) -> Vec<f64> {
    let values = defined_values(x);
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if !(range.is_finite() && range > 0.0) {
        return vec![f64::NAN; x.len()];
    }
    map_defined(x, |v| (v - min) / range)
}

pub fn demean(x: &[f64]) -> Vec<f64> {
    match mean(&defined_values(x)) {
        Some(m) => map_defined(x, |v| v - m),
        None => vec![f64::NAN; x.len()],
    }
}

/// Average-rank percentile over the defined entries: rank / count, so the
/// largest value maps to 1.
pub fn rank(x: &[f64]) -> Vec<f64> {
    let values = defined_values(x);
    let count = values.len() as f64;
    let mut ranks = average_ranks(&values).into_iter();
    x.iter()
        .map(|&v| {
            if v.is_nan() {
                f64::NAN
            } else {
                ranks.next().map_or(f64::NAN, |r| r / count)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::series::sample_variance;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn winsorize_clips_outliers() {
        let mut x: Vec<f64> = (0..100).map(|i| i as f64).collect();
        x.push(10_000.0);
        let out = winsorize(&x);
        assert!(out[100] < 10_000.0);
        assert_relative_eq!(out[50], 50.0);
    }

    #[test]
    fn winsorize_keeps_undefined() {
        let out = winsorize(&[1.0, f64::NAN, 3.0]);
        assert!(out[1].is_nan());
        assert!(winsorize(&[f64::NAN, f64::NAN]).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn standardize_moments() {
        let out = standardize(&[1.0, 2.0, 3.0, 4.0, f64::NAN]);
        let defined = defined_values(&out);
        assert_relative_eq!(mean(&defined).unwrap(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(sample_std(&defined).unwrap(), 1.0, epsilon = 1e-12);
        assert!(out[4].is_nan());
    }

    #[test]
    fn standardize_flat_is_undefined() {
        assert!(standardize(&[3.0, 3.0, 3.0]).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn normalize_maps_to_unit_interval() {
        let out = normalize(&[2.0, 4.0, 6.0]);
        assert_eq!(out, vec![0.0, 0.5, 1.0]);
        assert!(normalize(&[5.0, 5.0]).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn rank_is_percentile_with_average_ties() {
        let out = rank(&[3.0, f64::NAN, 1.0, 3.0, 2.0]);
        assert_eq!(out[0], 0.875);
        assert!(out[1].is_nan());
        assert_eq!(out[2], 0.25);
        assert_eq!(out[3], 0.875);
        assert_eq!(out[4], 0.5);
        assert!(rank(&[f64::NAN]).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn demean_centres() {
        assert_eq!(demean(&[1.0, 2.0, 3.0]), vec![-1.0, 0.0, 1.0]);
    }

    proptest! {
        #[test]
        fn winsorize_within_percentile_bounds(x in prop::collection::vec(-1e6f64..1e6, 1..200)) {
            let mut sorted = x.clone();
            sorted.sort_by(f64::total_cmp);
            let lo = percentile(&sorted, 0.01).unwrap();
            let hi = percentile(&sorted, 0.99).unwrap();
            for v in winsorize(&x) {
                prop_assert!(v >= lo && v <= hi);
            }
        }

        #[test]
        fn standardize_has_unit_moments(x in prop::collection::vec(-1e3f64..1e3, 3..100)) {
            prop_assume!(sample_variance(&x).unwrap() > 1e-6);
            let out = standardize(&x);
            prop_assert!(mean(&out).unwrap().abs() < 1e-9);
            prop_assert!((sample_std(&out).unwrap() - 1.0).abs() < 1e-9);
        }
    }
}
