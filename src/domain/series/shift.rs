//! Lagged values and differences.
//!
//! ts_delay(x, n)[i] = x[i - n]; the first n entries are undefined.
//! A zero shift is the identity.

use super::sanitize;

pub fn ts_delay(x: &[f64], n: usize) -> Vec<f64> {
    (0..x.len())
        .map(|i| if i >= n { x[i - n] } else { f64::NAN })
        .collect()
}

pub fn ts_delta(x: &[f64], n: usize) -> Vec<f64> {
    let lagged = ts_delay(x, n);
    sanitize(x.iter().zip(&lagged).map(|(a, b)| a - b).collect())
}

/// x / ts_delay(x, n) - 1. A zero base is undefined.
pub fn ts_returns(x: &[f64], n: usize) -> Vec<f64> {
    let lagged = ts_delay(x, n);
    sanitize(
        x.iter()
            .zip(&lagged)
            .map(|(a, b)| if *b == 0.0 { f64::NAN } else { a / b - 1.0 })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn delay_shifts_back() {
        let out = ts_delay(&[1.0, 2.0, 3.0, 4.0], 2);
        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
        assert_eq!(out[2], 1.0);
        assert_eq!(out[3], 2.0);
    }

    #[test]
    fn delay_longer_than_series_is_undefined() {
        assert!(ts_delay(&[1.0, 2.0], 5).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn delta_and_returns() {
        let x = [100.0, 110.0, 99.0];
        let d = ts_delta(&x, 1);
        assert!(d[0].is_nan());
        assert_relative_eq!(d[1], 10.0);
        assert_relative_eq!(d[2], -11.0);

        let r = ts_returns(&x, 1);
        assert!(r[0].is_nan());
        assert_relative_eq!(r[1], 0.1, epsilon = 1e-12);
        assert_relative_eq!(r[2], -0.1, epsilon = 1e-12);
    }

    #[test]
    fn returns_from_zero_base_is_undefined() {
        let r = ts_returns(&[0.0, 5.0], 1);
        assert!(r[1].is_nan());
    }

    #[test]
    fn undefined_input_propagates() {
        let r = ts_returns(&[1.0, f64::NAN, 3.0], 1);
        assert!(r[1].is_nan());
        assert!(r[2].is_nan());
    }

    proptest! {
        #[test]
        fn zero_delay_is_identity(x in prop::collection::vec(-1e6f64..1e6, 0..50)) {
            prop_assert_eq!(ts_delay(&x, 0), x);
        }

        #[test]
        fn delay_keeps_length(x in prop::collection::vec(-1e6f64..1e6, 0..50), n in 0usize..60) {
            let out = ts_delay(&x, n);
            prop_assert_eq!(out.len(), x.len());
            prop_assert_eq!(out.iter().take(n).filter(|v| v.is_nan()).count(), n.min(x.len()));
        }
    }
}
