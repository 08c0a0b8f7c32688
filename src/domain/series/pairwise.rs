//! Rolling statistics over two aligned series.

use super::{pearson, sanitize};

fn rolling_pair<F>(x: &[f64], y: &[f64], n: usize, f: F) -> Vec<f64>
where
    F: Fn(&[f64], &[f64]) -> f64,
{
    let len = x.len().min(y.len());
    let mut out = vec![f64::NAN; len];
    if n == 0 {
        return out;
    }
    for i in (n - 1)..len {
        let wx = &x[i + 1 - n..=i];
        let wy = &y[i + 1 - n..=i];
        if wx.iter().chain(wy).any(|v| v.is_nan()) {
            continue;
        }
        out[i] = f(wx, wy);
    }
    sanitize(out)
}

/// Rolling Pearson correlation; undefined when either side is flat.
pub fn ts_corr(x: &[f64], y: &[f64], n: usize) -> Vec<f64> {
    rolling_pair(x, y, n, |wx, wy| pearson(wx, wy).unwrap_or(f64::NAN))
}

/// Rolling sample covariance; undefined for n = 1.
pub fn ts_cov(x: &[f64], y: &[f64], n: usize) -> Vec<f64> {
    rolling_pair(x, y, n, |wx, wy| {
        let len = wx.len();
        if len < 2 {
            return f64::NAN;
        }
        let mx = wx.iter().sum::<f64>() / len as f64;
        let my = wy.iter().sum::<f64>() / len as f64;
        let s: f64 = wx.iter().zip(wy).map(|(a, b)| (a - mx) * (b - my)).sum();
        s / (len - 1) as f64
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn corr_of_linear_relation() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [10.0, 20.0, 30.0, 40.0, 50.0];
        let out = ts_corr(&x, &y, 3);
        assert!(out[1].is_nan());
        for v in &out[2..] {
            assert_relative_eq!(*v, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn corr_with_flat_series_is_undefined() {
        let out = ts_corr(&[1.0, 2.0, 3.0], &[4.0, 4.0, 4.0], 3);
        assert!(out[2].is_nan());
    }

    #[test]
    fn cov_matches_sample_formula() {
        let x = [1.0, 2.0, 3.0];
        let y = [2.0, 4.0, 7.0];
        let out = ts_cov(&x, &y, 3);
        // means 2 and 13/3; cross deviations sum to 5
        assert_relative_eq!(out[2], 2.5, epsilon = 1e-12);
        assert!(ts_cov(&x, &y, 1).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn undefined_in_either_input_propagates() {
        let x = [1.0, f64::NAN, 3.0, 4.0];
        let y = [1.0, 2.0, 3.0, 5.0];
        let out = ts_cov(&x, &y, 2);
        assert!(out[1].is_nan());
        assert!(out[2].is_nan());
        assert!(!out[3].is_nan());
    }
}
