//! Elementwise arithmetic and scalar math.
//!
//! Any undefined operand gives an undefined result. Domain errors (log of a
//! non-positive number, division by zero, overflow) also become undefined.

use super::sanitize;
use crate::domain::expr::BinaryOp;

pub fn map<F>(x: &[f64], f: F) -> Vec<f64>
where
    F: Fn(f64) -> f64,
{
    sanitize(
        x.iter()
            .map(|&v| if v.is_nan() { f64::NAN } else { f(v) })
            .collect(),
    )
}

pub fn zip_with<F>(a: &[f64], b: &[f64], f: F) -> Vec<f64>
where
    F: Fn(f64, f64) -> f64,
{
    sanitize(
        a.iter()
            .zip(b)
            .map(|(&l, &r)| {
                if l.is_nan() || r.is_nan() {
                    f64::NAN
                } else {
                    f(l, r)
                }
            })
            .collect(),
    )
}

pub fn binary(op: BinaryOp, a: &[f64], b: &[f64]) -> Vec<f64> {
    zip_with(a, b, |l, r| op.apply(l, r))
}

pub fn negate(x: &[f64]) -> Vec<f64> {
    map(x, |v| -v)
}

pub fn log(x: &[f64]) -> Vec<f64> {
    map(x, |v| if v > 0.0 { v.ln() } else { f64::NAN })
}

pub fn log10(x: &[f64]) -> Vec<f64> {
    map(x, |v| if v > 0.0 { v.log10() } else { f64::NAN })
}

pub fn exp(x: &[f64]) -> Vec<f64> {
    map(x, f64::exp)
}

/// Square root of strictly positive input.
pub fn sqrt(x: &[f64]) -> Vec<f64> {
    map(x, |v| if v > 0.0 { v.sqrt() } else { f64::NAN })
}

pub fn abs(x: &[f64]) -> Vec<f64> {
    map(x, f64::abs)
}

pub fn sign(x: &[f64]) -> Vec<f64> {
    map(x, |v| {
        if v > 0.0 {
            1.0
        } else if v < 0.0 {
            -1.0
        } else {
            0.0
        }
    })
}

pub fn max(a: &[f64], b: &[f64]) -> Vec<f64> {
    zip_with(a, b, f64::max)
}

pub fn min(a: &[f64], b: &[f64]) -> Vec<f64> {
    zip_with(a, b, f64::min)
}

/// Takes `fill` wherever `x` is undefined. The one operation that does not
/// propagate an undefined operand.
pub fn fill_undefined(x: &[f64], fill: &[f64]) -> Vec<f64> {
    sanitize(
        x.iter()
            .zip(fill)
            .map(|(&v, &f)| if v.is_nan() { f } else { v })
            .collect(),
    )
}
