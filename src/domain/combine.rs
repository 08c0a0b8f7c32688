//! Weighted combination of standardized factors.

use crate::domain::error::FactorError;
use crate::domain::series::{FactorSeries, transform};

#[derive(Debug, Clone, PartialEq)]
pub struct WeightedFactor {
    pub expression: String,
    pub weight: f64,
}

pub fn validate_weights(factors: &[WeightedFactor]) -> Result<(), FactorError> {
    if factors.is_empty() {
        return Err(FactorError::EmptyCombination);
    }
    for f in factors {
        if !f.weight.is_finite() {
            return Err(FactorError::InvalidWeight {
                expression: f.expression.clone(),
                weight: f.weight,
            });
        }
    }
    Ok(())
}

/// Sums `weight * standardize(series)` across factors.
///
/// A factor that is undefined at a position contributes zero there; a position
/// where no factor is defined stays undefined.
pub fn combine(parts: &[(&FactorSeries, f64)]) -> FactorSeries {
    let len = parts.iter().map(|(s, _)| s.len()).max().unwrap_or(0);
    let mut total = vec![0.0; len];
    let mut covered = vec![false; len];

    for (series, weight) in parts {
        let z = transform::standardize(series.values());
        for (i, v) in z.iter().enumerate() {
            if !v.is_nan() {
                total[i] += weight * v;
                covered[i] = true;
            }
        }
    }

    let values = total
        .into_iter()
        .zip(covered)
        .map(|(v, c)| if c { v } else { f64::NAN })
        .collect();
    FactorSeries::new(values)
}
