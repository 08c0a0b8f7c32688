//! IC statistics, diagnostics, validity battery and composite score.
//!
//! All inputs are in observation space: the aligned factor values and forward
//! returns that survived the backtest's filtering, in time order.

use crate::domain::result::{IcBin, PeriodIc, ValidityChecks, finite_or_zero};
use crate::domain::series::{defined_values, mean, pearson, sample_std, spearman};
use crate::domain::settings::ScorePolicy;
use chrono::{Datelike, NaiveDateTime};
use statrs::distribution::{ContinuousCDF, StudentsT};

const T_CRITICAL: f64 = 1.96;
const MIN_MEANINGFUL_IC: f64 = 0.01;
const RANDOM_WIN_RATE: f64 = 0.48;

/// Pearson correlation of factor and forward return over each trailing window.
/// Entries before the first full window are undefined.
pub fn rolling_ic(factor: &[f64], returns: &[f64], window: usize) -> Vec<f64> {
    let n = factor.len().min(returns.len());
    let mut out = vec![f64::NAN; n];
    if window < 2 {
        return out;
    }
    for i in (window - 1)..n {
        let start = i + 1 - window;
        if let Some(ic) = pearson(&factor[start..=i], &returns[start..=i]) {
            out[i] = ic;
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct IcSummary {
    pub ic_mean: f64,
    pub ic_std: f64,
    pub ic_ir: f64,
    pub t_stat: f64,
    pub p_value: f64,
    pub ic_positive_pct: f64,
    /// Defined IC observations.
    pub count: usize,
}

impl IcSummary {
    pub fn from_series(ic: &[f64]) -> Self {
        let values = defined_values(ic);
        let count = values.len();
        let ic_mean = mean(&values).unwrap_or(0.0);
        let ic_std = sample_std(&values).unwrap_or(0.0);
        let ic_ir = if ic_std > 0.0 { ic_mean / ic_std } else { 0.0 };
        let (t_stat, p_value) = t_test(ic_mean, ic_std, count);
        let ic_positive_pct = if count > 0 {
            values.iter().filter(|&&v| v > 0.0).count() as f64 / count as f64
        } else {
            0.0
        };
        Self {
            ic_mean: finite_or_zero(ic_mean),
            ic_std: finite_or_zero(ic_std),
            ic_ir: finite_or_zero(ic_ir),
            t_stat,
            p_value,
            ic_positive_pct,
            count,
        }
    }
}

/// One-sample t-test of the mean IC against zero, two-tailed at n - 1 degrees
/// of freedom.
pub fn t_test(ic_mean: f64, ic_std: f64, n: usize) -> (f64, f64) {
    if n < 2 || !(ic_std > 0.0) {
        return (0.0, 1.0);
    }
    let t = ic_mean / (ic_std / (n as f64).sqrt());
    if !t.is_finite() {
        return (0.0, 1.0);
    }
    let p = match StudentsT::new(0.0, 1.0, (n - 1) as f64) {
        Ok(dist) => 2.0 * (1.0 - dist.cdf(t.abs())),
        Err(_) => 1.0,
    };
    (t, p.clamp(0.0, 1.0))
}

/// Rolling mean / std of the IC series with undefined IC counted as zero.
pub fn rolling_icir(ic: &[f64], window: usize) -> Vec<f64> {
    let filled: Vec<f64> = ic.iter().map(|&v| if v.is_nan() { 0.0 } else { v }).collect();
    let mut out = vec![f64::NAN; filled.len()];
    if window < 2 {
        return out;
    }
    for i in (window - 1)..filled.len() {
        let w = &filled[i + 1 - window..=i];
        if let (Some(m), Some(sd)) = (mean(w), sample_std(w)) {
            if sd > 0.0 {
                out[i] = m / sd;
            }
        }
    }
    out
}

/// Running sum of the IC series with undefined IC counted as zero.
pub fn cumulative_ic(ic: &[f64]) -> Vec<f64> {
    let mut total = 0.0;
    ic.iter()
        .map(|&v| {
            if !v.is_nan() {
                total += v;
            }
            total
        })
        .collect()
}

/// Mean absolute change in long-leg membership between consecutive periods.
pub fn turnover(in_top: &[bool]) -> f64 {
    if in_top.len() < 2 {
        return 0.0;
    }
    let changes = in_top.windows(2).filter(|w| w[0] != w[1]).count();
    changes as f64 / (in_top.len() - 1) as f64
}

/// Lag-1 autocorrelation over consecutive pairs where both values are defined.
pub fn autocorrelation(values: &[f64]) -> f64 {
    let (x, y): (Vec<f64>, Vec<f64>) = values
        .windows(2)
        .filter(|w| !w[0].is_nan() && !w[1].is_nan())
        .map(|w| (w[0], w[1]))
        .unzip();
    pearson(&x, &y).unwrap_or(0.0)
}

/// Equal-width histogram of the defined IC values, labelled by each bin's left
/// edge. Empty unless there are more than `min_count` values.
pub fn ic_histogram(ic: &[f64], bins: usize, min_count: usize) -> Vec<IcBin> {
    let values = defined_values(ic);
    if values.len() <= min_count || bins == 0 {
        return Vec::new();
    }
    let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !(hi > lo) {
        return vec![IcBin {
            range: format!("{lo:.2}"),
            count: values.len(),
        }];
    }

    let width = (hi - lo) / bins as f64;
    let mut counts = vec![0usize; bins];
    for v in &values {
        let idx = (((v - lo) / width).floor() as usize).min(bins - 1);
        counts[idx] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| IcBin {
            range: format!("{:.2}", lo + i as f64 * width),
            count,
        })
        .collect()
}

/// Spearman IC per calendar month, for months with at least `min_obs`
/// observations. Labels are `YYYY-MM`.
pub fn monthly_ic(
    timestamps: &[NaiveDateTime],
    factor: &[f64],
    returns: &[f64],
    min_obs: usize,
) -> Vec<PeriodIc> {
    let n = timestamps.len().min(factor.len()).min(returns.len());
    let mut out = Vec::new();
    let mut start = 0;
    while start < n {
        let key = (timestamps[start].year(), timestamps[start].month());
        let mut end = start + 1;
        while end < n && (timestamps[end].year(), timestamps[end].month()) == key {
            end += 1;
        }
        if end - start >= min_obs {
            if let Some(ic) = spearman(&factor[start..end], &returns[start..end]) {
                out.push(PeriodIc {
                    period: format!("{:04}-{:02}", key.0, key.1),
                    ic,
                });
            }
        }
        start = end;
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidityInputs {
    pub t_stat: f64,
    pub ic_mean: f64,
    pub sharpe: f64,
    pub win_rate: f64,
    pub observations: usize,
    pub min_observations: usize,
}

/// Runs the validity battery; returns the checks and a reason naming every
/// failing check.
pub fn assess_validity(inputs: &ValidityInputs) -> (ValidityChecks, String) {
    let checks = ValidityChecks {
        ic_significance: inputs.t_stat.abs() > T_CRITICAL,
        ic_meaningful: inputs.ic_mean.abs() > MIN_MEANINGFUL_IC,
        positive_sharpe: inputs.sharpe > 0.0,
        above_random: inputs.win_rate > RANDOM_WIN_RATE,
        sufficient_data: inputs.observations > inputs.min_observations,
    };

    let mut failures = Vec::new();
    if !checks.ic_significance {
        failures.push(format!(
            "ic_significance (|t| = {:.2}, needs > {T_CRITICAL})",
            inputs.t_stat.abs()
        ));
    }
    if !checks.ic_meaningful {
        failures.push(format!(
            "ic_meaningful (|ic| = {:.4}, needs > {MIN_MEANINGFUL_IC})",
            inputs.ic_mean.abs()
        ));
    }
    if !checks.positive_sharpe {
        failures.push(format!("positive_sharpe (sharpe = {:.2})", inputs.sharpe));
    }
    if !checks.above_random {
        failures.push(format!(
            "above_random (win rate = {:.1}%, needs > {:.0}%)",
            inputs.win_rate * 100.0,
            RANDOM_WIN_RATE * 100.0
        ));
    }
    if !checks.sufficient_data {
        failures.push(format!(
            "sufficient_data ({} observations, needs > {})",
            inputs.observations, inputs.min_observations
        ));
    }

    let reason = if failures.is_empty() {
        "passed all validity checks".to_string()
    } else {
        format!("failed: {}", failures.join("; "))
    };
    (checks, reason)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreInputs {
    pub ic_mean: f64,
    pub ic_ir: f64,
    pub sharpe: f64,
    pub win_rate: f64,
    pub max_drawdown: f64,
}

fn unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Weighted average of five contributions, each clamped to [0, 1], scaled to
/// [0, 100].
pub fn composite_score(inputs: &ScoreInputs, policy: &ScorePolicy) -> f64 {
    let contributions = [
        unit(inputs.ic_mean.abs() / policy.ic_full),
        unit(inputs.ic_ir.abs() / policy.icir_full),
        unit(inputs.sharpe / policy.sharpe_full),
        unit(
            (inputs.win_rate - policy.win_rate_floor)
                / (policy.win_rate_full - policy.win_rate_floor),
        ),
        unit(1.0 - inputs.max_drawdown.abs() / policy.drawdown_zero),
    ];
    let weights = policy.weights();
    let total: f64 = weights.iter().sum();
    if !(total > 0.0) {
        return 0.0;
    }
    let weighted: f64 = weights.iter().zip(contributions).map(|(w, c)| w * c).sum();
    (100.0 * weighted / total).clamp(0.0, 100.0)
}
