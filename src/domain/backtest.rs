//! Quantile backtest of a single-instrument factor.
//!
//! Observations are the positions where both the factor and the forward return
//! are defined. Each is assigned to one of `quantiles` equal-frequency layers by
//! factor rank (ties keep time order). The long-short portfolio is long the
//! forward return when the observation sits in the top layer, short it in the
//! bottom layer, and flat otherwise.

use crate::domain::error::FactorError;
use crate::domain::panel::{Field, PricePanel};
use crate::domain::result::{LayerSummary, finite_or_zero};
use crate::domain::series::{FactorSeries, mean, sample_std};
use tracing::debug;

pub const QUANTILE_CHOICES: [usize; 3] = [3, 5, 10];
const PROFIT_FACTOR_CAP: f64 = 99.9;
const PROFIT_FACTOR_NO_LOSSES: f64 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub periods: usize,
    pub quantiles: usize,
    /// Periods per year.
    pub annualization: f64,
}

impl BacktestConfig {
    pub fn new(periods: usize, quantiles: usize, annualization: f64) -> Result<Self, FactorError> {
        validate_periods(periods)?;
        validate_quantiles(quantiles)?;
        Ok(Self {
            periods,
            quantiles,
            annualization,
        })
    }
}

pub fn validate_periods(periods: usize) -> Result<(), FactorError> {
    if periods < 1 {
        return Err(FactorError::InvalidPeriods(periods));
    }
    Ok(())
}

pub fn validate_quantiles(quantiles: usize) -> Result<(), FactorError> {
    if !QUANTILE_CHOICES.contains(&quantiles) {
        return Err(FactorError::InvalidQuantile(quantiles));
    }
    Ok(())
}

/// Simple return of `close` over the next `periods` bars. The last `periods`
/// entries, and any entry with an undefined or zero base, are undefined.
pub fn forward_returns(close: &[f64], periods: usize) -> Vec<f64> {
    (0..close.len())
        .map(|t| {
            let Some(&future) = close.get(t + periods) else {
                return f64::NAN;
            };
            let base = close[t];
            let r = if base == 0.0 { f64::NAN } else { future / base - 1.0 };
            if r.is_finite() { r } else { f64::NAN }
        })
        .collect()
}

/// Layer index (0 = lowest factor values) for each value, by rank with ties
/// broken by position.
pub fn assign_layers(values: &[f64], quantiles: usize) -> Vec<usize> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]).then(a.cmp(&b)));

    let mut layers = vec![0; n];
    for (rank, &idx) in order.iter().enumerate() {
        layers[idx] = rank * quantiles / n;
    }
    layers
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    /// Position in the panel.
    pub index: usize,
    pub factor: f64,
    pub forward_return: f64,
    pub layer: usize,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PortfolioStats {
    pub total_return: f64,
    pub annualized_return: f64,
    pub annualized_vol: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub calmar: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub num_trades: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Backtest {
    pub observations: Vec<Observation>,
    /// Long-short return per observation (0 when flat).
    pub long_short: Vec<f64>,
    pub equity: Vec<f64>,
    pub drawdown: Vec<f64>,
    /// Whether each observation sits in the long leg.
    pub in_top: Vec<bool>,
    pub layers: Vec<LayerSummary>,
    pub is_monotonic: bool,
    pub spread: f64,
    pub stats: PortfolioStats,
}

impl Backtest {
    pub fn run(factor: &FactorSeries, panel: &PricePanel, config: &BacktestConfig) -> Self {
        let forward = forward_returns(&panel.column(Field::Close), config.periods);
        let valid: Vec<(usize, f64, f64)> = factor
            .values()
            .iter()
            .zip(&forward)
            .enumerate()
            .filter(|(_, (f, r))| !f.is_nan() && !r.is_nan())
            .map(|(i, (&f, &r))| (i, f, r))
            .collect();

        let factors: Vec<f64> = valid.iter().map(|v| v.1).collect();
        let layer_of = assign_layers(&factors, config.quantiles);
        let observations: Vec<Observation> = valid
            .iter()
            .zip(&layer_of)
            .map(|(&(index, factor, forward_return), &layer)| Observation {
                index,
                factor,
                forward_return,
                layer,
            })
            .collect();

        let bottom = layer_of.iter().copied().min();
        let top = layer_of.iter().copied().max();
        let (long_short, in_top, active) = match (bottom, top) {
            (Some(lo), Some(hi)) if lo < hi => long_short_returns(&observations, lo, hi),
            _ => (
                vec![0.0; observations.len()],
                vec![false; observations.len()],
                Vec::new(),
            ),
        };

        let equity = compound(&long_short);
        let drawdown = compute_drawdown(&equity);
        let layers = layer_summaries(&observations, config);
        let is_monotonic = is_monotonic(&layers);
        let spread = match (bottom, top) {
            (Some(lo), Some(hi)) => layers[hi].mean_return - layers[lo].mean_return,
            _ => 0.0,
        };
        let stats = portfolio_stats(&equity, &drawdown, &active, config.annualization);

        debug!(
            observations = observations.len(),
            active = stats.num_trades,
            quantiles = config.quantiles,
            periods = config.periods,
            "backtest complete"
        );

        Self {
            observations,
            long_short,
            equity,
            drawdown,
            in_top,
            layers,
            is_monotonic,
            spread: finite_or_zero(spread),
            stats,
        }
    }

    pub fn factor_values(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.factor).collect()
    }

    pub fn forward_returns(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.forward_return).collect()
    }
}

fn long_short_returns(
    observations: &[Observation],
    bottom: usize,
    top: usize,
) -> (Vec<f64>, Vec<bool>, Vec<f64>) {
    let mut long_short = Vec::with_capacity(observations.len());
    let mut in_top = Vec::with_capacity(observations.len());
    let mut active = Vec::new();
    for obs in observations {
        let position = if obs.layer == top {
            1.0
        } else if obs.layer == bottom {
            -1.0
        } else {
            0.0
        };
        let ret = position * obs.forward_return;
        if position != 0.0 {
            active.push(ret);
        }
        long_short.push(ret);
        in_top.push(obs.layer == top);
    }
    (long_short, in_top, active)
}

/// Cumulative product of (1 + r), starting from 1.0.
pub fn compound(returns: &[f64]) -> Vec<f64> {
    let mut equity = 1.0;
    returns
        .iter()
        .map(|r| {
            equity *= 1.0 + r;
            equity
        })
        .collect()
}

/// equity / running max - 1, so every entry is at most zero.
pub fn compute_drawdown(equity: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    equity
        .iter()
        .map(|&e| {
            peak = peak.max(e);
            if peak > 0.0 { e / peak - 1.0 } else { 0.0 }
        })
        .collect()
}

fn layer_summaries(observations: &[Observation], config: &BacktestConfig) -> Vec<LayerSummary> {
    (0..config.quantiles)
        .map(|layer| {
            let returns: Vec<f64> = observations
                .iter()
                .filter(|o| o.layer == layer)
                .map(|o| o.forward_return)
                .collect();
            let mean_return = mean(&returns).unwrap_or(0.0);
            let total_return = returns.iter().fold(1.0, |acc, r| acc * (1.0 + r)) - 1.0;
            let sharpe = match sample_std(&returns) {
                Some(sd) if sd > 0.0 => mean_return / sd * config.annualization.sqrt(),
                _ => 0.0,
            };
            let win_rate = if returns.is_empty() {
                0.0
            } else {
                returns.iter().filter(|&&r| r > 0.0).count() as f64 / returns.len() as f64
            };
            LayerSummary {
                layer: layer + 1,
                mean_return: finite_or_zero(mean_return),
                total_return: finite_or_zero(total_return),
                sharpe: finite_or_zero(sharpe),
                win_rate,
                count: returns.len(),
            }
        })
        .collect()
}

/// True when the mean returns of the non-empty layers are all non-decreasing
/// or all non-increasing in layer order. Needs at least two non-empty layers.
pub fn is_monotonic(layers: &[LayerSummary]) -> bool {
    let means: Vec<f64> = layers
        .iter()
        .filter(|l| l.count > 0)
        .map(|l| l.mean_return)
        .collect();
    if means.len() < 2 {
        return false;
    }
    let ascending = means.windows(2).all(|w| w[1] >= w[0]);
    let descending = means.windows(2).all(|w| w[1] <= w[0]);
    ascending || descending
}

fn portfolio_stats(
    equity: &[f64],
    drawdown: &[f64],
    active: &[f64],
    annualization: f64,
) -> PortfolioStats {
    let total_return = equity.last().map(|e| e - 1.0).unwrap_or(0.0);
    let years = equity.len() as f64 / annualization;
    let annualized_return = if years > 0.0 && 1.0 + total_return > 0.0 {
        (1.0 + total_return).powf(1.0 / years) - 1.0
    } else {
        0.0
    };

    let max_drawdown = drawdown.iter().copied().fold(0.0, f64::min);
    let vol = sample_std(active).unwrap_or(0.0);
    let (sharpe, sortino) = compute_risk_adjusted(active, annualization);
    let calmar = if max_drawdown != 0.0 {
        annualized_return / max_drawdown.abs()
    } else {
        0.0
    };

    let wins: Vec<f64> = active.iter().copied().filter(|&r| r > 0.0).collect();
    let losses: Vec<f64> = active.iter().copied().filter(|&r| r < 0.0).collect();
    let win_rate = if active.is_empty() {
        0.5
    } else {
        wins.len() as f64 / active.len() as f64
    };
    let total_wins: f64 = wins.iter().sum();
    let total_losses: f64 = losses.iter().sum::<f64>().abs();
    let profit_factor = if total_losses > 0.0 {
        total_wins / total_losses
    } else {
        PROFIT_FACTOR_NO_LOSSES
    };

    PortfolioStats {
        total_return: finite_or_zero(total_return),
        annualized_return: finite_or_zero(annualized_return),
        annualized_vol: finite_or_zero(vol * annualization.sqrt()),
        sharpe,
        sortino,
        calmar: finite_or_zero(calmar),
        max_drawdown: finite_or_zero(max_drawdown),
        win_rate,
        profit_factor: finite_or_zero(profit_factor.min(PROFIT_FACTOR_CAP)),
        avg_win: mean(&wins).unwrap_or(0.0),
        avg_loss: mean(&losses).unwrap_or(0.0),
        num_trades: active.len(),
    }
}

/// Annualized Sharpe and Sortino of the active long-short returns. Sortino
/// divides by the sample std of the negative returns.
fn compute_risk_adjusted(active: &[f64], annualization: f64) -> (f64, f64) {
    let Some(mean_ret) = mean(active) else {
        return (0.0, 0.0);
    };
    let scale = annualization.sqrt();

    let sharpe = match sample_std(active) {
        Some(sd) if sd > 0.0 => mean_ret / sd * scale,
        _ => 0.0,
    };

    let downside: Vec<f64> = active.iter().copied().filter(|&r| r < 0.0).collect();
    let sortino = match sample_std(&downside) {
        Some(sd) if sd > 0.0 => mean_ret / sd * scale,
        _ => 0.0,
    };

    (finite_or_zero(sharpe), finite_or_zero(sortino))
}
