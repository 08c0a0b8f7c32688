//! Result shapes produced by a factor run. All serialize with serde; undefined
//! per-row values become `null`.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidityChecks {
    pub ic_significance: bool,
    pub ic_meaningful: bool,
    pub positive_sharpe: bool,
    pub above_random: bool,
    pub sufficient_data: bool,
}

impl ValidityChecks {
    pub fn all_pass(&self) -> bool {
        self.ic_significance
            && self.ic_meaningful
            && self.positive_sharpe
            && self.above_random
            && self.sufficient_data
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantileAnalysis {
    pub is_monotonic: bool,
    /// Top layer mean return minus bottom layer mean return.
    pub spread: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub ic_mean: f64,
    pub ic_std: f64,
    pub ic_ir: f64,
    pub t_stat: f64,
    pub p_value: f64,
    pub ic_positive_pct: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub calmar: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub max_drawdown: f64,
    pub total_return: f64,
    pub annualized_return: f64,
    pub annualized_vol: f64,
    pub turnover: f64,
    pub factor_autocorr: f64,
    pub num_trades: usize,
    pub num_observations: usize,
    pub periods: usize,
    pub n_quantiles: usize,
    pub score: f64,
    pub is_valid_factor: bool,
    pub validity_reason: String,
    pub validity_checks: ValidityChecks,
    pub quantile_analysis: QuantileAnalysis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDateTime,
    pub equity: Option<f64>,
    pub drawdown: Option<f64>,
    pub rolling_ic: Option<f64>,
    pub rolling_icir: Option<f64>,
    pub cumulative_ic: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IcBin {
    pub range: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodIc {
    pub period: String,
    pub ic: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSummary {
    /// 1-based; layer 1 holds the lowest factor values.
    pub layer: usize,
    pub mean_return: f64,
    pub total_return: f64,
    pub sharpe: f64,
    pub win_rate: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub metrics: Metrics,
    pub equity_curve: Vec<EquityPoint>,
    pub ic_histogram: Vec<IcBin>,
    pub cs_ic_data: Vec<PeriodIc>,
    pub layer_data: Vec<LayerSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorDetail {
    pub expression: String,
    pub weight: f64,
    pub ic: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinationResult {
    #[serde(flatten)]
    pub result: BacktestResult,
    pub factor_details: Vec<FactorDetail>,
}

/// Replaces NaN and infinities with zero for scalar metrics.
pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}
