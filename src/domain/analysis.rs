//! Turns a factor series into a complete [`BacktestResult`].

use crate::domain::backtest::{Backtest, BacktestConfig, forward_returns};
use crate::domain::panel::{Field, PricePanel};
use crate::domain::result::{
    BacktestResult, EquityPoint, Metrics, QuantileAnalysis, finite_or_zero,
};
use crate::domain::series::{FactorSeries, defined};
use crate::domain::settings::AnalysisSettings;
use crate::domain::stats::{self, IcSummary, ScoreInputs, ValidityInputs};
use tracing::{debug, warn};

pub fn analyze(
    factor: &FactorSeries,
    panel: &PricePanel,
    config: &BacktestConfig,
    settings: &AnalysisSettings,
) -> BacktestResult {
    if factor.is_all_undefined() {
        warn!(symbol = panel.symbol(), "factor is undefined everywhere");
    }

    let bt = Backtest::run(factor, panel, config);
    let factors = bt.factor_values();
    let returns = bt.forward_returns();
    let timestamps: Vec<_> = bt
        .observations
        .iter()
        .map(|o| panel.bars()[o.index].timestamp)
        .collect();

    let rolling_ic = stats::rolling_ic(&factors, &returns, settings.ic_window);
    let rolling_icir = stats::rolling_icir(&rolling_ic, settings.icir_window);
    let cumulative_ic = stats::cumulative_ic(&rolling_ic);
    let ic = IcSummary::from_series(&rolling_ic);

    let observations = bt.observations.len();
    if observations <= settings.min_observations {
        warn!(
            symbol = panel.symbol(),
            observations,
            required = settings.min_observations,
            "insufficient observations"
        );
    }

    let (validity_checks, validity_reason) = stats::assess_validity(&ValidityInputs {
        t_stat: ic.t_stat,
        ic_mean: ic.ic_mean,
        sharpe: bt.stats.sharpe,
        win_rate: bt.stats.win_rate,
        observations,
        min_observations: settings.min_observations,
    });
    let score = stats::composite_score(
        &ScoreInputs {
            ic_mean: ic.ic_mean,
            ic_ir: ic.ic_ir,
            sharpe: bt.stats.sharpe,
            win_rate: bt.stats.win_rate,
            max_drawdown: bt.stats.max_drawdown,
        },
        &settings.score,
    );

    let metrics = Metrics {
        ic_mean: ic.ic_mean,
        ic_std: ic.ic_std,
        ic_ir: ic.ic_ir,
        t_stat: ic.t_stat,
        p_value: ic.p_value,
        ic_positive_pct: ic.ic_positive_pct,
        sharpe: bt.stats.sharpe,
        sortino: bt.stats.sortino,
        calmar: bt.stats.calmar,
        win_rate: bt.stats.win_rate,
        profit_factor: bt.stats.profit_factor,
        avg_win: bt.stats.avg_win,
        avg_loss: bt.stats.avg_loss,
        max_drawdown: bt.stats.max_drawdown,
        total_return: bt.stats.total_return,
        annualized_return: bt.stats.annualized_return,
        annualized_vol: bt.stats.annualized_vol,
        turnover: stats::turnover(&bt.in_top),
        factor_autocorr: finite_or_zero(stats::autocorrelation(factor.values())),
        num_trades: bt.stats.num_trades,
        num_observations: observations,
        periods: config.periods,
        n_quantiles: config.quantiles,
        score,
        is_valid_factor: validity_checks.all_pass(),
        validity_reason,
        validity_checks,
        quantile_analysis: QuantileAnalysis {
            is_monotonic: bt.is_monotonic,
            spread: bt.spread,
        },
    };

    let skip = match settings.chart_points {
        0 => 0,
        keep => observations.saturating_sub(keep),
    };
    let equity_curve: Vec<EquityPoint> = (skip..observations)
        .map(|i| EquityPoint {
            date: timestamps[i],
            equity: defined(bt.equity[i]),
            drawdown: defined(bt.drawdown[i]),
            rolling_ic: defined(rolling_ic[i]),
            rolling_icir: defined(rolling_icir[i]),
            cumulative_ic: defined(cumulative_ic[i]),
        })
        .collect();

    let ic_histogram = stats::ic_histogram(
        &rolling_ic,
        settings.histogram_bins,
        settings.histogram_min_ic,
    );
    let cs_ic_data = stats::monthly_ic(&timestamps, &factors, &returns, settings.monthly_min_obs);

    debug!(
        symbol = panel.symbol(),
        observations,
        ic_mean = metrics.ic_mean,
        score = metrics.score,
        valid = metrics.is_valid_factor,
        "analysis complete"
    );

    BacktestResult {
        metrics,
        equity_curve,
        ic_histogram,
        cs_ic_data,
        layer_data: bt.layers,
    }
}

/// Mean rolling IC of a standalone factor against the `periods`-ahead return.
pub fn factor_ic(
    factor: &FactorSeries,
    panel: &PricePanel,
    periods: usize,
    ic_window: usize,
) -> f64 {
    let forward = forward_returns(&panel.column(Field::Close), periods);
    let (factors, returns): (Vec<f64>, Vec<f64>) = factor
        .values()
        .iter()
        .zip(&forward)
        .filter(|(f, r)| !f.is_nan() && !r.is_nan())
        .map(|(&f, &r)| (f, r))
        .unzip();
    IcSummary::from_series(&stats::rolling_ic(&factors, &returns, ic_window)).ic_mean
}
