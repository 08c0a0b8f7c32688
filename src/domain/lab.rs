//! Request orchestration shared by every front end.
//!
//! Parameters and expressions are validated before any data is loaded; the
//! panel is then fetched once and every engine runs over the borrowed panel.

use crate::domain::analysis::{analyze, factor_ic};
use crate::domain::backtest::BacktestConfig;
use crate::domain::combine::{WeightedFactor, combine, validate_weights};
use crate::domain::error::FactorError;
use crate::domain::evaluator::{Evaluator, check_windows};
use crate::domain::expr::Expr;
use crate::domain::expr_parser::parse;
use crate::domain::panel::{Interval, PricePanel};
use crate::domain::result::{BacktestResult, CombinationResult, FactorDetail};
use crate::domain::series::FactorSeries;
use crate::domain::settings::AnalysisSettings;
use crate::ports::data_port::DataPort;
use chrono::NaiveDateTime;
use std::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationRequest {
    pub expression: String,
    pub symbol: String,
    pub interval: Interval,
    pub periods: usize,
    pub quantile: usize,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CombinationRequest {
    pub symbol: String,
    pub interval: Interval,
    pub periods: usize,
    pub quantile: usize,
    pub factors: Vec<WeightedFactor>,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

/// Parses an expression and checks its window literals.
pub fn check_expression(expression: &str) -> Result<Expr, FactorError> {
    let expr = parse(expression)?;
    check_windows(&expr)?;
    Ok(expr)
}

pub struct FactorLab<'a> {
    data: &'a dyn DataPort,
    settings: &'a AnalysisSettings,
}

impl<'a> FactorLab<'a> {
    pub fn new(data: &'a dyn DataPort, settings: &'a AnalysisSettings) -> Self {
        Self { data, settings }
    }

    pub fn evaluate(&self, request: &EvaluationRequest) -> Result<BacktestResult, FactorError> {
        let started = Instant::now();
        let expr = check_expression(&request.expression)?;
        let config = self.backtest_config(request.interval, request.periods, request.quantile)?;

        let panel = self.data.fetch_panel(
            &request.symbol,
            request.interval,
            request.start,
            request.end,
        )?;
        let factor = self.evaluate_on(&expr, &panel)?;
        let result = analyze(&factor, &panel, &config, self.settings);

        info!(
            expression = %expr,
            symbol = %request.symbol,
            interval = %request.interval,
            observations = result.metrics.num_observations,
            score = result.metrics.score,
            valid = result.metrics.is_valid_factor,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "factor evaluated"
        );
        Ok(result)
    }

    pub fn combine(&self, request: &CombinationRequest) -> Result<CombinationResult, FactorError> {
        let started = Instant::now();
        validate_weights(&request.factors)?;
        let exprs = request
            .factors
            .iter()
            .map(|f| check_expression(&f.expression))
            .collect::<Result<Vec<_>, _>>()?;
        let config = self.backtest_config(request.interval, request.periods, request.quantile)?;

        let panel = self.data.fetch_panel(
            &request.symbol,
            request.interval,
            request.start,
            request.end,
        )?;
        let series = exprs
            .iter()
            .map(|expr| self.evaluate_on(expr, &panel))
            .collect::<Result<Vec<FactorSeries>, _>>()?;

        let parts: Vec<(&FactorSeries, f64)> = series
            .iter()
            .zip(&request.factors)
            .map(|(s, f)| (s, f.weight))
            .collect();
        let combined = combine(&parts);
        let result = analyze(&combined, &panel, &config, self.settings);

        let factor_details = series
            .iter()
            .zip(&request.factors)
            .map(|(s, f)| FactorDetail {
                expression: f.expression.clone(),
                weight: f.weight,
                ic: factor_ic(s, &panel, config.periods, self.settings.ic_window),
            })
            .collect();

        info!(
            symbol = %request.symbol,
            interval = %request.interval,
            factors = request.factors.len(),
            score = result.metrics.score,
            valid = result.metrics.is_valid_factor,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "combination evaluated"
        );
        Ok(CombinationResult {
            result,
            factor_details,
        })
    }

    fn backtest_config(
        &self,
        interval: Interval,
        periods: usize,
        quantile: usize,
    ) -> Result<BacktestConfig, FactorError> {
        BacktestConfig::new(periods, quantile, self.settings.annualization(interval))
    }

    fn evaluate_on(&self, expr: &Expr, panel: &PricePanel) -> Result<FactorSeries, FactorError> {
        let started = Instant::now();
        let series = Evaluator::new(panel)
            .with_policy(self.settings.window_policy())
            .evaluate(expr)?;
        debug!(
            expression = %expr,
            elapsed_us = started.elapsed().as_micros() as u64,
            "evaluation finished"
        );
        Ok(series)
    }
}
