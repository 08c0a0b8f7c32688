//! Expression evaluator.
//!
//! Walks the AST bottom-up against a borrowed panel and produces a
//! [`FactorSeries`] of the panel's length. Evaluation is pure: the same
//! expression and panel always give bit-identical output.
//!
//! Window checks run before any series is computed:
//! - zero on a rolling statistic, or above [`MAX_WINDOW`]: always an error
//! - longer than the panel: an all-undefined result under
//!   [`WindowPolicy::Lenient`], an error under [`WindowPolicy::Strict`]

use crate::domain::error::FactorError;
use crate::domain::expr::Expr;
use crate::domain::function::Function;
use crate::domain::panel::PricePanel;
use crate::domain::series::{
    FactorSeries, elementwise, pairwise, rolling, sanitize, shift, transform,
};
use tracing::{debug, warn};

pub const MAX_WINDOW: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowPolicy {
    #[default]
    Lenient,
    Strict,
}

/// Checks window literals that are invalid regardless of panel length.
pub fn check_windows(expr: &Expr) -> Result<(), FactorError> {
    for (function, n) in expr.windows() {
        if n < 0 {
            return Err(FactorError::InvalidWindow {
                function: function.name().to_string(),
                reason: format!("window {n} is negative"),
            });
        }
        if n == 0 && !function.allows_zero_window() {
            return Err(FactorError::InvalidWindow {
                function: function.name().to_string(),
                reason: "window must be at least 1".to_string(),
            });
        }
        if n > MAX_WINDOW as i64 {
            return Err(FactorError::InvalidWindow {
                function: function.name().to_string(),
                reason: format!("window {n} exceeds maximum {MAX_WINDOW}"),
            });
        }
    }
    Ok(())
}

pub struct Evaluator<'a> {
    panel: &'a PricePanel,
    policy: WindowPolicy,
}

impl<'a> Evaluator<'a> {
    pub fn new(panel: &'a PricePanel) -> Self {
        Self {
            panel,
            policy: WindowPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: WindowPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn evaluate(&self, expr: &Expr) -> Result<FactorSeries, FactorError> {
        check_windows(expr)?;
        self.check_panel_length(expr)?;

        let values = self.eval_node(expr);
        let series = FactorSeries::new(values);
        debug!(
            expression = %expr,
            bars = self.panel.len(),
            defined = series.defined_count(),
            "evaluated expression"
        );
        Ok(series)
    }

    fn check_panel_length(&self, expr: &Expr) -> Result<(), FactorError> {
        let len = self.panel.len();
        for (function, n) in expr.windows() {
            if n <= len as i64 {
                continue;
            }
            match self.policy {
                WindowPolicy::Strict => {
                    return Err(FactorError::InvalidWindow {
                        function: function.name().to_string(),
                        reason: format!("window {n} exceeds panel length {len}"),
                    });
                }
                WindowPolicy::Lenient => {
                    warn!(
                        function = function.name(),
                        window = n,
                        bars = len,
                        symbol = self.panel.symbol(),
                        "window longer than panel; output will be undefined"
                    );
                }
            }
        }
        Ok(())
    }

    fn eval_node(&self, expr: &Expr) -> Vec<f64> {
        let len = self.panel.len();
        match expr {
            Expr::Literal(v) => FactorSeries::constant(*v, len).into_values(),
            Expr::Field(field) => sanitize(self.panel.column(*field)),
            Expr::Neg(inner) => elementwise::negate(&self.eval_node(inner)),
            Expr::Binary { op, left, right } => {
                let l = self.eval_node(left);
                let r = self.eval_node(right);
                elementwise::binary(*op, &l, &r)
            }
            Expr::Call { function, args } => {
                let n = expr
                    .window()
                    .and_then(|n| usize::try_from(n).ok())
                    .unwrap_or(0);
                let series: Vec<Vec<f64>> = args
                    .iter()
                    .take(function.signature().series)
                    .map(|arg| self.eval_node(arg))
                    .collect();
                apply(*function, &series, n)
            }
        }
    }
}

fn apply(function: Function, args: &[Vec<f64>], n: usize) -> Vec<f64> {
    let x = &args[0];
    match function {
        Function::TsDelay => shift::ts_delay(x, n),
        Function::TsDelta => shift::ts_delta(x, n),
        Function::TsReturns | Function::TsPctChange => shift::ts_returns(x, n),
        Function::TsMean => rolling::ts_mean(x, n),
        Function::TsSum => rolling::ts_sum(x, n),
        Function::TsStd => rolling::ts_std(x, n),
        Function::TsVar => rolling::ts_var(x, n),
        Function::TsMax => rolling::ts_max(x, n),
        Function::TsMin => rolling::ts_min(x, n),
        Function::TsMedian => rolling::ts_median(x, n),
        Function::TsRank => rolling::ts_rank(x, n),
        Function::TsSkew => rolling::ts_skew(x, n),
        Function::TsKurt => rolling::ts_kurt(x, n),
        Function::TsArgmax => rolling::ts_argmax(x, n),
        Function::TsArgmin => rolling::ts_argmin(x, n),
        Function::TsZscore => rolling::ts_zscore(x, n),
        Function::TsCorr => pairwise::ts_corr(x, &args[1], n),
        Function::TsCov => pairwise::ts_cov(x, &args[1], n),
        Function::Winsorize => transform::winsorize(x),
        Function::Standardize => transform::standardize(x),
        Function::Normalize => transform::normalize(x),
        Function::Demean => transform::demean(x),
        Function::Rank => transform::rank(x),
        Function::Log => elementwise::log(x),
        Function::Log10 => elementwise::log10(x),
        Function::Exp => elementwise::exp(x),
        Function::Sqrt => elementwise::sqrt(x),
        Function::Abs => elementwise::abs(x),
        Function::Sign => elementwise::sign(x),
        Function::Max => elementwise::max(x, &args[1]),
        Function::Min => elementwise::min(x, &args[1]),
        Function::Fillna => elementwise::fill_undefined(x, &args[1]),
    }
}
