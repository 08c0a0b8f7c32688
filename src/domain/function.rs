//! Built-in function registry.
//!
//! Every callable name resolves at parse time to a [`Function`] variant. Aliases
//! map onto the same variant, so the evaluator never looks anything up by string.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    TsDelay,
    TsDelta,
    TsReturns,
    TsPctChange,
    TsMean,
    TsSum,
    TsStd,
    TsVar,
    TsMax,
    TsMin,
    TsMedian,
    TsRank,
    TsSkew,
    TsKurt,
    TsArgmax,
    TsArgmin,
    TsZscore,
    TsCorr,
    TsCov,
    Winsorize,
    Standardize,
    Normalize,
    Demean,
    Rank,
    Log,
    Log10,
    Exp,
    Sqrt,
    Abs,
    Sign,
    Max,
    Min,
    Fillna,
}

/// Argument layout: `series` expression arguments, optionally followed by one
/// integer window literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub series: usize,
    pub window: bool,
}

impl Signature {
    const fn unary() -> Self {
        Self {
            series: 1,
            window: false,
        }
    }

    const fn binary() -> Self {
        Self {
            series: 2,
            window: false,
        }
    }

    const fn rolling() -> Self {
        Self {
            series: 1,
            window: true,
        }
    }

    const fn pairwise() -> Self {
        Self {
            series: 2,
            window: true,
        }
    }

    pub const fn arity(self) -> usize {
        self.series + self.window as usize
    }
}

/// A name the parser accepts, with the variant it resolves to.
#[derive(Debug, Clone, Copy)]
pub struct Registration {
    pub name: &'static str,
    pub function: Function,
    pub alias: bool,
}

const fn canonical(name: &'static str, function: Function) -> Registration {
    Registration {
        name,
        function,
        alias: false,
    }
}

const fn alias(name: &'static str, function: Function) -> Registration {
    Registration {
        name,
        function,
        alias: true,
    }
}

pub const REGISTRY: &[Registration] = &[
    canonical("ts_delay", Function::TsDelay),
    canonical("ts_delta", Function::TsDelta),
    canonical("ts_returns", Function::TsReturns),
    canonical("ts_pct_change", Function::TsPctChange),
    canonical("ts_mean", Function::TsMean),
    canonical("ts_sum", Function::TsSum),
    canonical("ts_std", Function::TsStd),
    canonical("ts_var", Function::TsVar),
    canonical("ts_max", Function::TsMax),
    canonical("ts_min", Function::TsMin),
    canonical("ts_median", Function::TsMedian),
    canonical("ts_rank", Function::TsRank),
    canonical("ts_skew", Function::TsSkew),
    canonical("ts_kurt", Function::TsKurt),
    canonical("ts_argmax", Function::TsArgmax),
    canonical("ts_argmin", Function::TsArgmin),
    canonical("ts_zscore", Function::TsZscore),
    canonical("ts_corr", Function::TsCorr),
    canonical("ts_cov", Function::TsCov),
    canonical("winsorize", Function::Winsorize),
    canonical("standardize", Function::Standardize),
    canonical("normalize", Function::Normalize),
    canonical("demean", Function::Demean),
    canonical("rank", Function::Rank),
    canonical("log", Function::Log),
    canonical("log10", Function::Log10),
    canonical("exp", Function::Exp),
    canonical("sqrt", Function::Sqrt),
    canonical("abs", Function::Abs),
    canonical("sign", Function::Sign),
    canonical("max", Function::Max),
    canonical("min", Function::Min),
    canonical("fillna", Function::Fillna),
    alias("delay", Function::TsDelay),
    alias("sma", Function::TsMean),
    alias("stddev", Function::TsStd),
    alias("rolling_corr", Function::TsCorr),
    alias("returns", Function::TsReturns),
];

impl Function {
    pub fn resolve(name: &str) -> Option<Self> {
        REGISTRY
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.function)
    }

    /// Canonical spelling, used when printing an expression back out.
    pub fn name(self) -> &'static str {
        REGISTRY
            .iter()
            .find(|r| r.function == self && !r.alias)
            .map(|r| r.name)
            .unwrap_or("?")
    }

    pub fn signature(self) -> Signature {
        match self {
            Function::TsDelay
            | Function::TsDelta
            | Function::TsReturns
            | Function::TsPctChange
            | Function::TsMean
            | Function::TsSum
            | Function::TsStd
            | Function::TsVar
            | Function::TsMax
            | Function::TsMin
            | Function::TsMedian
            | Function::TsRank
            | Function::TsSkew
            | Function::TsKurt
            | Function::TsArgmax
            | Function::TsArgmin
            | Function::TsZscore => Signature::rolling(),
            Function::TsCorr | Function::TsCov => Signature::pairwise(),
            Function::Max | Function::Min | Function::Fillna => Signature::binary(),
            Function::Winsorize
            | Function::Standardize
            | Function::Normalize
            | Function::Demean
            | Function::Rank
            | Function::Log
            | Function::Log10
            | Function::Exp
            | Function::Sqrt
            | Function::Abs
            | Function::Sign => Signature::unary(),
        }
    }

    pub fn arity(self) -> usize {
        self.signature().arity()
    }

    /// Shifts accept a zero window (identity); rolling statistics do not.
    pub fn allows_zero_window(self) -> bool {
        matches!(
            self,
            Function::TsDelay | Function::TsDelta | Function::TsReturns | Function::TsPctChange
        )
    }

    pub fn description(self) -> &'static str {
        match self {
            Function::TsDelay => "value n bars ago",
            Function::TsDelta => "x - ts_delay(x, n)",
            Function::TsReturns => "x / ts_delay(x, n) - 1",
            Function::TsPctChange => "percent change over n bars",
            Function::TsMean => "rolling mean",
            Function::TsSum => "rolling sum",
            Function::TsStd => "rolling sample standard deviation",
            Function::TsVar => "rolling sample variance",
            Function::TsMax => "rolling maximum",
            Function::TsMin => "rolling minimum",
            Function::TsMedian => "rolling median",
            Function::TsRank => "percentile rank of the current value in the window",
            Function::TsSkew => "rolling sample skewness",
            Function::TsKurt => "rolling sample excess kurtosis",
            Function::TsArgmax => "offset of the window maximum",
            Function::TsArgmin => "offset of the window minimum",
            Function::TsZscore => "(x - ts_mean) / ts_std",
            Function::TsCorr => "rolling Pearson correlation",
            Function::TsCov => "rolling sample covariance",
            Function::Winsorize => "clip to the full-series 1st/99th percentiles",
            Function::Standardize => "full-series z-score",
            Function::Normalize => "full-series min-max scaling to [0, 1]",
            Function::Demean => "subtract the full-series mean",
            Function::Rank => "full-series percentile rank",
            Function::Log => "natural logarithm",
            Function::Log10 => "base-10 logarithm",
            Function::Exp => "exponential",
            Function::Sqrt => "square root",
            Function::Abs => "absolute value",
            Function::Sign => "sign (-1, 0, 1)",
            Function::Max => "elementwise maximum",
            Function::Min => "elementwise minimum",
            Function::Fillna => "replace undefined entries of x with y",
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
