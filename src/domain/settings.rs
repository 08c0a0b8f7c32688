//! Analysis policy loaded from configuration.
//!
//! Every key is optional; absent keys take the documented defaults. Values are
//! validated once here so the engines can trust them.

use crate::domain::error::FactorError;
use crate::domain::evaluator::WindowPolicy;
use crate::domain::panel::Interval;
use crate::ports::config_port::ConfigPort;

/// Weights and saturation points of the composite 0-100 score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScorePolicy {
    pub w_ic: f64,
    pub w_icir: f64,
    pub w_sharpe: f64,
    pub w_win_rate: f64,
    pub w_drawdown: f64,
    /// |ic_mean| at which the IC contribution saturates.
    pub ic_full: f64,
    pub icir_full: f64,
    pub sharpe_full: f64,
    /// Win rate contributing nothing.
    pub win_rate_floor: f64,
    pub win_rate_full: f64,
    /// |max_drawdown| at which the drawdown contribution reaches zero.
    pub drawdown_zero: f64,
}

impl Default for ScorePolicy {
    fn default() -> Self {
        Self {
            w_ic: 30.0,
            w_icir: 20.0,
            w_sharpe: 25.0,
            w_win_rate: 15.0,
            w_drawdown: 10.0,
            ic_full: 0.05,
            icir_full: 0.5,
            sharpe_full: 1.5,
            win_rate_floor: 0.45,
            win_rate_full: 0.60,
            drawdown_zero: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisSettings {
    pub ic_window: usize,
    pub icir_window: usize,
    pub min_observations: usize,
    pub histogram_bins: usize,
    pub histogram_min_ic: usize,
    pub monthly_min_obs: usize,
    /// Most recent equity-curve rows kept in results; 0 keeps all.
    pub chart_points: usize,
    pub strict_windows: bool,
    pub annualization_factor: Option<f64>,
    pub score: ScorePolicy,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            ic_window: 20,
            icir_window: 60,
            min_observations: 100,
            histogram_bins: 15,
            histogram_min_ic: 10,
            monthly_min_obs: 5,
            chart_points: 500,
            strict_windows: false,
            annualization_factor: None,
            score: ScorePolicy::default(),
        }
    }
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> FactorError {
    FactorError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn read_count(
    config: &dyn ConfigPort,
    key: &str,
    default: usize,
    min: i64,
) -> Result<usize, FactorError> {
    let value = config.get_int("analysis", key, default as i64);
    if value < min {
        return Err(invalid(
            "analysis",
            key,
            format!("{key} must be at least {min}"),
        ));
    }
    Ok(value as usize)
}

impl ScorePolicy {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, FactorError> {
        let d = Self::default();
        let get = |key: &str, default: f64| config.get_double("score", key, default);
        let policy = Self {
            w_ic: get("w_ic", d.w_ic),
            w_icir: get("w_icir", d.w_icir),
            w_sharpe: get("w_sharpe", d.w_sharpe),
            w_win_rate: get("w_win_rate", d.w_win_rate),
            w_drawdown: get("w_drawdown", d.w_drawdown),
            ic_full: get("ic_full", d.ic_full),
            icir_full: get("icir_full", d.icir_full),
            sharpe_full: get("sharpe_full", d.sharpe_full),
            win_rate_floor: get("win_rate_floor", d.win_rate_floor),
            win_rate_full: get("win_rate_full", d.win_rate_full),
            drawdown_zero: get("drawdown_zero", d.drawdown_zero),
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn weights(&self) -> [f64; 5] {
        [
            self.w_ic,
            self.w_icir,
            self.w_sharpe,
            self.w_win_rate,
            self.w_drawdown,
        ]
    }

    pub fn validate(&self) -> Result<(), FactorError> {
        let names = ["w_ic", "w_icir", "w_sharpe", "w_win_rate", "w_drawdown"];
        for (name, w) in names.iter().zip(self.weights()) {
            if !w.is_finite() || w < 0.0 {
                return Err(invalid("score", name, "weight must be non-negative"));
            }
        }
        if self.weights().iter().sum::<f64>() <= 0.0 {
            return Err(invalid("score", "w_ic", "at least one weight must be positive"));
        }
        for (name, v) in [
            ("ic_full", self.ic_full),
            ("icir_full", self.icir_full),
            ("sharpe_full", self.sharpe_full),
            ("drawdown_zero", self.drawdown_zero),
        ] {
            if !(v.is_finite() && v > 0.0) {
                return Err(invalid("score", name, "saturation point must be positive"));
            }
        }
        if !(self.win_rate_floor < self.win_rate_full) {
            return Err(invalid(
                "score",
                "win_rate_full",
                "win_rate_full must be greater than win_rate_floor",
            ));
        }
        Ok(())
    }
}

impl AnalysisSettings {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, FactorError> {
        let d = Self::default();

        let annualization_factor = match config.get_string("analysis", "annualization_factor") {
            Some(raw) => {
                let value: f64 = raw.trim().parse().map_err(|_| {
                    invalid("analysis", "annualization_factor", format!("not a number: {raw}"))
                })?;
                if !(value.is_finite() && value > 0.0) {
                    return Err(invalid(
                        "analysis",
                        "annualization_factor",
                        "annualization_factor must be positive",
                    ));
                }
                Some(value)
            }
            None => None,
        };

        Ok(Self {
            ic_window: read_count(config, "ic_window", d.ic_window, 2)?,
            icir_window: read_count(config, "icir_window", d.icir_window, 2)?,
            min_observations: read_count(config, "min_observations", d.min_observations, 0)?,
            histogram_bins: read_count(config, "histogram_bins", d.histogram_bins, 1)?,
            histogram_min_ic: read_count(config, "histogram_min_ic", d.histogram_min_ic, 0)?,
            monthly_min_obs: read_count(config, "monthly_min_obs", d.monthly_min_obs, 2)?,
            chart_points: read_count(config, "chart_points", d.chart_points, 0)?,
            strict_windows: config.get_bool("analysis", "strict_windows", d.strict_windows),
            annualization_factor,
            score: ScorePolicy::from_config(config)?,
        })
    }

    pub fn window_policy(&self) -> WindowPolicy {
        if self.strict_windows {
            WindowPolicy::Strict
        } else {
            WindowPolicy::Lenient
        }
    }

    /// Periods per year used for Sharpe, Sortino and annualized figures.
    pub fn annualization(&self, interval: Interval) -> f64 {
        self.annualization_factor
            .unwrap_or_else(|| interval.periods_per_year())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapConfig(HashMap<(String, String), String>);

    impl MapConfig {
        fn new(entries: &[(&str, &str, &str)]) -> Self {
            Self(
                entries
                    .iter()
                    .map(|(s, k, v)| ((s.to_string(), k.to_string()), v.to_string()))
                    .collect(),
            )
        }
    }

    impl ConfigPort for MapConfig {
        fn get_string(&self, section: &str, key: &str) -> Option<String> {
            self.0.get(&(section.to_string(), key.to_string())).cloned()
        }

        fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }

        fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }

        fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
            self.get_string(section, key)
                .map(|v| v == "true")
                .unwrap_or(default)
        }
    }

    #[test]
    fn defaults_when_empty() {
        let settings = AnalysisSettings::from_config(&MapConfig::new(&[])).unwrap();
        assert_eq!(settings, AnalysisSettings::default());
        assert_eq!(settings.window_policy(), WindowPolicy::Lenient);
    }

    #[test]
    fn overrides_are_read() {
        let config = MapConfig::new(&[
            ("analysis", "ic_window", "30"),
            ("analysis", "strict_windows", "true"),
            ("analysis", "annualization_factor", "365"),
            ("score", "w_ic", "50"),
        ]);
        let settings = AnalysisSettings::from_config(&config).unwrap();
        assert_eq!(settings.ic_window, 30);
        assert_eq!(settings.window_policy(), WindowPolicy::Strict);
        assert_eq!(settings.annualization(Interval::Hours(1)), 365.0);
        assert_eq!(settings.score.w_ic, 50.0);
    }

    #[test]
    fn annualization_defaults_to_interval() {
        let settings = AnalysisSettings::default();
        assert_eq!(settings.annualization(Interval::Days(1)), 252.0);
    }

    #[test]
    fn rejects_tiny_ic_window() {
        let config = MapConfig::new(&[("analysis", "ic_window", "1")]);
        let err = AnalysisSettings::from_config(&config).unwrap_err();
        assert!(matches!(err, FactorError::ConfigInvalid { ref key, .. } if key == "ic_window"));
    }

    #[test]
    fn rejects_negative_weight() {
        let config = MapConfig::new(&[("score", "w_sharpe", "-1")]);
        assert!(AnalysisSettings::from_config(&config).is_err());
    }

    #[test]
    fn rejects_all_zero_weights() {
        let config = MapConfig::new(&[
            ("score", "w_ic", "0"),
            ("score", "w_icir", "0"),
            ("score", "w_sharpe", "0"),
            ("score", "w_win_rate", "0"),
            ("score", "w_drawdown", "0"),
        ]);
        assert!(AnalysisSettings::from_config(&config).is_err());
    }

    #[test]
    fn rejects_inverted_win_rate_band() {
        let config = MapConfig::new(&[
            ("score", "win_rate_floor", "0.6"),
            ("score", "win_rate_full", "0.5"),
        ]);
        assert!(AnalysisSettings::from_config(&config).is_err());
    }

    #[test]
    fn rejects_bad_annualization() {
        let config = MapConfig::new(&[("analysis", "annualization_factor", "abc")]);
        assert!(AnalysisSettings::from_config(&config).is_err());
        let config = MapConfig::new(&[("analysis", "annualization_factor", "-5")]);
        assert!(AnalysisSettings::from_config(&config).is_err());
    }
}
