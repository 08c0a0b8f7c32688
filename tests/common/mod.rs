#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use factorlab::domain::error::FactorError;
use factorlab::domain::panel::{Bar, Interval, PricePanel};
use factorlab::ports::data_port::{DataPort, in_range};
use std::cell::Cell;
use std::collections::{BTreeMap, HashMap};

/// In-memory data port that counts fetches.
pub struct MockDataPort {
    pub panels: HashMap<String, PricePanel>,
    pub errors: HashMap<String, String>,
    pub fetches: Cell<usize>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            panels: HashMap::new(),
            errors: HashMap::new(),
            fetches: Cell::new(0),
        }
    }

    pub fn with_panel(mut self, panel: PricePanel) -> Self {
        self.panels.insert(panel.symbol().to_string(), panel);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.get()
    }
}

impl DataPort for MockDataPort {
    fn fetch_panel(
        &self,
        symbol: &str,
        interval: Interval,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<PricePanel, FactorError> {
        self.fetches.set(self.fetches.get() + 1);
        if let Some(reason) = self.errors.get(symbol) {
            return Err(FactorError::Database {
                reason: reason.clone(),
            });
        }
        let no_data = || FactorError::NoData {
            symbol: symbol.to_string(),
            interval: interval.to_string(),
        };
        let panel = self.panels.get(symbol).ok_or_else(no_data)?;
        if panel.interval() != interval {
            return Err(no_data());
        }
        let bars: Vec<Bar> = panel
            .bars()
            .iter()
            .filter(|b| in_range(b.timestamp, start, end))
            .cloned()
            .collect();
        if bars.is_empty() {
            return Err(no_data());
        }
        PricePanel::new(symbol, interval, bars)
    }

    fn list_structure(&self) -> Result<BTreeMap<String, Vec<String>>, FactorError> {
        Ok(self
            .panels
            .values()
            .map(|p| (p.symbol().to_string(), vec![p.interval().to_string()]))
            .collect())
    }
}

pub fn day(n: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + chrono::Duration::days(n)
}

/// Daily panel whose bars all trade at the given closes.
pub fn panel_from_closes(symbol: &str, closes: &[f64]) -> PricePanel {
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar {
            timestamp: day(i as i64),
            open: close,
            high: close * 1.01,
            low: close * 0.99,
            close,
            volume: 1000.0 + (i % 7) as f64 * 150.0,
        })
        .collect();
    PricePanel::new(symbol, Interval::Days(1), bars).unwrap()
}

/// Deterministic wavy price path of `count` daily bars.
pub fn generate_panel(symbol: &str, count: usize) -> PricePanel {
    let closes: Vec<f64> = (0..count)
        .map(|i| {
            let t = i as f64;
            100.0 + 0.05 * t + 4.0 * (t * 0.21).sin() + 1.5 * (t * 0.77).cos()
        })
        .collect();
    panel_from_closes(symbol, &closes)
}
