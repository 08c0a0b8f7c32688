//! Price data access port.

use crate::domain::error::FactorError;
use crate::domain::panel::{Interval, PricePanel};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;

pub trait DataPort {
    /// Bars for `symbol` at `interval`, optionally restricted to the inclusive
    /// `[start, end]` range. Fails with `NoData` when nothing matches.
    fn fetch_panel(
        &self,
        symbol: &str,
        interval: Interval,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<PricePanel, FactorError>;

    /// Available intervals keyed by symbol.
    fn list_structure(&self) -> Result<BTreeMap<String, Vec<String>>, FactorError>;
}

pub fn in_range(
    timestamp: NaiveDateTime,
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
) -> bool {
    start.is_none_or(|s| timestamp >= s) && end.is_none_or(|e| timestamp <= e)
}
