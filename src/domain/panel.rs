//! OHLCV price panel for a single symbol and bar interval.

use crate::domain::error::FactorError;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const WEEKS_PER_YEAR: f64 = 52.0;
const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Column of the panel an expression may reference by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::Open,
        Field::High,
        Field::Low,
        Field::Close,
        Field::Volume,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "open" => Some(Field::Open),
            "high" => Some(Field::High),
            "low" => Some(Field::Low),
            "close" => Some(Field::Close),
            "volume" => Some(Field::Volume),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Field::Open => "open",
            Field::High => "high",
            Field::Low => "low",
            Field::Close => "close",
            Field::Volume => "volume",
        }
    }

    fn read(self, bar: &Bar) -> f64 {
        match self {
            Field::Open => bar.open,
            Field::High => bar.high,
            Field::Low => bar.low,
            Field::Close => bar.close,
            Field::Volume => bar.volume,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bar length such as `1h`, `4h`, `1d` or `1w`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interval {
    Minutes(u32),
    Hours(u32),
    Days(u32),
    Weeks(u32),
}

impl Interval {
    /// Number of bars in a year: 252 daily bars, intraday bars scaled over a
    /// 24h session, 52 weekly bars.
    pub fn periods_per_year(self) -> f64 {
        match self {
            Interval::Minutes(n) => TRADING_DAYS_PER_YEAR * 1440.0 / n.max(1) as f64,
            Interval::Hours(n) => TRADING_DAYS_PER_YEAR * 24.0 / n.max(1) as f64,
            Interval::Days(n) => TRADING_DAYS_PER_YEAR / n.max(1) as f64,
            Interval::Weeks(n) => WEEKS_PER_YEAR / n.max(1) as f64,
        }
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| format!("interval '{s}' has no unit"))?;
        let (count, unit) = s.split_at(split);
        let count: u32 = count
            .parse()
            .map_err(|_| format!("interval '{s}' has no bar count"))?;
        if count == 0 {
            return Err(format!("interval '{s}' must have a positive bar count"));
        }
        match unit {
            "m" | "min" => Ok(Interval::Minutes(count)),
            "h" => Ok(Interval::Hours(count)),
            "d" => Ok(Interval::Days(count)),
            "w" => Ok(Interval::Weeks(count)),
            _ => Err(format!("interval '{s}' has unknown unit '{unit}'")),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interval::Minutes(n) => write!(f, "{n}m"),
            Interval::Hours(n) => write!(f, "{n}h"),
            Interval::Days(n) => write!(f, "{n}d"),
            Interval::Weeks(n) => write!(f, "{n}w"),
        }
    }
}

/// Time-ordered bars for one symbol/interval. Immutable once built.
#[derive(Debug, Clone)]
pub struct PricePanel {
    symbol: String,
    interval: Interval,
    bars: Vec<Bar>,
}

impl PricePanel {
    /// Builds a panel, rejecting out-of-order or duplicated timestamps.
    pub fn new(
        symbol: impl Into<String>,
        interval: Interval,
        bars: Vec<Bar>,
    ) -> Result<Self, FactorError> {
        let symbol = symbol.into();
        if let Some(pos) = bars
            .windows(2)
            .position(|w| w[1].timestamp <= w[0].timestamp)
        {
            return Err(FactorError::InvalidPanel {
                symbol,
                reason: format!(
                    "timestamps not strictly increasing at bar {} ({} after {})",
                    pos + 1,
                    bars[pos + 1].timestamp,
                    bars[pos].timestamp
                ),
            });
        }
        Ok(Self {
            symbol,
            interval,
            bars,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn column(&self, field: Field) -> Vec<f64> {
        self.bars.iter().map(|b| field.read(b)).collect()
    }

    pub fn timestamps(&self) -> Vec<NaiveDateTime> {
        self.bars.iter().map(|b| b.timestamp).collect()
    }
}

/// Reads `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS`, RFC 3339 (converted to
/// UTC) or a bare date at midnight.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    for format in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Some(ts);
        }
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.naive_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
