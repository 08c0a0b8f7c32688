//! CSV file data adapter.
//!
//! Panels live in `<dir>/<SYMBOL>_<interval>.csv` with the header
//! `timestamp,open,high,low,close,volume`.

use crate::domain::error::FactorError;
use crate::domain::panel::{Bar, Interval, PricePanel, parse_timestamp};
use crate::ports::data_port::{DataPort, in_range};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str, interval: Interval) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", symbol, interval))
    }
}

fn column(record: &csv::StringRecord, index: usize, name: &str) -> Result<f64, FactorError> {
    record
        .get(index)
        .ok_or_else(|| FactorError::Database {
            reason: format!("missing {} column", name),
        })?
        .trim()
        .parse()
        .map_err(|e| FactorError::Database {
            reason: format!("invalid {} value: {}", name, e),
        })
}

impl DataPort for CsvAdapter {
    fn fetch_panel(
        &self,
        symbol: &str,
        interval: Interval,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<PricePanel, FactorError> {
        let path = self.csv_path(symbol, interval);
        let no_data = || FactorError::NoData {
            symbol: symbol.to_string(),
            interval: interval.to_string(),
        };
        if !path.is_file() {
            return Err(no_data());
        }
        let content = fs::read_to_string(&path)?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| FactorError::Database {
                reason: format!("CSV parse error in {}: {}", path.display(), e),
            })?;

            let raw = record.get(0).ok_or_else(|| FactorError::Database {
                reason: "missing timestamp column".into(),
            })?;
            let timestamp = parse_timestamp(raw).ok_or_else(|| FactorError::Database {
                reason: format!("invalid timestamp '{}'", raw),
            })?;

            if !in_range(timestamp, start, end) {
                continue;
            }

            bars.push(Bar {
                timestamp,
                open: column(&record, 1, "open")?,
                high: column(&record, 2, "high")?,
                low: column(&record, 3, "low")?,
                close: column(&record, 4, "close")?,
                volume: column(&record, 5, "volume")?,
            });
        }

        if bars.is_empty() {
            return Err(no_data());
        }
        bars.sort_by_key(|b| b.timestamp);
        debug!(symbol, interval = %interval, bars = bars.len(), "loaded CSV panel");
        PricePanel::new(symbol, interval, bars)
    }

    fn list_structure(&self) -> Result<BTreeMap<String, Vec<String>>, FactorError> {
        let mut structure: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for entry in fs::read_dir(&self.base_path)? {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            let Some(stem) = name.strip_suffix(".csv") else {
                continue;
            };
            let Some((symbol, interval)) = stem.rsplit_once('_') else {
                continue;
            };
            if symbol.is_empty() || interval.parse::<Interval>().is_err() {
                continue;
            }
            structure
                .entry(symbol.to_string())
                .or_default()
                .push(interval.to_string());
        }

        for intervals in structure.values_mut() {
            intervals.sort();
        }
        Ok(structure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let csv_content = "timestamp,open,high,low,close,volume\n\
            2024-01-15 00:00:00,100.0,110.0,90.0,105.0,50000\n\
            2024-01-16 00:00:00,105.0,115.0,100.0,110.0,60000.5\n\
            2024-01-17 00:00:00,110.0,120.0,105.0,115.0,55000\n";

        fs::write(path.join("BTC_1d.csv"), csv_content).unwrap();
        fs::write(
            path.join("BTC_4h.csv"),
            "timestamp,open,high,low,close,volume\n",
        )
        .unwrap();
        fs::write(
            path.join("ETH_1h.csv"),
            "timestamp,open,high,low,close,volume\n",
        )
        .unwrap();
        fs::write(path.join("notes.txt"), "ignored").unwrap();

        (dir, path)
    }

    #[test]
    fn fetch_panel_returns_correct_data() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let panel = adapter
            .fetch_panel("BTC", Interval::Days(1), None, None)
            .unwrap();

        assert_eq!(panel.len(), 3);
        let bar = &panel.bars()[0];
        assert_eq!(
            bar.timestamp,
            NaiveDate::from_ymd_opt(2024, 1, 15)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
        assert_eq!(bar.open, 100.0);
        assert_eq!(bar.high, 110.0);
        assert_eq!(bar.low, 90.0);
        assert_eq!(bar.close, 105.0);
        assert_eq!(panel.bars()[1].volume, 60000.5);
    }

    #[test]
    fn fetch_panel_filters_inclusive_range() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        let day = |d| {
            NaiveDate::from_ymd_opt(2024, 1, d)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        };

        let panel = adapter
            .fetch_panel("BTC", Interval::Days(1), Some(day(16)), Some(day(17)))
            .unwrap();
        assert_eq!(panel.len(), 2);
        assert_eq!(panel.bars()[0].close, 110.0);
    }

    #[test]
    fn missing_file_is_no_data() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        let err = adapter
            .fetch_panel("DOGE", Interval::Days(1), None, None)
            .unwrap_err();
        assert!(matches!(err, FactorError::NoData { .. }));
    }

    #[test]
    fn empty_file_is_no_data() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        let err = adapter
            .fetch_panel("ETH", Interval::Hours(1), None, None)
            .unwrap_err();
        assert!(matches!(err, FactorError::NoData { .. }));
    }

    #[test]
    fn bad_number_is_database_error() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("X_1d.csv"),
            "timestamp,open,high,low,close,volume\n2024-01-01,1,1,1,abc,1\n",
        )
        .unwrap();
        let adapter = CsvAdapter::new(dir.path().to_path_buf());
        let err = adapter
            .fetch_panel("X", Interval::Days(1), None, None)
            .unwrap_err();
        assert!(err.to_string().contains("invalid close value"));
    }

    #[test]
    fn list_structure_groups_intervals_by_symbol() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        let structure = adapter.list_structure().unwrap();

        assert_eq!(structure.len(), 2);
        assert_eq!(structure["BTC"], vec!["1d".to_string(), "4h".to_string()]);
        assert_eq!(structure["ETH"], vec!["1h".to_string()]);
    }
}
