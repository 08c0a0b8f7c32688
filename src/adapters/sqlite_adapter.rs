//! SQLite adapter serving price panels and saved reports.

use crate::domain::error::FactorError;
use crate::domain::panel::{Bar, Interval, PricePanel};
use crate::domain::report::{Report, ReportSummary, SortKey, rank_summaries};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;
use chrono::{DateTime, NaiveDateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{OptionalExtension, params};
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::debug;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
    write_lock: Mutex<()>,
}

fn query_error(e: rusqlite::Error) -> FactorError {
    FactorError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn conversion_error(
    index: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, FactorError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| FactorError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool =
            Pool::builder()
                .max_size(pool_size)
                .build(manager)
                .map_err(|e: r2d2::Error| FactorError::Database {
                    reason: e.to_string(),
                })?;

        debug!(path = %db_path, pool_size, "opened SQLite database");
        Ok(Self {
            pool,
            write_lock: Mutex::new(()),
        })
    }

    pub fn in_memory() -> Result<Self, FactorError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| FactorError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self {
            pool,
            write_lock: Mutex::new(()),
        })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, FactorError> {
        self.pool.get().map_err(|e: r2d2::Error| FactorError::Database {
            reason: e.to_string(),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>, FactorError> {
        self.write_lock.lock().map_err(|_| FactorError::Database {
            reason: "SQLite write lock poisoned".into(),
        })
    }

    pub fn initialize_schema(&self) -> Result<(), FactorError> {
        let conn = self.conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS ohlcv (
                symbol TEXT NOT NULL,
                interval TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume REAL NOT NULL,
                PRIMARY KEY (symbol, interval, timestamp)
            );
            CREATE TABLE IF NOT EXISTS reports (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                expression TEXT,
                timestamp TEXT NOT NULL,
                score REAL NOT NULL,
                ic_mean REAL NOT NULL,
                sharpe REAL NOT NULL,
                sortino REAL NOT NULL,
                win_rate REAL NOT NULL,
                is_valid_factor INTEGER NOT NULL,
                payload TEXT NOT NULL
            );",
        )
        .map_err(query_error)?;

        Ok(())
    }

    /// Inserts or replaces the bars of `panel`.
    pub fn insert_panel(&self, panel: &PricePanel) -> Result<(), FactorError> {
        let _guard = self.lock()?;
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;
        let interval = panel.interval().to_string();

        for bar in panel.bars() {
            tx.execute(
                "INSERT OR REPLACE INTO ohlcv (symbol, interval, timestamp, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    panel.symbol(),
                    interval,
                    bar.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume
                ],
            )
            .map_err(query_error)?;
        }

        tx.commit().map_err(query_error)?;
        debug!(symbol = panel.symbol(), interval = %interval, bars = panel.len(), "stored panel");
        Ok(())
    }
}

impl DataPort for SqliteAdapter {
    fn fetch_panel(
        &self,
        symbol: &str,
        interval: Interval,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<PricePanel, FactorError> {
        let conn = self.conn()?;
        let start_str = start.map(|s| s.format(TIMESTAMP_FORMAT).to_string());
        let end_str = end.map(|e| e.format(TIMESTAMP_FORMAT).to_string());

        let query = "SELECT timestamp, open, high, low, close, volume
                     FROM ohlcv
                     WHERE symbol = ?1 AND interval = ?2
                       AND (?3 IS NULL OR timestamp >= ?3)
                       AND (?4 IS NULL OR timestamp <= ?4)
                     ORDER BY timestamp ASC";

        let mut stmt = conn.prepare(query).map_err(query_error)?;
        let rows = stmt
            .query_map(
                params![symbol, interval.to_string(), start_str, end_str],
                |row| {
                    let ts: String = row.get(0)?;
                    let timestamp = NaiveDateTime::parse_from_str(&ts, TIMESTAMP_FORMAT)
                        .map_err(|e| conversion_error(0, e))?;
                    Ok(Bar {
                        timestamp,
                        open: row.get(1)?,
                        high: row.get(2)?,
                        low: row.get(3)?,
                        close: row.get(4)?,
                        volume: row.get(5)?,
                    })
                },
            )
            .map_err(query_error)?;

        let bars = rows
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_error)?;

        if bars.is_empty() {
            return Err(FactorError::NoData {
                symbol: symbol.to_string(),
                interval: interval.to_string(),
            });
        }
        PricePanel::new(symbol, interval, bars)
    }

    fn list_structure(&self) -> Result<BTreeMap<String, Vec<String>>, FactorError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT symbol, interval FROM ohlcv ORDER BY symbol, interval")
            .map_err(query_error)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .map_err(query_error)?;

        let mut structure: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for row in rows {
            let (symbol, interval) = row.map_err(query_error)?;
            structure.entry(symbol).or_default().push(interval);
        }
        Ok(structure)
    }
}

impl ReportPort for SqliteAdapter {
    fn save(&self, report: &Report) -> Result<String, FactorError> {
        let payload = serde_json::to_string(report)?;
        let metrics = report.data.metrics();

        let _guard = self.lock()?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO reports
                (id, name, description, expression, timestamp, score, ic_mean, sharpe, sortino, win_rate, is_valid_factor, payload)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                report.id,
                report.name,
                report.description,
                report.expression,
                report.timestamp.to_rfc3339(),
                metrics.score,
                metrics.ic_mean,
                metrics.sharpe,
                metrics.sortino,
                metrics.win_rate,
                metrics.is_valid_factor,
                payload
            ],
        )
        .map_err(query_error)?;

        debug!(id = %report.id, "report saved");
        Ok(report.id.clone())
    }

    fn list(&self, sort: SortKey) -> Result<Vec<ReportSummary>, FactorError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, name, description, expression, timestamp, score, ic_mean, sharpe, sortino, win_rate, is_valid_factor
                 FROM reports ORDER BY timestamp DESC",
            )
            .map_err(query_error)?;

        let rows = stmt
            .query_map([], |row| {
                let ts: String = row.get(4)?;
                let timestamp = DateTime::parse_from_rfc3339(&ts)
                    .map_err(|e| conversion_error(4, e))?
                    .with_timezone(&Utc);
                Ok(ReportSummary {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    expression: row.get(3)?,
                    timestamp,
                    score: row.get(5)?,
                    ic_mean: row.get(6)?,
                    sharpe: row.get(7)?,
                    sortino: row.get(8)?,
                    win_rate: row.get(9)?,
                    is_valid_factor: row.get(10)?,
                    rank: 0,
                })
            })
            .map_err(query_error)?;

        let summaries = rows
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_error)?;
        Ok(rank_summaries(summaries, sort))
    }

    fn get(&self, id: &str) -> Result<Report, FactorError> {
        let conn = self.conn()?;
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM reports WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .map_err(query_error)?;

        match payload {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Err(FactorError::ReportNotFound { id: id.to_string() }),
        }
    }

    fn delete(&self, id: &str) -> Result<(), FactorError> {
        let _guard = self.lock()?;
        let conn = self.conn()?;
        let removed = conn
            .execute("DELETE FROM reports WHERE id = ?1", params![id])
            .map_err(query_error)?;
        if removed == 0 {
            return Err(FactorError::ReportNotFound { id: id.to_string() });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn setup() -> SqliteAdapter {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        adapter
    }

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn sample_panel(symbol: &str, interval: Interval) -> PricePanel {
        let bars = (1..=5)
            .map(|d| {
                let close = 100.0 + d as f64;
                Bar {
                    timestamp: ts(d),
                    open: close - 1.0,
                    high: close + 1.0,
                    low: close - 2.0,
                    close,
                    volume: 1000.0 * d as f64,
                }
            })
            .collect();
        PricePanel::new(symbol, interval, bars).unwrap()
    }

    #[test]
    fn initialize_schema_is_idempotent() {
        let adapter = setup();
        adapter.initialize_schema().unwrap();
    }

    #[test]
    fn insert_and_fetch_panel() {
        let adapter = setup();
        adapter
            .insert_panel(&sample_panel("BTC", Interval::Days(1)))
            .unwrap();

        let panel = adapter
            .fetch_panel("BTC", Interval::Days(1), None, None)
            .unwrap();
        assert_eq!(panel.len(), 5);
        assert_eq!(panel.bars()[0].timestamp, ts(1));
        assert_eq!(panel.bars()[4].close, 105.0);
        assert_eq!(panel.bars()[2].volume, 3000.0);
    }

    #[test]
    fn fetch_respects_range() {
        let adapter = setup();
        adapter
            .insert_panel(&sample_panel("BTC", Interval::Days(1)))
            .unwrap();

        let panel = adapter
            .fetch_panel("BTC", Interval::Days(1), Some(ts(2)), Some(ts(4)))
            .unwrap();
        assert_eq!(panel.len(), 3);
        assert_eq!(panel.bars()[0].timestamp, ts(2));

        let open_start = adapter
            .fetch_panel("BTC", Interval::Days(1), None, Some(ts(2)))
            .unwrap();
        assert_eq!(open_start.len(), 2);
    }

    #[test]
    fn fetch_unknown_is_no_data() {
        let adapter = setup();
        adapter
            .insert_panel(&sample_panel("BTC", Interval::Days(1)))
            .unwrap();
        let err = adapter
            .fetch_panel("BTC", Interval::Hours(4), None, None)
            .unwrap_err();
        assert!(matches!(err, FactorError::NoData { .. }));
    }

    #[test]
    fn list_structure_groups_by_symbol() {
        let adapter = setup();
        adapter
            .insert_panel(&sample_panel("BTC", Interval::Days(1)))
            .unwrap();
        adapter
            .insert_panel(&sample_panel("BTC", Interval::Hours(4)))
            .unwrap();
        adapter
            .insert_panel(&sample_panel("ETH", Interval::Days(1)))
            .unwrap();

        let structure = adapter.list_structure().unwrap();
        assert_eq!(structure["BTC"], vec!["1d".to_string(), "4h".to_string()]);
        assert_eq!(structure["ETH"], vec!["1d".to_string()]);
    }

    #[test]
    fn missing_table_is_query_error() {
        let adapter = SqliteAdapter::in_memory().unwrap();
        let err = adapter
            .fetch_panel("BTC", Interval::Days(1), None, None)
            .unwrap_err();
        assert!(matches!(err, FactorError::DatabaseQuery { .. }));
    }

    #[test]
    fn unknown_report_is_not_found() {
        let adapter = setup();
        assert!(matches!(
            adapter.get("nope"),
            Err(FactorError::ReportNotFound { .. })
        ));
        assert!(matches!(
            adapter.delete("nope"),
            Err(FactorError::ReportNotFound { .. })
        ));
        assert!(adapter.list(SortKey::Score).unwrap().is_empty());
    }
}
