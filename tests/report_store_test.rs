//! Report persistence through both `ReportPort` implementations.

mod common;

use common::*;
use factorlab::adapters::json_report_store::JsonReportStore;
use factorlab::domain::combine::WeightedFactor;
use factorlab::domain::error::FactorError;
use factorlab::domain::lab::{CombinationRequest, EvaluationRequest, FactorLab};
use factorlab::domain::panel::Interval;
use factorlab::domain::report::{Report, ReportData, SortKey};
use factorlab::domain::settings::AnalysisSettings;
use factorlab::ports::report_port::ReportPort;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

fn evaluated(expression: &str) -> Report {
    let port = MockDataPort::new().with_panel(generate_panel("BTC", 200));
    let settings = AnalysisSettings::default();
    let result = FactorLab::new(&port, &settings)
        .evaluate(&EvaluationRequest {
            expression: expression.to_string(),
            symbol: "BTC".into(),
            interval: Interval::Days(1),
            periods: 1,
            quantile: 5,
            start: None,
            end: None,
        })
        .unwrap();
    Report::new(
        expression,
        "integration",
        Some(expression.to_string()),
        ReportData::Single(result),
    )
}

fn combined() -> Report {
    let port = MockDataPort::new().with_panel(generate_panel("BTC", 200));
    let settings = AnalysisSettings::default();
    let result = FactorLab::new(&port, &settings)
        .combine(&CombinationRequest {
            symbol: "BTC".into(),
            interval: Interval::Days(1),
            periods: 1,
            quantile: 5,
            factors: vec![
                WeightedFactor {
                    expression: "ts_rank(close, 10)".into(),
                    weight: 0.6,
                },
                WeightedFactor {
                    expression: "ts_zscore(volume, 20)".into(),
                    weight: -0.4,
                },
            ],
            start: None,
            end: None,
        })
        .unwrap();
    Report::new("combo", "", None, ReportData::Combination(result))
}

/// Shared contract every store must satisfy.
fn exercise_store(store: &dyn ReportPort) {
    let a = evaluated("close");
    let b = evaluated("-ts_returns(close, 3)");
    let c = combined();

    assert_eq!(store.save(&a).unwrap(), a.id);
    store.save(&b).unwrap();
    store.save(&c).unwrap();

    let loaded = store.get(&a.id).unwrap();
    assert_eq!(loaded, a);
    match store.get(&c.id).unwrap().data {
        ReportData::Combination(r) => assert_eq!(r.factor_details.len(), 2),
        ReportData::Single(_) => panic!("combination stored as single"),
    }

    let by_score = store.list(SortKey::Score).unwrap();
    assert_eq!(by_score.len(), 3);
    assert_eq!(
        by_score.iter().map(|s| s.rank).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    for pair in by_score.windows(2) {
        assert!(pair[0].score.abs() >= pair[1].score.abs());
    }

    let by_ic = store.list(SortKey::IcMean).unwrap();
    for pair in by_ic.windows(2) {
        assert!(pair[0].ic_mean.abs() >= pair[1].ic_mean.abs());
    }

    let by_sortino = store.list(SortKey::Sortino).unwrap();
    for pair in by_sortino.windows(2) {
        assert!(pair[0].sortino.abs() >= pair[1].sortino.abs());
    }
    let stored = by_sortino.iter().find(|s| s.id == a.id).unwrap();
    assert_eq!(stored.sortino, a.data.metrics().sortino);

    let by_time = store.list(SortKey::Timestamp).unwrap();
    for pair in by_time.windows(2) {
        assert!(pair[0].timestamp >= pair[1].timestamp);
    }

    store.delete(&b.id).unwrap();
    assert!(matches!(
        store.get(&b.id),
        Err(FactorError::ReportNotFound { .. })
    ));
    assert_eq!(store.list(SortKey::Score).unwrap().len(), 2);
    store.close().unwrap();
}

mod json_store {
    use super::*;

    #[test]
    fn satisfies_store_contract() {
        let dir = TempDir::new().unwrap();
        let store = JsonReportStore::open(dir.path()).unwrap();
        exercise_store(&store);
    }

    #[test]
    fn reports_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let report = evaluated("ts_mean(close, 5)");
        {
            let store = JsonReportStore::open(dir.path()).unwrap();
            store.save(&report).unwrap();
        }
        let reopened = JsonReportStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get(&report.id).unwrap(), report);
        assert!(!dir.path().join(format!("{}.json.tmp", report.id)).exists());
    }

    #[test]
    fn concurrent_writers_do_not_lose_reports() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(JsonReportStore::open(dir.path()).unwrap());
        let template = evaluated("close");

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                let mut report = template.clone();
                report.id = format!("{}-{}", template.id, i);
                thread::spawn(move || store.save(&report).unwrap())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(store.list(SortKey::Score).unwrap().len(), 8);
    }
}

#[cfg(feature = "sqlite")]
mod sqlite_store {
    use super::*;
    use factorlab::adapters::sqlite_adapter::SqliteAdapter;

    #[test]
    fn satisfies_store_contract() {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        exercise_store(&adapter);
    }

    #[test]
    fn file_database_persists_between_adapters() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lab.db");
        let config = factorlab::adapters::file_config_adapter::FileConfigAdapter::from_string(
            &format!("[sqlite]\npath = {}\npool_size = 2\n", path.display()),
        )
        .unwrap();
        let report = evaluated("close");

        {
            let adapter = SqliteAdapter::from_config(&config).unwrap();
            adapter.initialize_schema().unwrap();
            adapter.save(&report).unwrap();
        }
        let adapter = SqliteAdapter::from_config(&config).unwrap();
        assert_eq!(adapter.get(&report.id).unwrap(), report);
    }
}
