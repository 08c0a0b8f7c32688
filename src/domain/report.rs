//! Saved reports and their ranked summaries.

use crate::domain::result::{BacktestResult, CombinationResult, Metrics};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use uuid::Uuid;

/// Stored payload: a single-factor or a combination run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReportData {
    Combination(CombinationResult),
    Single(BacktestResult),
}

impl ReportData {
    pub fn metrics(&self) -> &Metrics {
        match self {
            ReportData::Combination(c) => &c.result.metrics,
            ReportData::Single(r) => &r.metrics,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub name: String,
    pub description: String,
    pub expression: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub data: ReportData,
}

impl Report {
    /// New report with a fresh v4 id, stamped now.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        expression: Option<String>,
        data: ReportData,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: description.into(),
            expression,
            timestamp: Utc::now(),
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub expression: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub score: f64,
    pub ic_mean: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub win_rate: f64,
    pub is_valid_factor: bool,
    /// 1-based position in the requested ordering.
    pub rank: usize,
}

/// The head of a ranked listing together with the size of the whole listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rankings {
    pub total: usize,
    pub reports: Vec<ReportSummary>,
}

impl Rankings {
    /// Keeps the first `limit` summaries; `None` keeps all of them.
    pub fn top(mut summaries: Vec<ReportSummary>, limit: Option<usize>) -> Self {
        let total = summaries.len();
        if let Some(limit) = limit {
            summaries.truncate(limit);
        }
        Self {
            total,
            reports: summaries,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Score,
    IcMean,
    Sharpe,
    Sortino,
    WinRate,
    Timestamp,
}

impl SortKey {
    /// Unknown keys fall back to `score`.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "ic_mean" => SortKey::IcMean,
            "sharpe" => SortKey::Sharpe,
            "sortino" => SortKey::Sortino,
            "win_rate" => SortKey::WinRate,
            "timestamp" => SortKey::Timestamp,
            _ => SortKey::Score,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SortKey::Score => "score",
            SortKey::IcMean => "ic_mean",
            SortKey::Sharpe => "sharpe",
            SortKey::Sortino => "sortino",
            SortKey::WinRate => "win_rate",
            SortKey::Timestamp => "timestamp",
        }
    }

    fn metric(self, summary: &ReportSummary) -> f64 {
        match self {
            SortKey::Score => summary.score,
            SortKey::IcMean => summary.ic_mean,
            SortKey::Sharpe => summary.sharpe,
            SortKey::Sortino => summary.sortino,
            SortKey::WinRate => summary.win_rate,
            SortKey::Timestamp => 0.0,
        }
    }

    fn compare(self, a: &ReportSummary, b: &ReportSummary) -> Ordering {
        match self {
            SortKey::Timestamp => b.timestamp.cmp(&a.timestamp),
            _ => self.metric(b).abs().total_cmp(&self.metric(a).abs()),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<&Report> for ReportSummary {
    fn from(report: &Report) -> Self {
        let m = report.data.metrics();
        Self {
            id: report.id.clone(),
            name: report.name.clone(),
            description: report.description.clone(),
            expression: report.expression.clone(),
            timestamp: report.timestamp,
            score: m.score,
            ic_mean: m.ic_mean,
            sharpe: m.sharpe,
            sortino: m.sortino,
            win_rate: m.win_rate,
            is_valid_factor: m.is_valid_factor,
            rank: 0,
        }
    }
}

/// Orders summaries by `sort` (metrics by absolute value descending, timestamp
/// newest first; ties keep input order) and assigns 1-based ranks.
pub fn rank_summaries(mut summaries: Vec<ReportSummary>, sort: SortKey) -> Vec<ReportSummary> {
    summaries.sort_by(|a, b| sort.compare(a, b));
    for (i, s) in summaries.iter_mut().enumerate() {
        s.rank = i + 1;
    }
    summaries
}
