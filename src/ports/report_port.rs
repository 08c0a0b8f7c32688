//! Report store port.

use crate::domain::error::FactorError;
use crate::domain::report::{Report, ReportSummary, SortKey};

/// Persistent store of saved reports. Implementations serialize writers
/// internally and may be shared across threads.
pub trait ReportPort: Send + Sync {
    /// Persists `report` and returns its id.
    fn save(&self, report: &Report) -> Result<String, FactorError>;

    fn list(&self, sort: SortKey) -> Result<Vec<ReportSummary>, FactorError>;

    /// Fails with `ReportNotFound` for an unknown id.
    fn get(&self, id: &str) -> Result<Report, FactorError>;

    /// Fails with `ReportNotFound` for an unknown id.
    fn delete(&self, id: &str) -> Result<(), FactorError>;

    /// Flushes pending state before shutdown.
    fn close(&self) -> Result<(), FactorError> {
        Ok(())
    }
}
