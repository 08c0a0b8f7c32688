//! Report store keeping one `<id>.json` file per report.

use crate::domain::error::FactorError;
use crate::domain::report::{Report, ReportSummary, SortKey, rank_summaries};
use crate::ports::report_port::ReportPort;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, warn};

pub struct JsonReportStore {
    dir: PathBuf,
    lock: RwLock<()>,
}

impl JsonReportStore {
    /// Opens the store, creating `dir` when missing.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, FactorError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            lock: RwLock::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, FactorError> {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(FactorError::ReportNotFound { id: id.to_string() });
        }
        Ok(self.dir.join(format!("{}.json", id)))
    }

    fn read(&self, path: &Path, id: &str) -> Result<Report, FactorError> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(FactorError::ReportNotFound { id: id.to_string() })
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn poisoned() -> FactorError {
    FactorError::Database {
        reason: "report store lock poisoned".into(),
    }
}

impl ReportPort for JsonReportStore {
    fn save(&self, report: &Report) -> Result<String, FactorError> {
        let path = self.path_for(&report.id)?;
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(report)?;

        let _guard = self.lock.write().map_err(|_| poisoned())?;
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &path)?;

        debug!(id = %report.id, path = %path.display(), "report saved");
        Ok(report.id.clone())
    }

    fn list(&self, sort: SortKey) -> Result<Vec<ReportSummary>, FactorError> {
        let _guard = self.lock.read().map_err(|_| poisoned())?;
        let mut summaries = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let content = fs::read_to_string(&path)?;
            match serde_json::from_str::<Report>(&content) {
                Ok(report) => summaries.push(ReportSummary::from(&report)),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable report"),
            }
        }

        Ok(rank_summaries(summaries, sort))
    }

    fn get(&self, id: &str) -> Result<Report, FactorError> {
        let path = self.path_for(id)?;
        let _guard = self.lock.read().map_err(|_| poisoned())?;
        self.read(&path, id)
    }

    fn delete(&self, id: &str) -> Result<(), FactorError> {
        let path = self.path_for(id)?;
        let _guard = self.lock.write().map_err(|_| poisoned())?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(id, "report deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(FactorError::ReportNotFound { id: id.to_string() })
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn open_creates_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        let store = JsonReportStore::open(&nested).unwrap();
        assert!(store.dir().is_dir());
    }

    #[test]
    fn unknown_id_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = JsonReportStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.get("0000-missing"),
            Err(FactorError::ReportNotFound { .. })
        ));
        assert!(matches!(
            store.delete("0000-missing"),
            Err(FactorError::ReportNotFound { .. })
        ));
    }

    #[test]
    fn path_traversal_ids_are_rejected() {
        let dir = TempDir::new().unwrap();
        let store = JsonReportStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.get("../etc/passwd"),
            Err(FactorError::ReportNotFound { .. })
        ));
    }

    #[test]
    fn list_skips_foreign_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        fs::write(dir.path().join("broken.json"), "{").unwrap();
        let store = JsonReportStore::open(dir.path()).unwrap();
        assert!(store.list(SortKey::Score).unwrap().is_empty());
    }
}
