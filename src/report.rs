use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Local};
use tracing::info;

use crate::error::ConvertError;
use crate::fs_util::write_lines_atomic;

pub const REPORT_PREFIX: &str = "ConversionErrors";

/// Inputs that failed during the current run, one entry per failed attempt.
#[derive(Debug, Clone, Default)]
pub struct ErrorCollector {
    failed: Vec<String>,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, identifier: &str) {
        self.failed.push(identifier.to_string());
    }

    pub fn failed(&self) -> &[String] {
        &self.failed
    }

    pub fn is_empty(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn persist(&self, dir: &Utf8Path) -> Result<Option<Utf8PathBuf>, ConvertError> {
        self.persist_at(dir, Local::now())
    }

    pub fn persist_at(
        &self,
        dir: &Utf8Path,
        timestamp: DateTime<Local>,
    ) -> Result<Option<Utf8PathBuf>, ConvertError> {
        if self.failed.is_empty() {
            return Ok(None);
        }
        let path = dir.join(report_file_name(timestamp));
        write_lines_atomic(&path, &self.failed)
            .map_err(|err| ConvertError::Report(format!("write {path}: {err}")))?;
        info!(report = %path, failures = self.failed.len(), "wrote error report");
        Ok(Some(path))
    }
}

pub fn report_file_name(timestamp: DateTime<Local>) -> String {
    format!("{REPORT_PREFIX}-{}.txt", timestamp.format("%Y%m%d-%H%M%S"))
}
