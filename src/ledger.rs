use std::collections::HashSet;
use std::fs;
use std::io;

use camino::Utf8Path;
use tracing::{debug, info};

use crate::error::ConvertError;
use crate::fs_util::write_lines_atomic;

pub const LEDGER_FILE_NAME: &str = "PreviouslyConvertedFiles.txt";

/// Inputs converted in this or an earlier run, in first-recorded order.
#[derive(Debug, Clone, Default)]
pub struct ConversionLedger {
    entries: Vec<String>,
    index: HashSet<String>,
}

impl ConversionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A missing sidecar file is an empty history; any other read failure is
    /// returned so the skip logic never runs on a partial ledger.
    pub fn load(path: &Utf8Path) -> Result<Self, ConvertError> {
        let content = match fs::read_to_string(path.as_std_path()) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(ledger = %path, "no ledger yet, starting empty");
                return Ok(Self::new());
            }
            Err(err) => {
                return Err(ConvertError::Ledger(format!("read {path}: {err}")));
            }
        };

        let mut ledger = Self::new();
        for line in content.lines() {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if !line.is_empty() {
                ledger.record(line);
            }
        }
        info!(ledger = %path, entries = ledger.len(), "loaded conversion ledger");
        Ok(ledger)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.index.contains(identifier)
    }

    /// Returns `false` when the identifier was already present.
    pub fn record(&mut self, identifier: &str) -> bool {
        if self.index.contains(identifier) {
            return false;
        }
        self.index.insert(identifier.to_string());
        self.entries.push(identifier.to_string());
        true
    }

    pub fn persist(&self, path: &Utf8Path) -> Result<(), ConvertError> {
        write_lines_atomic(path, &self.entries)
            .map_err(|err| ConvertError::Ledger(format!("write {path}: {err}")))?;
        debug!(ledger = %path, entries = self.len(), "persisted conversion ledger");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_is_idempotent() {
        let mut ledger = ConversionLedger::new();
        assert!(ledger.record("/in/a.kmz"));
        assert!(!ledger.record("/in/a.kmz"));
        assert!(ledger.record("/in/A.kmz"));
        assert_eq!(ledger.len(), 2);
        assert!(!ledger.contains("/in/a.kmz/"));
    }
}
