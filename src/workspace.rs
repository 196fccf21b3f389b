use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, warn};

use crate::error::ConvertError;

/// The scratch directory one archive is staged into at a time.
#[derive(Debug, Clone)]
pub struct Workspace {
    path: Utf8PathBuf,
}

impl Workspace {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Deletes the directory and everything in it. It is not recreated;
    /// extraction creates it again when it writes the first file.
    pub fn ensure_clean(&self) -> Result<(), ConvertError> {
        if self.path.as_std_path().exists() {
            fs::remove_dir_all(self.path.as_std_path())
                .map_err(|err| ConvertError::Workspace(format!("remove {}: {err}", self.path)))?;
            debug!(workspace = %self.path, "purged scratch workspace");
        }
        Ok(())
    }

    /// Hands out the workspace for one input. It is emptied before use and
    /// purged again when the lease drops, whichever way the attempt ended.
    pub fn lease(&self) -> Result<WorkspaceLease<'_>, ConvertError> {
        self.ensure_clean()?;
        Ok(WorkspaceLease { workspace: self })
    }

    /// Run-exit purge. Unlike the per-input purge, a failure here is returned.
    pub fn release(&self) -> Result<(), ConvertError> {
        self.ensure_clean()
    }
}

pub struct WorkspaceLease<'a> {
    workspace: &'a Workspace,
}

impl WorkspaceLease<'_> {
    pub fn path(&self) -> &Utf8Path {
        self.workspace.path()
    }
}

impl Drop for WorkspaceLease<'_> {
    fn drop(&mut self) {
        // The next lease retries the purge.
        if let Err(err) = self.workspace.ensure_clean() {
            warn!(workspace = %self.workspace.path(), error = %err, "scratch cleanup failed");
        }
    }
}
