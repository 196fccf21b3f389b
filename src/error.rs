use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ConvertError {
    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("conversion ledger error: {0}")]
    Ledger(String),

    #[error("failed to write error report: {0}")]
    Report(String),

    #[error("failed to clean scratch workspace: {0}")]
    Workspace(String),

    #[error("archive extraction failed: {0}")]
    Extraction(String),

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("failed to open vector source: {0}")]
    VectorRead(String),

    #[error("vector source has no layer at index {index}: {path}")]
    EmptyDataset { path: String, index: usize },

    #[error("failed to write vector dataset: {0}")]
    VectorWrite(String),

    #[error("input name reduces to an empty output name: {0}")]
    InvalidOutputName(String),
}
