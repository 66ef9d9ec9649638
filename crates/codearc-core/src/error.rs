//! Fatal errors and recoverable warnings produced during analysis.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that abort an operation.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("path not found or not a directory: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("an analysis run is already in progress")]
    AlreadyProcessing,

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("analysis cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AnalysisError {
    /// Whether this error moves the run into the `Error` state.
    pub fn is_fatal_for_run(&self) -> bool {
        !matches!(self, Self::AlreadyProcessing | Self::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Problems that are recorded and skipped; they never fail a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// A single source file could not be parsed or read.
    ParseFailure { file: String, reason: String },
    /// A directory entry the scanner could not visit.
    SkippedEntry { path: String, reason: String },
    /// A call reference matched no function, or several across the program.
    UnresolvedReference {
        caller: String,
        callee: String,
        candidates: usize,
    },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ParseFailure { file, reason } => write!(f, "parse failure in {file}: {reason}"),
            Self::SkippedEntry { path, reason } => write!(f, "skipped {path}: {reason}"),
            Self::UnresolvedReference {
                caller,
                callee,
                candidates: 0,
            } => write!(f, "unresolved call to `{callee}` from {caller}"),
            Self::UnresolvedReference {
                caller,
                callee,
                candidates,
            } => write!(
                f,
                "ambiguous call to `{callee}` from {caller} ({candidates} candidates)"
            ),
        }
    }
}
