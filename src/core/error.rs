//! Error types for SVM implementation

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SVMError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Invalid kernel: {0}")]
    InvalidKernel(String),

    #[error("Invalid problem: {0}")]
    InvalidProblem(String),

    #[error("Degenerate model: {0}")]
    DegenerateModel(String),

    #[error("Corrupt model at line {line}: {reason}")]
    CorruptModel { line: usize, reason: String },

    #[error("Model does not contain probability information")]
    NoProbabilityModel,

    #[error("IO error on {}: {source}", path.display())]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl SVMError {
    /// Shorthand for a [`SVMError::CorruptModel`] at `line` (1-based, 0 when
    /// the problem is not tied to a single line)
    pub(crate) fn corrupt(line: usize, reason: impl Into<String>) -> Self {
        SVMError::CorruptModel {
            line,
            reason: reason.into(),
        }
    }

    pub(crate) fn file_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SVMError::FileIo {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, SVMError>;
