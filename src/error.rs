//! Error taxonomy for the sharding pipeline.
//!
//! Catalog and configuration errors abort a run. Input parse errors are
//! scoped to a single day file and only cause that day to be skipped.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The node catalog is missing, unreadable or malformed.
    #[error("node catalog error: {0}")]
    Catalog(String),

    /// A GPS day file could not be read or parsed.
    #[error("failed to parse {file}: {reason}")]
    InputParse { file: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl PipelineError {
    pub(crate) fn input(file: impl Into<PathBuf>, reason: impl ToString) -> Self {
        PipelineError::InputParse {
            file: file.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns `true` if the whole run must stop on this error.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, PipelineError::InputParse { .. })
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_parse_is_not_fatal() {
        let err = PipelineError::input("2025-04-01.csv", "missing column `lat`");
        assert!(!err.is_fatal());
        assert_eq!(
            err.to_string(),
            "failed to parse 2025-04-01.csv: missing column `lat`"
        );
    }

    #[test]
    fn test_catalog_is_fatal() {
        let err = PipelineError::Catalog("no nodes".into());
        assert!(err.is_fatal());
    }
}
