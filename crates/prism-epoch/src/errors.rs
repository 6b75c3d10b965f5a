//! Error types for prism-epoch.
//!
//! Row-level parse problems are absorbed where they happen (logged and
//! dropped); everything that reaches a caller as an `EpochError` is a
//! structural problem with the dataset or the arguments.

use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for ranking, extraction and cluster assignment.
#[derive(Error, Debug)]
pub enum EpochError {
    /// No report file matched under the sampling root.
    #[error("No report file found under {root}. Check you are in the sampling root folder")]
    NoInput { root: PathBuf },

    /// A report row whose criterion or step value cannot be used.
    #[error("Malformed row {line} in {path}: {reason}")]
    MalformedRow {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// A report header lacks a requested column.
    #[error("Column '{column}' not found in report {path}")]
    MissingColumn { path: PathBuf, column: String },

    /// No trajectory pairs with a ranked report.
    #[error("Trajectory {pattern} not found. Trajectory files must contain the label 'trajectory' in their file name to be detected")]
    TrajectoryNotFound { pattern: String },

    /// The trajectory exists but does not hold the requested frame.
    #[error("MODEL {ordinal} not found in trajectory {path}")]
    FrameNotFound { path: PathBuf, ordinal: usize },

    /// Nothing to assign snapshots to.
    #[error("Empty centroid set: at least one cluster centre is required")]
    EmptyCentroidSet,

    /// A feature vector does not match the centroid dimension.
    #[error("Dimension mismatch: expected {expected} components, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Caller supplied an unusable argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid glob pattern: {0}")]
    Glob(#[from] glob::PatternError),
}

impl EpochError {
    /// Creates an invalid-argument error.
    pub fn invalid(message: impl Into<String>) -> Self {
        EpochError::InvalidArgument(message.into())
    }

    /// Creates a malformed-row error.
    pub fn malformed(path: impl Into<PathBuf>, line: usize, reason: impl Into<String>) -> Self {
        EpochError::MalformedRow {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }

    /// True when the dataset lacks a trajectory or a frame inside it.
    ///
    /// Both stop the whole run: report/trajectory pairing is a precondition
    /// of the dataset, not something a single row can recover from.
    pub fn is_missing_trajectory(&self) -> bool {
        matches!(
            self,
            EpochError::TrajectoryNotFound { .. } | EpochError::FrameNotFound { .. }
        )
    }

    /// True for anomalies that are absorbed at the row level.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EpochError::MalformedRow { .. })
    }
}

/// Result type alias for prism-epoch operations.
pub type Result<T> = std::result::Result<T, EpochError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_trajectory_classification() {
        let missing = EpochError::TrajectoryNotFound {
            pattern: "*trajectory*_3.pdb".into(),
        };
        assert!(missing.is_missing_trajectory());

        let frame = EpochError::FrameNotFound {
            path: PathBuf::from("0/trajectory_3.pdb"),
            ordinal: 10,
        };
        assert!(frame.is_missing_trajectory());
        assert!(!EpochError::EmptyCentroidSet.is_missing_trajectory());
    }

    #[test]
    fn test_only_rows_are_recoverable() {
        let row = EpochError::malformed("0/report_1", 4, "criterion 'nan'");
        assert!(row.is_recoverable());
        assert!(!EpochError::invalid("n must be positive").is_recoverable());
        assert!(row.to_string().contains("0/report_1"));
    }
}
