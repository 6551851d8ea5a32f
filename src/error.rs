#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Error taxonomy for the grading pipeline.
//!
//! Only `NotARepository` and the I/O style variants are real failures for a
//! submission. `NoCommits` and `FeedbackExists` are expected outcomes that
//! batch commands log and skip.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while evaluating, caching, rendering or exporting a
/// submission.
#[derive(Debug, Error)]
pub enum GradeError {
    /// The submission directory is not a git repository.
    #[error("no git repository found in {0}")]
    NotARepository(String),
    /// The repository has no commits authored by a student.
    #[error("{0} has no student commits; treating as not submitted")]
    NoCommits(String),
    /// The test runner or the lint tool could not produce a report.
    #[error("{tool} failed: {message}")]
    ToolInvocation {
        /// Name of the tool that failed.
        tool:    &'static str,
        /// Description of the failure.
        message: String,
    },
    /// A cached result was requested but has not been written yet.
    #[error("no evaluation results found in {0}; run the evaluation first")]
    CacheMiss(PathBuf),
    /// The feedback document exists and overwriting was not requested.
    #[error("{0} already exists and overwriting was not requested")]
    FeedbackExists(PathBuf),
    /// The grades file exists and overwriting was not confirmed.
    #[error("{0} already exists and overwriting was not confirmed")]
    GradesExist(PathBuf),
    /// A git command exited unsuccessfully.
    #[error("`git {command}` failed in {dir}: {stderr}")]
    Git {
        /// The git subcommand and its arguments.
        command: String,
        /// Directory the command ran in.
        dir:     String,
        /// Captured stderr.
        stderr:  String,
    },
    /// Filesystem failure.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path being read or written.
        path:   PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The cached result file could not be (de)serialized.
    #[error("invalid result cache {path}: {source}")]
    Json {
        /// Path of the cache file.
        path:   PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
    /// The grades CSV could not be written.
    #[error("could not write grades: {0}")]
    Csv(#[from] csv::Error),
}

impl GradeError {
    /// Builds an I/O error for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GradeError::Io {
            path: path.into(),
            source,
        }
    }

    /// Builds a tool invocation failure.
    pub fn tool(tool: &'static str, message: impl Into<String>) -> Self {
        GradeError::ToolInvocation {
            tool,
            message: message.into(),
        }
    }

    /// Returns true for outcomes that batch commands skip rather than report
    /// as failures.
    pub fn is_skip(&self) -> bool {
        matches!(self, GradeError::NoCommits(_) | GradeError::FeedbackExists(_))
    }
}

/// Result alias used by the grading library.
pub type GradeResult<T> = std::result::Result<T, GradeError>;
