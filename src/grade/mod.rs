#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! The grading pipeline: evaluate, cache, score, render, export.

/// Load/store of the per-submission results file
pub mod cache;
/// Per-submission evaluation
pub mod eval;
/// CSV grade book
pub mod export;
/// Markdown feedback documents
pub mod feedback;
/// The persisted result record and tool reports
pub mod results;
/// Weighted scoring
pub mod scoring;

pub use eval::Evaluator;
pub use results::{Status, StyleReport, SubmissionResult, TestReport};
pub use scoring::{Score, ScoringParams, score};
