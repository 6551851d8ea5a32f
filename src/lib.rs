//! # au
//!
//! Assignment utilities for instructors: labels and evaluates student
//! submission repositories, scores them, writes feedback documents and
//! exports a grade book.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Classroom service records and per-assignment settings
pub mod classroom;
/// Runtime configuration read from the environment
pub mod config;
/// A module defining a bunch of constant values to be used throughout
pub mod constants;
/// Instant formatting and serde codecs
pub mod datetime;
/// Error taxonomy of the grading pipeline
pub mod error;
/// For all things related to grading
pub mod grade;
/// Late-submission report
pub mod late;
/// Child process plumbing
pub mod process;
/// External Python tools
pub mod python;
/// Submission repositories
pub mod repo;
/// Roster loading and directory labeling
pub mod roster;

pub use error::{GradeError, GradeResult};
