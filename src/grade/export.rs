#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Collects graded submissions into a CSV grade book.
//!
//! The score comes from each rendered feedback document rather than from the
//! cached numbers, so hand edits made by a grader end up in the export.

use std::{fs, path::Path};

use super::{cache, feedback};
use crate::{
    constants::GRADES_CSV_HEADER,
    datetime::friendly_local_datetime,
    error::{GradeError, GradeResult},
};

/// One grade book row, in header order.
pub type GradeRow = [String; 6];

/// Builds the row for one submission directory, or `None` when it has not
/// been evaluated and rendered yet.
fn row_for(dir: &Path, feedback_filename: &str) -> GradeResult<Option<GradeRow>> {
    let dir_label = dir.display();
    if !cache::has_results(dir) {
        tracing::warn!("Skipping {dir_label}: no evaluation results");
        return Ok(None);
    }
    let feedback_path = dir.join(feedback_filename);
    if !feedback_path.is_file() {
        tracing::warn!("Skipping {dir_label}: no {feedback_filename}");
        return Ok(None);
    }

    let Some(score) = feedback::score_from_file(&feedback_path)? else {
        tracing::error!("Skipping {dir_label}: no final score found in {feedback_filename}");
        return Ok(None);
    };

    let result = cache::load(dir)?;
    let last_commit = if result.num_commits > 0 {
        friendly_local_datetime(&result.commit_date)
    } else {
        String::new()
    };

    Ok(Some([
        result.name,
        score,
        result.past_due.unwrap_or_default(),
        result.num_commits.to_string(),
        last_commit,
        result.dir_name,
    ]))
}

/// Collects rows for every immediate subdirectory of `root`, sorted by name.
/// Directories whose row cannot be built are logged and left out.
pub fn collect_rows(root: &Path, feedback_filename: &str) -> GradeResult<Vec<GradeRow>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(root).map_err(|e| GradeError::io(root, e))? {
        let entry = entry.map_err(|e| GradeError::io(root, e))?;
        if entry.path().is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();

    let mut rows = Vec::new();
    for dir in dirs {
        match row_for(&dir, feedback_filename) {
            Ok(Some(row)) => rows.push(row),
            Ok(None) => {}
            Err(e) => tracing::error!("Skipping {}: {e}", dir.display()),
        }
    }
    Ok(rows)
}

/// Writes the grade book for `root` to `root/grades_filename` and returns the
/// number of data rows. An existing grade book is only replaced when
/// `overwrite` is set.
pub fn export(
    root: &Path,
    feedback_filename: &str,
    grades_filename: &str,
    overwrite: bool,
) -> GradeResult<usize> {
    let grades_path = root.join(grades_filename);
    if grades_path.exists() && !overwrite {
        return Err(GradeError::GradesExist(grades_path));
    }

    let rows = collect_rows(root, feedback_filename)?;

    let mut writer = csv::Writer::from_path(&grades_path)?;
    writer.write_record(GRADES_CSV_HEADER)?;
    for row in &rows {
        writer.write_record(row)?;
    }
    writer.flush().map_err(|e| GradeError::io(&grades_path, e))?;

    tracing::info!("Wrote {} grades to {}", rows.len(), grades_path.display());
    Ok(rows.len())
}
