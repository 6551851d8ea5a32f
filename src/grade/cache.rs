#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Load/store of the hidden per-submission results file.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use super::results::SubmissionResult;
use crate::{
    constants::RESULTS_FILE_NAME,
    error::{GradeError, GradeResult},
};

/// Path of the results file inside `submission_dir`.
pub fn results_path(submission_dir: &Path) -> PathBuf {
    submission_dir.join(RESULTS_FILE_NAME)
}

/// Returns true if `submission_dir` has a cached result.
pub fn has_results(submission_dir: &Path) -> bool {
    results_path(submission_dir).is_file()
}

/// Writes `result` to the results file, replacing any previous one.
pub fn store(submission_dir: &Path, result: &SubmissionResult) -> GradeResult<PathBuf> {
    let path = results_path(submission_dir);
    let json = serde_json::to_string_pretty(result).map_err(|source| GradeError::Json {
        path: path.clone(),
        source,
    })?;
    fs::write(&path, json).map_err(|e| GradeError::io(&path, e))?;
    tracing::debug!("wrote {}", path.display());
    Ok(path)
}

/// Reads the cached result. A missing file is a [`GradeError::CacheMiss`].
pub fn load(submission_dir: &Path) -> GradeResult<SubmissionResult> {
    let path = results_path(submission_dir);
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(GradeError::CacheMiss(submission_dir.to_path_buf()));
        }
        Err(e) => return Err(GradeError::io(&path, e)),
    };
    serde_json::from_str(&raw).map_err(|source| GradeError::Json { path, source })
}
