#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Evaluation of a single submission: repository checks, tests, style and
//! persistence of the result.

use std::path::Path;

use bon::Builder;

use super::{cache, results::SubmissionResult};
use crate::{
    classroom::Assignment,
    config,
    datetime::lateness,
    error::{GradeError, GradeResult},
    python::{LintRunner, PylintRunner, PytestRunner, TestRunner},
    repo::SubmissionRepo,
};

/// Evaluates submissions with a test runner and a linter. Each call spawns
/// fresh tool processes, so nothing carries over between submissions.
#[derive(Clone, Debug, Builder)]
pub struct Evaluator<T: TestRunner, L: LintRunner> {
    /// Produces test reports.
    tests:      T,
    /// Produces style reports.
    lint:       L,
    /// Author-name marker ending the commit scan.
    #[builder(into, default = config::bot_marker())]
    bot_marker: String,
}

impl Default for Evaluator<PytestRunner, PylintRunner> {
    fn default() -> Self {
        Evaluator::builder()
            .tests(PytestRunner)
            .lint(PylintRunner)
            .build()
    }
}

impl<T: TestRunner, L: LintRunner> Evaluator<T, L> {
    /// Evaluates the submission in `dir` and writes the result next to it.
    ///
    /// Fails with [`GradeError::NotARepository`] when `dir` is not a git
    /// repository and with [`GradeError::NoCommits`] when no student commit
    /// exists; nothing is written in either case. Tool failures do not fail
    /// the evaluation; they are recorded on the result instead.
    pub async fn evaluate(
        &self,
        dir: &Path,
        assignment: Option<&Assignment>,
        display_name: Option<&str>,
    ) -> GradeResult<SubmissionResult> {
        let dir_name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| dir.display().to_string());

        let repo = SubmissionRepo::open(dir)?;
        let commits = repo.student_commits(&self.bot_marker).await?;
        let Some(latest) = commits.first() else {
            return Err(GradeError::NoCommits(dir_name));
        };

        let deadline = assignment.and_then(|a| a.deadline);
        let mut result = SubmissionResult::builder()
            .name(display_name.unwrap_or(latest.author_name.as_str()))
            .dir_name(dir_name.as_str())
            .maybe_assignment_title(assignment.map(|a| a.title.clone()))
            .maybe_assignment_deadline(deadline)
            .num_commits(commits.len())
            .commit_message(latest.message.as_str())
            .committer_name(latest.author_name.as_str())
            .commit_date(latest.date)
            .maybe_past_due(deadline.and_then(|d| lateness(&latest.date, &d)))
            .build();

        tracing::info!("Running tests for {dir_name}");
        match self.tests.run(dir).await {
            Ok(report) => result.record_tests(report),
            Err(e) => {
                tracing::error!("{dir_name}: {e}");
                result.test_exception = Some(e.to_string());
            }
        }

        tracing::info!("Running lint for {dir_name}");
        match self.lint.run(dir).await {
            Ok(Some(report)) => result.record_style(report),
            Ok(None) => {}
            Err(e) => {
                tracing::error!("{dir_name}: {e}");
                result.style_exception = Some(e.to_string());
            }
        }

        cache::store(dir, &result)?;
        Ok(result)
    }
}
