use std::{fs, path::Path, process::Command};

use au::{
    GradeError, GradeResult,
    classroom::Assignment,
    grade::{Evaluator, Status, StyleReport, TestReport, cache, results::TestCase},
    python::{LintRunner, TestRunner},
};
use chrono::{TimeZone, Utc};

/// Test runner returning a canned report.
struct CannedTests(TestReport);

impl TestRunner for CannedTests {
    async fn run(&self, _dir: &Path) -> GradeResult<TestReport> {
        Ok(self.0.clone())
    }
}

/// Lint runner that always fails to start.
struct BrokenLint;

impl LintRunner for BrokenLint {
    async fn run(&self, _dir: &Path) -> GradeResult<Option<StyleReport>> {
        Err(GradeError::tool("pylint", "pylint is not installed"))
    }
}

fn git_available() -> bool {
    which::which("git").is_ok()
}

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(["-c", "commit.gpgsign=false", "-c", "init.defaultBranch=main"])
        .args(args)
        .current_dir(dir)
        .status()
        .unwrap();
    assert!(status.success(), "git {args:?} failed");
}

fn commit_as(dir: &Path, author: &str, timestamp: &str, file: &str) {
    fs::write(dir.join(file), format!("# {author} {timestamp}\n")).unwrap();
    git(dir, &["add", "."]);
    let status = Command::new("git")
        .args(["-c", "commit.gpgsign=false", "commit", "-q", "-m"])
        .arg(format!("work by {author}"))
        .env("GIT_AUTHOR_NAME", author)
        .env("GIT_AUTHOR_EMAIL", "someone@example.com")
        .env("GIT_COMMITTER_NAME", author)
        .env("GIT_COMMITTER_EMAIL", "someone@example.com")
        .env("GIT_AUTHOR_DATE", timestamp)
        .env("GIT_COMMITTER_DATE", timestamp)
        .current_dir(dir)
        .status()
        .unwrap();
    assert!(status.success());
}

fn repo(root: &Path, name: &str) -> std::path::PathBuf {
    let dir = root.join(name);
    fs::create_dir(&dir).unwrap();
    git(&dir, &["init", "-q"]);
    dir
}

fn half_passing() -> TestReport {
    TestReport {
        status:  Status::Fail,
        message: None,
        tests:   vec![
            TestCase::builder().nodeid("test_hw.py::test_one").build(),
            TestCase::builder()
                .nodeid("test_hw.py::test_two")
                .status(Status::Fail)
                .build(),
        ],
    }
}

fn evaluator() -> Evaluator<CannedTests, BrokenLint> {
    Evaluator::builder()
        .tests(CannedTests(half_passing()))
        .lint(BrokenLint)
        .bot_marker("[bot]")
        .build()
}

#[tokio::test]
async fn student_work_after_the_bot_commit_is_evaluated() {
    if !git_available() {
        return;
    }
    let root = tempfile::tempdir().unwrap();
    let dir = repo(root.path(), "hw1-ada");
    commit_as(&dir, "github-classroom[bot]", "2024-01-01T12:00:00Z", "README.md");
    commit_as(&dir, "ada", "2024-01-05T10:00:00Z", "hw.py");
    commit_as(&dir, "ada", "2024-01-06T14:30:00Z", "hw.py");

    let assignment = Assignment::builder()
        .id(7)
        .title("Homework 1")
        .deadline(Utc.with_ymd_and_hms(2024, 1, 5, 23, 59, 0).unwrap())
        .build();

    let result = evaluator()
        .evaluate(&dir, Some(&assignment), Some("Ada Lovelace"))
        .await
        .unwrap();

    assert_eq!(result.name, "Ada Lovelace");
    assert_eq!(result.dir_name, "hw1-ada");
    assert_eq!(result.num_commits, 2);
    assert_eq!(result.committer_name, "ada");
    assert_eq!(result.commit_message, "work by ada");
    assert_eq!(
        result.commit_date,
        Utc.with_ymd_and_hms(2024, 1, 6, 14, 30, 0).unwrap()
    );
    assert_eq!(result.past_due.as_deref(), Some("14:31"));
    assert_eq!(result.assignment_title.as_deref(), Some("Homework 1"));
    assert_eq!(result.test_pass_fraction, Some(0.5));
    assert!(result.test_detail.is_some());
    assert!(result.style_score_fraction.is_none());
    assert!(
        result
            .style_exception
            .as_deref()
            .is_some_and(|e| e.contains("not installed"))
    );

    assert_eq!(cache::load(&dir).unwrap(), result);
}

#[tokio::test]
async fn name_falls_back_to_the_last_committer() {
    if !git_available() {
        return;
    }
    let root = tempfile::tempdir().unwrap();
    let dir = repo(root.path(), "hw1-grace");
    commit_as(&dir, "grace", "2024-01-02T09:00:00Z", "hw.py");

    let result = evaluator().evaluate(&dir, None, None).await.unwrap();
    assert_eq!(result.name, "grace");
    assert!(result.past_due.is_none());
    assert!(result.assignment_deadline.is_none());
}

#[tokio::test]
async fn empty_repository_is_skipped_without_a_cache_file() {
    if !git_available() {
        return;
    }
    let root = tempfile::tempdir().unwrap();
    let dir = repo(root.path(), "hw1-empty");

    let outcome = evaluator().evaluate(&dir, None, None).await;
    assert!(matches!(outcome, Err(GradeError::NoCommits(_))));
    assert!(outcome.is_err_and(|e| e.is_skip()));
    assert!(!cache::has_results(&dir));
}

#[tokio::test]
async fn bot_only_history_counts_as_no_submission() {
    if !git_available() {
        return;
    }
    let root = tempfile::tempdir().unwrap();
    let dir = repo(root.path(), "hw1-untouched");
    commit_as(&dir, "github-classroom[bot]", "2024-01-01T12:00:00Z", "README.md");

    let outcome = evaluator().evaluate(&dir, None, None).await;
    assert!(matches!(outcome, Err(GradeError::NoCommits(_))));
    assert!(!cache::has_results(&dir));
}

#[tokio::test]
async fn plain_directories_are_rejected() {
    let root = tempfile::tempdir().unwrap();
    let outcome = evaluator().evaluate(root.path(), None, None).await;
    assert!(matches!(outcome, Err(GradeError::NotARepository(_))));
}
