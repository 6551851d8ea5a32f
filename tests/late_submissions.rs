use std::{fs, path::Path, process::Command};

use au::{
    late::{late_submissions, late_table},
    repo::SubmissionRepo,
    roster::{MatchMode, Roster},
};
use chrono::{TimeZone, Utc};

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

fn commit_as(dir: &Path, author: &str, email: &str, timestamp: &str, message: &str) {
    fs::write(dir.join("hw.py"), format!("# {author} {timestamp}\n")).unwrap();
    git(dir, &["add", "."]);
    let status = Command::new("git")
        .args(["-c", "commit.gpgsign=false", "commit", "-q", "-m", message])
        .env("GIT_AUTHOR_NAME", author)
        .env("GIT_AUTHOR_EMAIL", email)
        .env("GIT_COMMITTER_NAME", author)
        .env("GIT_COMMITTER_EMAIL", email)
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
    commit_as(
        &dir,
        "github-classroom[bot]",
        "bot@example.com",
        "2024-01-01T12:00:00Z",
        "Initial commit",
    );
    dir
}

#[tokio::test]
async fn late_work_is_reported_per_student() {
    if !git_available() {
        return;
    }
    let root = tempfile::tempdir().unwrap();
    let ada = repo(root.path(), "hw1-ada");
    commit_as(&ada, "ada", "ada@example.com", "2024-01-05T10:00:00Z", "on time");
    commit_as(&ada, "ada", "ada@example.com", "2024-01-06T10:00:00Z", "late fix");
    commit_as(&ada, "prof", "prof@example.com", "2024-01-09T10:00:00Z", "feedback");

    let grace = repo(root.path(), "hw1-grace");
    commit_as(&grace, "grace", "grace@example.com", "2024-01-04T10:00:00Z", "done");

    repo(root.path(), "hw1-alan");

    let roster = Roster::from_entries([("ada", "Ada Lovelace"), ("grace", "Grace Hopper")]);
    let labeling = roster.label_dirs(&["hw1-ada", "hw1-grace", "hw1-alan"], MatchMode::Lookup, false);
    let deadline = Utc.with_ymd_and_hms(2024, 1, 5, 23, 59, 0).unwrap();

    let late = late_submissions(
        root.path(),
        &deadline,
        Some(&labeling),
        "[bot]",
        Some("prof@example.com"),
    )
    .await
    .unwrap();

    assert_eq!(late.len(), 1);
    assert_eq!(late[0].student, "Ada Lovelace");
    assert_eq!(late[0].dir_name, "hw1-ada");
    assert_eq!(late[0].commits.len(), 1);
    assert_eq!(late[0].commits[0].message, "late fix");
    assert_eq!(late[0].amount(&deadline).as_deref(), Some("10:01"));

    let table = late_table(&late, &deadline);
    assert!(table.contains("Ada Lovelace"));
    assert!(!table.contains("Grace Hopper"));
}

#[tokio::test]
async fn unlabeled_directories_use_their_own_name() {
    if !git_available() {
        return;
    }
    let root = tempfile::tempdir().unwrap();
    let dir = repo(root.path(), "hw1-mystery");
    commit_as(&dir, "someone", "someone@example.com", "2024-02-01T00:00:00Z", "late");
    let deadline = Utc.with_ymd_and_hms(2024, 1, 5, 23, 59, 0).unwrap();

    let late = late_submissions(root.path(), &deadline, None, "[bot]", None)
        .await
        .unwrap();
    assert_eq!(late.len(), 1);
    assert_eq!(late[0].student, "hw1-mystery");
}

#[tokio::test]
async fn arbitrary_git_commands_report_their_output() {
    if !git_available() {
        return;
    }
    let root = tempfile::tempdir().unwrap();
    let dir = repo(root.path(), "hw1-ada");
    fs::write(dir.join("notes.txt"), "draft\n").unwrap();

    let repo = SubmissionRepo::open(&dir).unwrap();
    let status = repo
        .run_git(&["status".to_string(), "--porcelain".to_string()])
        .await
        .unwrap();
    assert!(status.success());
    assert!(status.stdout_lossy().contains("notes.txt"));

    let bogus = repo.run_git(&["no-such-command".to_string()]).await.unwrap();
    assert!(!bogus.success());
    assert!(!bogus.stderr_lossy().is_empty());
}
