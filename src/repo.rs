#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Submission repositories, driven through the `git` command line.

use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use itertools::Itertools;

use crate::{
    error::{GradeError, GradeResult},
    process::{Collected, StdinSource, run_collect},
};

/// Separates the fields of one `git log` record.
const FIELD_SEP: char = '\x1f';

/// Terminates one `git log` record.
const RECORD_SEP: char = '\x1e';

/// `git log` format producing `hash, author, email, commit time, body`.
const LOG_FORMAT: &str = "--format=%H%x1f%an%x1f%ae%x1f%ct%x1f%B%x1e";

/// One commit as seen by the grader.
#[derive(Clone, Debug, PartialEq)]
pub struct CommitInfo {
    /// Full commit hash.
    pub hash:         String,
    /// Author name.
    pub author_name:  String,
    /// Author email.
    pub author_email: String,
    /// Committer timestamp.
    pub date:         DateTime<Utc>,
    /// Full message, trimmed.
    pub message:      String,
}

/// Returns true if `dir` has a `.git` entry (directory, or file for
/// worktrees and submodules).
pub fn is_git_dir(dir: &Path) -> bool {
    dir.join(".git").exists()
}

/// Immediate subdirectories of `root` that are git repositories, sorted.
pub fn git_dirs(root: &Path) -> GradeResult<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(root).map_err(|e| GradeError::io(root, e))? {
        let path = entry.map_err(|e| GradeError::io(root, e))?.path();
        if path.is_dir() && is_git_dir(&path) {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Runs `git args` in `dir` and fails on a nonzero exit.
async fn git(dir: &Path, args: &[&str]) -> GradeResult<Collected> {
    git_with(dir, args, StdinSource::Null).await
}

/// Like [`git`], but lets a credential helper prompt on the terminal.
async fn git_remote(dir: &Path, args: &[&str]) -> GradeResult<Collected> {
    git_with(dir, args, StdinSource::Inherit).await
}

/// Runs `git args` in `dir` with the given stdin.
async fn git_with(dir: &Path, args: &[&str], stdin: StdinSource) -> GradeResult<Collected> {
    let os_args: Vec<OsString> = args.iter().map(OsString::from).collect();
    let command = args.join(" ");
    let output = run_collect("git", &os_args, stdin, Some(dir), None)
        .await
        .map_err(|e| GradeError::Git {
            command: command.clone(),
            dir:     dir.display().to_string(),
            stderr:  format!("{e:#}"),
        })?;

    if !output.success() {
        return Err(GradeError::Git {
            command,
            dir: dir.display().to_string(),
            stderr: output.stderr_lossy(),
        });
    }
    Ok(output)
}

/// The `user.email` git is configured with, or `None` when it is unset.
pub async fn user_email() -> GradeResult<Option<String>> {
    let args: Vec<OsString> = ["config", "--get", "user.email"].map(OsString::from).into();
    let output = run_collect("git", &args, StdinSource::Null, None, None)
        .await
        .map_err(|e| GradeError::Git {
            command: "config --get user.email".to_string(),
            dir:     ".".to_string(),
            stderr:  format!("{e:#}"),
        })?;
    if !output.success() {
        return Ok(None);
    }
    let email = output.stdout_lossy().trim().to_string();
    Ok((!email.is_empty()).then_some(email))
}

/// Parses `git log` output written with [`LOG_FORMAT`].
fn parse_log(raw: &str) -> Vec<CommitInfo> {
    raw.split(RECORD_SEP)
        .map(|record| record.trim_start_matches(['\n', '\r']))
        .filter(|record| !record.is_empty())
        .filter_map(|record| {
            let (hash, author_name, author_email, timestamp, message) =
                record.splitn(5, FIELD_SEP).collect_tuple()?;
            let date = DateTime::from_timestamp(timestamp.trim().parse().ok()?, 0)?;
            Some(CommitInfo {
                hash: hash.to_string(),
                author_name: author_name.to_string(),
                author_email: author_email.to_string(),
                date,
                message: message.trim().to_string(),
            })
        })
        .collect()
}

/// Keeps commits newest first up to, not including, the first one authored
/// by an account whose name contains `bot_marker`.
pub fn student_commits(commits: Vec<CommitInfo>, bot_marker: &str) -> Vec<CommitInfo> {
    commits
        .into_iter()
        .take_while(|c| !c.author_name.contains(bot_marker))
        .collect()
}

/// A submission directory known to be a git repository.
#[derive(Clone, Debug)]
pub struct SubmissionRepo {
    /// Working tree root.
    dir: PathBuf,
}

impl SubmissionRepo {
    /// Opens `dir`, failing with [`GradeError::NotARepository`] when it is
    /// not a git repository.
    pub fn open(dir: impl Into<PathBuf>) -> GradeResult<Self> {
        let dir = dir.into();
        if !is_git_dir(&dir) {
            return Err(GradeError::NotARepository(dir.display().to_string()));
        }
        Ok(Self { dir })
    }

    /// Clones `url` into `target` and opens the result.
    pub async fn clone_from(url: &str, target: &Path) -> GradeResult<Self> {
        let parent = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let target_str = target.to_string_lossy().into_owned();
        git_remote(&parent, &["clone", url, target_str.as_str()]).await?;
        tracing::info!("Cloned {url} into {}", target.display());
        Self::open(target)
    }

    /// Working tree root.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns true once the repository has at least one commit.
    pub async fn has_commits(&self) -> GradeResult<bool> {
        let output = run_collect(
            "git",
            &["rev-parse".into(), "--verify".into(), "-q".into(), "HEAD".into()],
            StdinSource::Null,
            Some(&self.dir),
            None,
        )
        .await
        .map_err(|e| GradeError::Git {
            command: "rev-parse --verify -q HEAD".to_string(),
            dir:     self.dir.display().to_string(),
            stderr:  format!("{e:#}"),
        })?;
        Ok(output.success())
    }

    /// Every commit reachable from `HEAD`, newest first.
    pub async fn commits(&self) -> GradeResult<Vec<CommitInfo>> {
        if !self.has_commits().await? {
            return Ok(Vec::new());
        }
        let output = git(&self.dir, &["log", LOG_FORMAT]).await?;
        Ok(parse_log(&output.stdout_lossy()))
    }

    /// Commits newest first, stopping at the first bot-authored one.
    pub async fn student_commits(&self, bot_marker: &str) -> GradeResult<Vec<CommitInfo>> {
        Ok(student_commits(self.commits().await?, bot_marker))
    }

    /// Returns true when there are uncommitted changes or untracked files.
    pub async fn is_dirty(&self) -> GradeResult<bool> {
        let output = git(&self.dir, &["status", "--porcelain"]).await?;
        Ok(!output.stdout_lossy().trim().is_empty())
    }

    /// Pulls from the tracked remote.
    pub async fn pull(&self) -> GradeResult<()> {
        git_remote(&self.dir, &["pull"]).await.map(drop)
    }

    /// Stages everything and commits it with `message`.
    pub async fn commit_all(&self, message: &str) -> GradeResult<()> {
        git(&self.dir, &["add", "."]).await?;
        git(&self.dir, &["commit", "-m", message]).await.map(drop)
    }

    /// Pushes to the tracked remote.
    pub async fn push(&self) -> GradeResult<()> {
        git_remote(&self.dir, &["push"]).await.map(drop)
    }

    /// Runs an arbitrary `git args` in the working tree. A nonzero exit is
    /// returned as output rather than as an error.
    pub async fn run_git(&self, args: &[String]) -> GradeResult<Collected> {
        let os_args: Vec<OsString> = args.iter().map(OsString::from).collect();
        run_collect("git", &os_args, StdinSource::Inherit, Some(&self.dir), None)
            .await
            .map_err(|e| GradeError::Git {
                command: args.join(" "),
                dir:     self.dir.display().to_string(),
                stderr:  format!("{e:#}"),
            })
    }
}

/// Pulls, commits and pushes every dirty repository directly under `root`.
/// With `preview` the dirty repositories are only listed. Failures are
/// logged per repository. Returns the dirty repositories.
pub async fn commit_all(root: &Path, message: &str, preview: bool) -> GradeResult<Vec<PathBuf>> {
    let mut dirty = Vec::new();
    for dir in git_dirs(root)? {
        let repo = SubmissionRepo::open(&dir)?;
        match repo.is_dirty().await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!("{} is clean", dir.display());
                continue;
            }
            Err(e) => {
                tracing::error!("{}: {e}", dir.display());
                continue;
            }
        }

        if preview {
            tracing::info!("Would commit {}", dir.display());
            dirty.push(dir);
            continue;
        }

        tracing::info!("Committing {}", dir.display());
        let outcome = async {
            repo.pull().await?;
            repo.commit_all(message).await?;
            repo.push().await
        }
        .await;
        if let Err(e) = outcome {
            tracing::error!("{}: {e}", dir.display());
        }
        dirty.push(dir);
    }
    Ok(dirty)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(author: &str, ts: i64) -> CommitInfo {
        CommitInfo {
            hash:         format!("{ts:040}"),
            author_name:  author.to_string(),
            author_email: format!("{author}@example.com"),
            date:         DateTime::from_timestamp(ts, 0).unwrap(),
            message:      "msg".to_string(),
        }
    }

    #[test]
    fn scan_stops_at_first_bot_commit() {
        let history = vec![
            commit("ada", 30),
            commit("ada", 20),
            commit("github-classroom[bot]", 10),
            commit("ada", 5),
        ];
        let kept = student_commits(history, "[bot]");
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].date.timestamp(), 30);
    }

    #[test]
    fn log_records_are_parsed() {
        let raw = "abc\x1fAda\x1fada@example.com\x1f1704067200\x1fFix add\n\nBody\n\x1e\n\
                   def\x1fBot[bot]\x1fbot@example.com\x1f1704060000\x1fInitial\n\x1e\n";
        let commits = parse_log(raw);
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].hash, "abc");
        assert_eq!(commits[0].message, "Fix add\n\nBody");
        assert_eq!(commits[0].date.timestamp(), 1_704_067_200);
        assert_eq!(commits[1].author_name, "Bot[bot]");
    }

    #[test]
    fn open_rejects_plain_directories() {
        let dir = tempfile::tempdir().unwrap();
        let err = SubmissionRepo::open(dir.path()).unwrap_err();
        assert!(matches!(err, GradeError::NotARepository(_)));
    }
}
