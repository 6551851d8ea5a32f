#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Late-submission report over a directory of student repositories.

use std::path::Path;

use chrono::{DateTime, Utc};
use tabled::{
    Table, Tabled,
    settings::{Modify, Style, Width, object::Columns},
};

use crate::{
    constants::SUMMARY_VALUE_WIDTH,
    datetime::{friendly_local_datetime, lateness},
    error::GradeResult,
    repo::{CommitInfo, SubmissionRepo, git_dirs},
    roster::Labeling,
};

/// Commits made after `deadline`, newest first.
///
/// Commits authored with `own_email` are skipped, since they are the
/// instructor's. The scan stops at the first bot-authored commit and at the
/// first commit made on time.
pub fn late_commits(
    commits: Vec<CommitInfo>,
    deadline: &DateTime<Utc>,
    bot_marker: &str,
    own_email: Option<&str>,
) -> Vec<CommitInfo> {
    commits
        .into_iter()
        .filter(|c| own_email.is_none_or(|email| c.author_email != email))
        .take_while(|c| !c.author_name.contains(bot_marker) && c.date > *deadline)
        .collect()
}

/// One student's late work.
#[derive(Clone, Debug, PartialEq)]
pub struct LateSubmission {
    /// Roster name, or the directory name when the roster has none.
    pub student:  String,
    /// Repository directory name.
    pub dir_name: String,
    /// Late commits, newest first. Never empty.
    pub commits:  Vec<CommitInfo>,
}

impl LateSubmission {
    /// How late the newest commit was.
    pub fn amount(&self, deadline: &DateTime<Utc>) -> Option<String> {
        self.commits.first().and_then(|c| lateness(&c.date, deadline))
    }
}

/// Scans every repository under `root` for commits made after `deadline`.
/// Repositories that cannot be read are logged and skipped. The result is
/// sorted by student.
pub async fn late_submissions(
    root: &Path,
    deadline: &DateTime<Utc>,
    labeling: Option<&Labeling>,
    bot_marker: &str,
    own_email: Option<&str>,
) -> GradeResult<Vec<LateSubmission>> {
    let mut late = Vec::new();
    for dir in git_dirs(root)? {
        let dir_name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let commits = match SubmissionRepo::open(&dir)?.commits().await {
            Ok(commits) => commits,
            Err(e) => {
                tracing::error!("{}: {e}", dir.display());
                continue;
            }
        };

        let commits = late_commits(commits, deadline, bot_marker, own_email);
        if commits.is_empty() {
            tracing::debug!("{dir_name} is on time");
            continue;
        }
        let student = labeling
            .and_then(|l| l.display_name(&dir_name))
            .unwrap_or(&dir_name)
            .to_string();
        late.push(LateSubmission {
            student,
            dir_name,
            commits,
        });
    }
    late.sort_by(|a, b| a.student.cmp(&b.student));
    Ok(late)
}

/// One line of the late-submission table.
#[derive(Tabled)]
struct LateRow {
    /// Blank on follow-up commits of the same student.
    #[tabled(rename = "STUDENT")]
    student: String,
    /// Blank on follow-up commits of the same student.
    #[tabled(rename = "AMOUNT")]
    amount:  String,
    /// Local commit time.
    #[tabled(rename = "COMMIT DATE")]
    date:    String,
    /// Subject line.
    #[tabled(rename = "COMMIT MESSAGE")]
    message: String,
}

/// Renders `late` as a terminal table with one row per commit.
pub fn late_table(late: &[LateSubmission], deadline: &DateTime<Utc>) -> String {
    let rows = late.iter().flat_map(|submission| {
        submission.commits.iter().enumerate().map(|(i, commit)| {
            let (student, amount) = if i == 0 {
                (
                    submission.student.clone(),
                    submission.amount(deadline).unwrap_or_default(),
                )
            } else {
                Default::default()
            };
            LateRow {
                student,
                amount,
                date: friendly_local_datetime(&commit.date),
                message: commit.message.lines().next().unwrap_or_default().to_string(),
            }
        })
    });

    Table::new(rows)
        .with(Style::modern())
        .with(Modify::new(Columns::one(3)).with(Width::wrap(SUMMARY_VALUE_WIDTH).keep_words(true)))
        .to_string()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn commit(author: &str, day: u32, hour: u32, message: &str) -> CommitInfo {
        CommitInfo {
            hash:         format!("{author}{day}{hour}"),
            author_name:  author.to_string(),
            author_email: format!("{author}@example.com"),
            date:         Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap(),
            message:      message.to_string(),
        }
    }

    fn deadline() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 5, 23, 59, 0).unwrap()
    }

    #[test]
    fn only_commits_after_the_deadline_are_late() {
        let history = vec![
            commit("ada", 7, 9, "third"),
            commit("ada", 6, 9, "second"),
            commit("ada", 5, 9, "on time"),
            commit("ada", 8, 9, "rewritten history"),
        ];
        let late = late_commits(history, &deadline(), "[bot]", None);
        let messages: Vec<&str> = late.iter().map(|c| c.message.as_str()).collect();
        assert_eq!(messages, vec!["third", "second"]);
    }

    #[test]
    fn instructor_commits_are_not_held_against_students() {
        let history = vec![
            commit("prof", 9, 9, "grades"),
            commit("ada", 6, 9, "late fix"),
            commit("github-classroom[bot]", 1, 9, "setup"),
        ];
        let late = late_commits(history.clone(), &deadline(), "[bot]", Some("prof@example.com"));
        assert_eq!(late.len(), 1);
        assert_eq!(late[0].author_name, "ada");

        assert_eq!(late_commits(history, &deadline(), "[bot]", None).len(), 2);
    }

    #[test]
    fn bot_commits_end_the_scan() {
        let history = vec![
            commit("github-classroom[bot]", 9, 9, "feedback"),
            commit("ada", 8, 9, "late"),
        ];
        assert!(late_commits(history, &deadline(), "[bot]", None).is_empty());
    }

    #[test]
    fn table_names_each_student_once() {
        let late = vec![LateSubmission {
            student:  "Ada Lovelace".to_string(),
            dir_name: "hw1-ada".to_string(),
            commits:  vec![
                commit("ada", 7, 0, "final answer\n\nwith a body"),
                commit("ada", 6, 0, "almost"),
            ],
        }];
        let table = late_table(&late, &deadline());
        assert_eq!(table.matches("Ada Lovelace").count(), 1);
        assert!(table.contains("1 day + 0:01"));
        assert!(table.contains("final answer"));
        assert!(table.contains("almost"));
        assert!(!table.contains("with a body"));
        assert!(table.contains("COMMIT MESSAGE"));
    }
}
