#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use lazy_static::lazy_static;
use regex::Regex;

/// Hidden file, inside each submission directory, holding the cached result.
pub const RESULTS_FILE_NAME: &str = ".test_results.json";

/// Default name of the rendered feedback document.
pub const DEFAULT_FEEDBACK_FILE_NAME: &str = "FEEDBACK.md";

/// Default name of the grade export written to the root directory.
pub const DEFAULT_GRADES_FILE_NAME: &str = "grades.csv";

/// Name of the per-assignment settings file.
pub const SETTINGS_FILE_NAME: &str = "assignment.toml";

/// Author-name marker of automated accounts; commit scans stop at the first
/// commit carrying it.
pub const DEFAULT_BOT_MARKER: &str = "[bot]";

/// Roster identities shorter than this are rejected; they would match far too
/// many directory names.
pub const MIN_PATTERN_LEN: usize = 2;

/// Literal prefix of the feedback line carrying the final score. Other
/// tooling greps for it, so it must never change.
pub const FINAL_SCORE_PREFIX: &str = "| Final Score";

/// Width of the label column in summary tables.
pub const SUMMARY_LABEL_WIDTH: usize = 25;

/// Width of the value column in terminal summary tables.
pub const SUMMARY_VALUE_WIDTH: usize = 52;

/// Column at which lint messages are wrapped in feedback documents.
pub const FEEDBACK_WRAP_WIDTH: usize = 80;

/// Pylint checks that are stylistic nitpicks rather than grading concerns.
/// * naming style, missing module/class/function docstrings
/// * trailing whitespace, final newline, trailing newlines
/// * duplicate code, too few public methods, too many args/locals/statements
/// * bare except, f-string without interpolation
/// * chained comparison, `sys.exit` consider
pub const LINT_DISABLED: &[&str] = &[
    "C0103", "C0114", "C0115", "C0116", "C0303", "C0304", "C0305", "R0801", "R0903", "R0913",
    "R0914", "R0915", "W0702", "W1309", "R1716", "R1722",
];

/// Header row of the grade export.
pub const GRADES_CSV_HEADER: [&str; 6] =
    ["Name", "Score", "Past Due", "Commit Count", "Last Commit", "Directory"];

lazy_static! {
    /// Strips the noisy `...Error: <values> :` prefix unittest puts in front
    /// of custom assertion messages.
    pub static ref FAILURE_NOISE: Regex =
        Regex::new(r"(?s).+Error:.+?\s:").expect("failure noise pattern is valid");

    /// Characters that may not appear in a renamed directory.
    pub static ref UNSAFE_DIR_CHARS: Regex =
        Regex::new(r#"([<>:"/\\,|?*]|\s)+"#).expect("unsafe dir chars pattern is valid");
}
