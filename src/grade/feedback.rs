#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Renders the Markdown feedback document and reads the grade back out of it.

use std::{
    fs,
    path::{Path, PathBuf},
};

use itertools::Itertools;

use super::{
    cache,
    results::{LintMessage, SubmissionResult, TestReport},
    scoring::{Score, ScoringParams, fmt_g, score, summary_rows},
};
use crate::{
    constants::{FAILURE_NOISE, FEEDBACK_WRAP_WIDTH, FINAL_SCORE_PREFIX, SUMMARY_LABEL_WIDTH},
    error::{GradeError, GradeResult},
};

/// Horizontal rule between sections.
const RULE_WIDTH: usize = 80;

/// Indent applied to messages inside code blocks.
const INDENT: &str = "    ";

/// Appends one line to the document.
fn wl(doc: &mut String, line: impl AsRef<str>) {
    doc.push_str(line.as_ref());
    doc.push('\n');
}

/// One `| label | value` row with the label padded to the fixed column width.
pub fn summary_row(label: &str, value: &str) -> String {
    format!("| {label:<width$} | {value}", width = SUMMARY_LABEL_WIDTH - 2)
}

/// Separator printed after every feedback block.
fn separator(doc: &mut String) {
    wl(doc, "");
    wl(doc, " •".repeat(20));
    wl(doc, "");
}

/// Indents every non-blank line.
fn indent(text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                line.to_string()
            } else {
                format!("{INDENT}{line}")
            }
        })
        .join("\n")
}

/// Removes the `...Error: <values> :` prefix unittest adds to custom
/// assertion messages.
pub fn clean_failure_message(message: &str) -> String {
    FAILURE_NOISE.replace_all(message, "").trim().to_string()
}

/// Greedy word wrap at `width` columns, every line prefixed with `indent`.
/// Words longer than a line are split.
fn wrap(text: &str, width: usize, indent: &str) -> Vec<String> {
    let room = width.saturating_sub(indent.len()).max(1);
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        loop {
            let current_len = current.chars().count();
            let needed = if current.is_empty() { word.len() } else { current_len + 1 + word.len() };
            if needed <= room {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.extend(word.iter());
                break;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                continue;
            }
            let rest = word.split_off(room);
            lines.push(word.iter().collect());
            word = rest;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines.into_iter().map(|l| format!("{indent}{l}")).collect()
}

/// Writes the failing-tests section.
fn render_tests(doc: &mut String, report: &TestReport) {
    wl(doc, "");
    wl(doc, "-".repeat(RULE_WIDTH));
    wl(doc, "## Functionality Feedback (pytest)");
    wl(doc, "-".repeat(RULE_WIDTH));
    wl(doc, "```");

    let leaves = report.failing_leaves();
    if leaves.is_empty() {
        if let Some(message) = report.message.as_deref() {
            wl(doc, "Test session");
            wl(doc, indent(&clean_failure_message(message)));
            separator(doc);
        }
    }
    for (name, message) in leaves {
        let message = clean_failure_message(message.unwrap_or("No message provided"));
        wl(doc, name);
        wl(doc, indent(&message));
        separator(doc);
    }

    wl(doc, "```");
}

/// Writes the section explaining why the tests could not run at all.
fn render_test_exception(doc: &mut String, exception: &str) {
    wl(doc, "");
    wl(doc, "-".repeat(RULE_WIDTH));
    wl(doc, "## Functionality Feedback (pytest)");
    wl(doc, "-".repeat(RULE_WIDTH));
    wl(doc, "```");
    wl(doc, "The tests could not be run:");
    wl(doc, indent(exception));
    wl(doc, "```");
}

/// Header line of one lint diagnostic, e.g.
/// `warning: main.py line: 3 col: 4 (W0611):`.
fn lint_header(msg: &LintMessage) -> String {
    let path = if msg.path.is_empty() { "General Message" } else { msg.path.as_str() };
    let line = msg.line.filter(|l| *l > 0).map(|l| format!(" line: {l}")).unwrap_or_default();
    let col = msg.column.filter(|c| *c > 0).map(|c| format!(" col: {c}")).unwrap_or_default();
    let id = if msg.message_id.is_empty() { "No ID" } else { msg.message_id.as_str() };
    format!("{}: {path}{line}{col} ({id}):", msg.kind)
}

/// Writes the style diagnostics section.
fn render_style(doc: &mut String, messages: &[LintMessage]) {
    wl(doc, "");
    wl(doc, "-".repeat(RULE_WIDTH));
    wl(doc, "## Code Style Feedback (pylint)");
    wl(doc, "");
    wl(doc, "```");
    for msg in messages {
        let text = if msg.message.is_empty() { "No message provided" } else { msg.message.as_str() };
        wl(doc, lint_header(msg));
        wl(doc, wrap(text, FEEDBACK_WRAP_WIDTH, INDENT).join("\n"));
        separator(doc);
    }
    wl(doc, "```");
}

/// Renders the feedback document. Identical inputs give identical output.
pub fn render(result: &SubmissionResult, score: &Score, params: &ScoringParams) -> String {
    let mut doc = String::new();

    wl(&mut doc, "# Assignment Feedback");
    wl(&mut doc, "");
    wl(&mut doc, summary_row("Item", "Value"));
    wl(&mut doc, summary_row(&"-".repeat(SUMMARY_LABEL_WIDTH - 2), "-----"));
    for (label, value) in summary_rows(result, score, params) {
        wl(&mut doc, summary_row(label, &value));
    }
    wl(&mut doc, summary_row("Final Score", &fmt_g(score.overall, 6)));
    wl(&mut doc, "");
    wl(&mut doc, "");
    wl(&mut doc, "-".repeat(RULE_WIDTH));
    wl(&mut doc, "## Grader Comments:");
    wl(&mut doc, "");
    wl(&mut doc, "");
    wl(&mut doc, "");

    match (&result.test_detail, &result.test_exception) {
        (Some(report), _) => render_tests(&mut doc, report),
        (None, Some(exception)) => render_test_exception(&mut doc, exception),
        (None, None) => {}
    }

    if let Some(style) = &result.style_detail {
        render_style(&mut doc, &style.messages);
    }

    doc
}

/// Writes `document` to `path`. Without `overwrite` an existing file is left
/// untouched and [`GradeError::FeedbackExists`] is returned.
pub fn write(path: &Path, document: &str, overwrite: bool) -> GradeResult<()> {
    if path.exists() && !overwrite {
        return Err(GradeError::FeedbackExists(path.to_path_buf()));
    }
    fs::write(path, document).map_err(|e| GradeError::io(path, e))?;
    tracing::info!("Wrote {}", path.display());
    Ok(())
}

/// Loads the cached result in `dir`, scores it and writes the feedback
/// document next to it. Returns the document path.
pub fn generate(
    dir: &Path,
    feedback_filename: &str,
    params: &ScoringParams,
    overwrite: bool,
) -> GradeResult<PathBuf> {
    let path = dir.join(feedback_filename);
    if path.exists() && !overwrite {
        return Err(GradeError::FeedbackExists(path));
    }

    let result = cache::load(dir)?;
    let score = score(&result, params);
    write(&path, &render(&result, &score, params), overwrite)?;
    Ok(path)
}

/// Extracts the score from the `| Final Score` row of the summary table, the
/// first run of `|` lines in a feedback document. Returns `None` when the
/// table has no such row.
pub fn score_from_document(document: &str) -> Option<String> {
    document
        .lines()
        .skip_while(|line| !line.starts_with('|'))
        .take_while(|line| line.starts_with('|'))
        .filter(|line| line.starts_with(FINAL_SCORE_PREFIX))
        .last()
        .and_then(|line| line.strip_prefix('|'))
        .and_then(|rest| rest.split('|').nth(1))
        .map(|score| score.trim().to_string())
}

/// Reads a feedback file and extracts its score.
pub fn score_from_file(path: &Path) -> GradeResult<Option<String>> {
    let document = fs::read_to_string(path).map_err(|e| GradeError::io(path, e))?;
    Ok(score_from_document(&document))
}
