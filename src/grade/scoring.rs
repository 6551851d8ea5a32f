#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Weighted scoring and the summary rows shared by the terminal and the
//! feedback document.

use bon::Builder;
use serde::{Deserialize, Serialize};
use tabled::{
    Table, Tabled,
    settings::{Modify, Style, Width, object::Columns},
};

use super::results::SubmissionResult;
use crate::{constants::SUMMARY_VALUE_WIDTH, datetime::friendly_local_datetime};

/// How the category fractions combine into a grade. Supplied per invocation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Builder)]
pub struct ScoringParams {
    /// Points for a perfect submission.
    #[builder(default = 10.0)]
    pub max_score:    f64,
    /// Weight of the test pass fraction, 0 to 1.
    #[builder(default = 1.0)]
    pub test_weight:  f64,
    /// Weight of the style score fraction, 0 to 1.
    #[builder(default = 0.0)]
    pub style_weight: f64,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Category fractions and the resulting grade.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Score {
    /// Test pass fraction used (0 when tests were not evaluated).
    pub test_fraction:  f64,
    /// Style fraction used (0 when style was not evaluated).
    pub style_fraction: f64,
    /// `max_score * (test * test_weight + style * style_weight)`, rounded to
    /// two decimals.
    pub overall:        f64,
}

/// Scores a result. Weights are not validated; keeping them at or below 1 in
/// total is up to the caller.
pub fn score(result: &SubmissionResult, params: &ScoringParams) -> Score {
    let test_fraction = result.test_pass_fraction.unwrap_or(0.0);
    let style_fraction = result.style_score_fraction.unwrap_or(0.0);
    let weighted = test_fraction * params.test_weight + style_fraction * params.style_weight;
    let overall = (params.max_score * weighted * 100.0).round() / 100.0;

    Score {
        test_fraction,
        style_fraction,
        overall,
    }
}

/// Formats like C's `%g`: `precision` significant digits, trailing zeros
/// dropped, exponent notation for very large or small magnitudes.
pub fn fmt_g(value: f64, precision: usize) -> String {
    if !value.is_finite() {
        return value.to_string().to_lowercase();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let precision = precision.max(1);
    let scientific = format!("{:.*e}", precision - 1, value);
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or_default();

    if exponent < -4 || exponent >= precision as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", strip_zeros(mantissa), exponent.abs())
    } else {
        let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
        strip_zeros(&format!("{value:.decimals$}"))
    }
}

/// Drops trailing fractional zeros and a dangling decimal point.
fn strip_zeros(number: &str) -> String {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        number.to_string()
    }
}

/// Formats a fraction and its weight as percentages, e.g. `75% (weight: 80%)`.
fn weighted_percent(fraction: f64, weight: f64) -> String {
    format!("{}% (weight: {}%)", fmt_g(fraction * 100.0, 4), fmt_g(weight * 100.0, 4))
}

/// First line of `value` with `|` escaped, so a value always stays inside
/// its own table cell.
fn cell(value: &str) -> String {
    value
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .replace('|', "\\|")
}

/// Label/value pairs summarizing one scored submission, in display order.
/// Every value is a single line.
pub fn summary_rows(
    result: &SubmissionResult,
    score: &Score,
    params: &ScoringParams,
) -> Vec<(&'static str, String)> {
    let mut rows = vec![("Student Name", result.name.clone())];
    if let Some(title) = &result.assignment_title {
        rows.push(("Assignment Title", title.clone()));
    }
    if let Some(deadline) = &result.assignment_deadline {
        rows.push(("Deadline", friendly_local_datetime(deadline)));
    }
    rows.extend([
        ("Last Commit Date", friendly_local_datetime(&result.commit_date)),
        ("Last Commit Author", result.committer_name.clone()),
        ("Last Commit Message", result.commit_message.clone()),
        ("Total Commit Count", result.num_commits.to_string()),
        ("Functionality Score", weighted_percent(score.test_fraction, params.test_weight)),
        ("Code Style Score", weighted_percent(score.style_fraction, params.style_weight)),
        (
            "Calculated Score",
            format!("{} / {}", fmt_g(score.overall, 6), fmt_g(params.max_score, 6)),
        ),
    ]);
    if let Some(past_due) = &result.past_due {
        rows.push(("Past Due", past_due.clone()));
    }
    rows.into_iter()
        .map(|(label, value)| (label, cell(&value)))
        .collect()
}

/// One row of the terminal summary.
#[derive(Tabled)]
struct SummaryRow {
    /// Row label.
    #[tabled(rename = "Item")]
    item:  &'static str,
    /// Row value.
    #[tabled(rename = "Value")]
    value: String,
}

/// Renders the summary as a terminal table.
pub fn summary_table(result: &SubmissionResult, score: &Score, params: &ScoringParams) -> String {
    let rows = summary_rows(result, score, params)
        .into_iter()
        .map(|(item, value)| SummaryRow { item, value });

    Table::new(rows)
        .with(Style::modern())
        .with(Modify::new(Columns::one(1)).with(Width::wrap(SUMMARY_VALUE_WIDTH).keep_words(true)))
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_printf_general_format() {
        assert_eq!(fmt_g(8.0, 6), "8");
        assert_eq!(fmt_g(7.5, 6), "7.5");
        assert_eq!(fmt_g(75.0, 4), "75");
        assert_eq!(fmt_g(83.33333, 4), "83.33");
        assert_eq!(fmt_g(100.0, 4), "100");
        assert_eq!(fmt_g(123456.0, 4), "1.235e+05");
        assert_eq!(fmt_g(0.0001, 6), "0.0001");
        assert_eq!(fmt_g(0.00001, 6), "1e-05");
        assert_eq!(fmt_g(-2.5, 6), "-2.5");
        assert_eq!(fmt_g(0.0, 6), "0");
    }

    #[test]
    fn percentages_use_four_significant_digits() {
        assert_eq!(weighted_percent(0.75, 0.8), "75% (weight: 80%)");
        assert_eq!(weighted_percent(0.6667, 1.0), "66.67% (weight: 100%)");
    }

    #[test]
    fn cells_hold_one_escaped_line() {
        assert_eq!(cell("fix tests\n\nlong body"), "fix tests");
        assert_eq!(cell("\n  a | b  \n"), "a \\| b");
        assert_eq!(cell(""), "");
    }

    #[test]
    fn defaults_weight_tests_only() {
        let params = ScoringParams::default();
        assert_eq!(params.max_score, 10.0);
        assert_eq!(params.test_weight, 1.0);
        assert_eq!(params.style_weight, 0.0);
    }
}
