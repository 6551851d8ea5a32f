#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! The persisted per-submission record and the tool reports nested in it.

use std::{collections::BTreeMap, fmt::Display};

use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::datetime::iso;

/// Rounds to three decimals, the precision fractions are stored with.
pub(crate) fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Outcome of a test, a sub-test or a whole test session.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Passed (skipped and expected-failure tests count as passing).
    #[default]
    Pass,
    /// An assertion failed.
    Fail,
    /// Setup, teardown or collection blew up.
    Error,
}

impl Status {
    /// 1.0 when passing, 0.0 otherwise.
    pub fn indicator(self) -> f64 {
        if self == Status::Pass { 1.0 } else { 0.0 }
    }

    /// Returns true when passing.
    pub fn is_pass(self) -> bool {
        self == Status::Pass
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Pass => "pass",
            Status::Fail => "fail",
            Status::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// One named variant of a parameterized test.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Builder)]
#[builder(on(String, into))]
pub struct SubTest {
    /// Variant label, e.g. `2-3` for `test_add[2-3]`.
    pub name:    String,
    /// Outcome of the variant.
    #[serde(default)]
    #[builder(default)]
    pub status:  Status,
    /// Failure message, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Task number; inherited from the parent when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<u32>,
}

/// One test function (or method), possibly expanded into sub-tests.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Builder)]
#[builder(on(String, into))]
pub struct TestCase {
    /// Node id without parameters, e.g. `test_calc.py::TestAdd::test_add`.
    #[serde(alias = "name")]
    pub nodeid:    String,
    /// Outcome of the test as a whole.
    #[serde(default)]
    #[builder(default)]
    pub status:    Status,
    /// Failure message, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message:   Option<String>,
    /// Expanded variants; empty for plain tests.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[builder(default)]
    pub sub_tests: Vec<SubTest>,
    /// Task number from the test's metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id:   Option<u32>,
    /// Wall time in seconds across all phases.
    #[serde(default)]
    #[builder(default)]
    pub duration:  f64,
}

impl TestCase {
    /// Fraction of this test that passed. Plain tests score 0 or 1; tests
    /// with sub-tests score the mean of their sub-tests.
    pub fn pass_fraction(&self) -> f64 {
        if self.sub_tests.is_empty() {
            self.status.indicator()
        } else {
            let passed: f64 = self.sub_tests.iter().map(|t| t.status.indicator()).sum();
            passed / self.sub_tests.len() as f64
        }
    }

    /// Node id rendered for humans: `file >> Class >> test`.
    pub fn qualified_name(&self) -> String {
        self.nodeid
            .split("::")
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" >> ")
    }
}

/// Structured outcome of one test session.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct TestReport {
    /// Session-level outcome.
    #[serde(default)]
    pub status:  Status,
    /// Session-level message, set when the session itself errored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Every collected test, in report order.
    #[serde(default)]
    pub tests:   Vec<TestCase>,
}

impl TestReport {
    /// Mean of the per-test pass fractions, every test weighted equally. A
    /// session without tests scores 1 only if it passed.
    pub fn pass_fraction(&self) -> f64 {
        if self.tests.is_empty() {
            return self.status.indicator();
        }
        let total: f64 = self.tests.iter().map(TestCase::pass_fraction).sum();
        total / self.tests.len() as f64
    }

    /// Failing leaves as `(qualified name, message)`: failing sub-tests of
    /// expanded tests, otherwise the failing test itself.
    pub fn failing_leaves(&self) -> Vec<(String, Option<&str>)> {
        let mut leaves = Vec::new();
        for test in self.tests.iter().filter(|t| !t.status.is_pass()) {
            if test.sub_tests.is_empty() {
                leaves.push((test.qualified_name(), test.message.as_deref()));
                continue;
            }
            let parent = test.qualified_name();
            for sub in test.sub_tests.iter().filter(|s| !s.status.is_pass()) {
                leaves.push((format!("{parent} >> {}", sub.name), sub.message.as_deref()));
            }
        }
        leaves
    }
}

/// A single pylint message, in pylint's `json2` shape.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Builder)]
#[serde(rename_all = "camelCase")]
#[builder(on(String, into))]
pub struct LintMessage {
    /// Category: convention, refactor, warning, error, fatal.
    #[serde(rename = "type", default)]
    #[builder(default)]
    pub kind:       String,
    /// Symbolic name, e.g. `unused-import`.
    #[serde(default)]
    #[builder(default)]
    pub symbol:     String,
    /// Human readable message.
    #[serde(default)]
    #[builder(default)]
    pub message:    String,
    /// Rule id, e.g. `W0611`.
    #[serde(default)]
    #[builder(default)]
    pub message_id: String,
    /// Path as pylint reported it.
    #[serde(default)]
    #[builder(default)]
    pub path:       String,
    /// Module name.
    #[serde(default)]
    #[builder(default)]
    pub module:     String,
    /// Enclosing object (function, class), if any.
    #[serde(default)]
    #[builder(default)]
    pub obj:        String,
    /// 1-based line; 0 or absent for file-level messages.
    #[serde(default)]
    pub line:       Option<u32>,
    /// 0-based column.
    #[serde(default)]
    pub column:     Option<u32>,
}

/// Aggregate statistics pylint attaches to a run.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LintStatistics {
    /// Pylint's own score out of 10; may be negative.
    pub score:              f64,
    /// Number of modules linted.
    #[serde(default)]
    pub modules_linted:     u32,
    /// Message counts keyed by category.
    #[serde(default)]
    pub message_type_count: BTreeMap<String, u32>,
}

/// Structured outcome of one lint run.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct StyleReport {
    /// Diagnostics in pylint's order.
    #[serde(default)]
    pub messages:   Vec<LintMessage>,
    /// Aggregate statistics.
    pub statistics: LintStatistics,
}

impl StyleReport {
    /// Pylint's score normalized to `0..=1`.
    pub fn score_fraction(&self) -> f64 {
        round3((self.statistics.score / 10.0).clamp(0.0, 1.0))
    }
}

/// Everything learned about one submission in one evaluation run.
///
/// Written to the hidden results file inside the submission directory and
/// read back by the feedback and export commands. Older result files used
/// different key names; those are accepted as aliases.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Builder)]
#[builder(on(String, into))]
pub struct SubmissionResult {
    /// Student display name (falls back to the last committer).
    pub name:                 String,
    /// Name of the submission directory.
    pub dir_name:             String,
    /// Title of the assignment, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment_title:     Option<String>,
    /// Deadline of the assignment, when known.
    #[serde(default, with = "iso::option", skip_serializing_if = "Option::is_none")]
    pub assignment_deadline:  Option<DateTime<Utc>>,
    /// Student commits, newest first, up to the first bot commit.
    pub num_commits:          usize,
    /// Message of the latest student commit.
    pub commit_message:       String,
    /// Author of the latest student commit.
    #[serde(alias = "commiter_name")]
    pub committer_name:       String,
    /// Commit time of the latest student commit.
    #[serde(with = "iso")]
    pub commit_date:          DateTime<Utc>,
    /// How late the latest commit was, e.g. `1 day + 2:05`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub past_due:             Option<String>,
    /// Fraction of tests passing.
    #[serde(default, alias = "pytest_pct", skip_serializing_if = "Option::is_none")]
    pub test_pass_fraction:   Option<f64>,
    /// Full test report; kept only when something failed.
    #[serde(default, alias = "pytest_results", skip_serializing_if = "Option::is_none")]
    pub test_detail:          Option<TestReport>,
    /// Why the test run could not produce a report.
    #[serde(default, alias = "pytest_exception", skip_serializing_if = "Option::is_none")]
    pub test_exception:       Option<String>,
    /// Normalized lint score.
    #[serde(default, alias = "pylint_pct", skip_serializing_if = "Option::is_none")]
    pub style_score_fraction: Option<f64>,
    /// Full lint report; kept only when the score is below 1.
    #[serde(default, alias = "pylint_results", skip_serializing_if = "Option::is_none")]
    pub style_detail:         Option<StyleReport>,
    /// Why the lint run could not produce a report.
    #[serde(default, alias = "pylint_exception", skip_serializing_if = "Option::is_none")]
    pub style_exception:      Option<String>,
}

impl SubmissionResult {
    /// Records a finished test report, keeping detail only when imperfect.
    pub fn record_tests(&mut self, report: TestReport) {
        let fraction = round3(report.pass_fraction());
        self.test_pass_fraction = Some(fraction);
        self.test_exception = None;
        self.test_detail = (fraction < 1.0).then_some(report);
    }

    /// Records a finished lint report, keeping detail only when imperfect.
    pub fn record_style(&mut self, report: StyleReport) {
        let fraction = report.score_fraction();
        self.style_score_fraction = Some(fraction);
        self.style_exception = None;
        self.style_detail = (fraction < 1.0).then_some(report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(nodeid: &str, status: Status) -> TestCase {
        TestCase::builder().nodeid(nodeid).status(status).build()
    }

    #[test]
    fn sub_tests_are_weighted_within_their_parent() {
        let parent = TestCase::builder()
            .nodeid("test_calc.py::test_add")
            .status(Status::Fail)
            .sub_tests(vec![
                SubTest::builder().name("1-2").build(),
                SubTest::builder().name("2-3").status(Status::Fail).build(),
            ])
            .build();
        let report = TestReport {
            status:  Status::Fail,
            message: None,
            tests:   vec![parent, case("test_calc.py::test_sub", Status::Pass)],
        };

        assert_eq!(report.tests[0].pass_fraction(), 0.5);
        assert_eq!(report.pass_fraction(), 0.75);
    }

    #[test]
    fn empty_session_scores_by_status() {
        let mut report = TestReport::default();
        assert_eq!(report.pass_fraction(), 1.0);
        report.status = Status::Error;
        assert_eq!(report.pass_fraction(), 0.0);
    }

    #[test]
    fn failing_leaves_descend_into_variants() {
        let report = TestReport {
            status:  Status::Fail,
            message: None,
            tests:   vec![
                TestCase::builder()
                    .nodeid("test_calc.py::TestAdd::test_add")
                    .status(Status::Fail)
                    .sub_tests(vec![
                        SubTest::builder().name("ok").build(),
                        SubTest::builder()
                            .name("neg")
                            .status(Status::Fail)
                            .message("boom".to_string())
                            .build(),
                    ])
                    .build(),
                case("test_calc.py::test_div", Status::Error),
            ],
        };

        let leaves = report.failing_leaves();
        assert_eq!(
            leaves,
            vec![
                ("test_calc.py >> TestAdd >> test_add >> neg".to_string(), Some("boom")),
                ("test_calc.py >> test_div".to_string(), None),
            ]
        );
    }

    #[test]
    fn style_fraction_is_clamped() {
        let mut report = StyleReport::default();
        report.statistics.score = -3.5;
        assert_eq!(report.score_fraction(), 0.0);
        report.statistics.score = 8.333;
        assert_eq!(report.score_fraction(), 0.833);
    }
}
