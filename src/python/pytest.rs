#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Runs pytest against a submission and turns its JSON report into a
//! [`TestReport`].
//!
//! pytest runs with the `pytest-json-report` plugin injected. The plugin's
//! report is read back from a temporary file outside the submission so a
//! student cannot shadow it.
//!
//! Test suites tag tests with `@pytest.mark.task(taskno=N)`. A small plugin
//! written next to the report copies that number into the test's JSON
//! metadata, where suites may also set it directly through the
//! `json_metadata` fixture.

use std::{
    collections::HashMap,
    env,
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use super::util::python_module_with_deps_command;
use crate::{
    config,
    error::{GradeError, GradeResult},
    grade::results::{Status, SubTest, TestCase, TestReport},
    process::{StdinSource, run_collect_with_env},
};

/// Name used for pytest in logs and errors.
const TOOL: &str = "pytest";

/// Module name of the task marker plugin.
const TASK_PLUGIN: &str = "au_task_marks";

/// Registers the `task` marker and reports its number as `metadata.task`.
const TASK_PLUGIN_SOURCE: &str = r#"import pytest


def pytest_configure(config):
    config.addinivalue_line("markers", "task(taskno): exercise task number")


@pytest.hookimpl(optionalhook=True)
def pytest_json_runtest_metadata(item, call):
    mark = item.get_closest_marker("task")
    if mark is None:
        return {}
    taskno = mark.kwargs.get("taskno", mark.args[0] if mark.args else None)
    return {} if taskno is None else {"task": taskno}
"#;

/// Writes the task marker plugin into `dir` and returns the environment
/// under which pytest can import it.
fn install_task_plugin(dir: &Path) -> GradeResult<Vec<(OsString, OsString)>> {
    let path = dir.join(format!("{TASK_PLUGIN}.py"));
    fs::write(&path, TASK_PLUGIN_SOURCE).map_err(|e| GradeError::io(&path, e))?;

    let inherited = env::var_os("PYTHONPATH");
    let paths: Vec<PathBuf> = std::iter::once(dir.to_path_buf())
        .chain(inherited.iter().flat_map(env::split_paths))
        .collect();
    let joined =
        env::join_paths(paths).map_err(|e| GradeError::tool(TOOL, format!("bad PYTHONPATH: {e}")))?;
    Ok(vec![("PYTHONPATH".into(), joined)])
}

/// Parent message when at least one parameterized variant did not pass.
pub const VARIANT_FAILURE_MESSAGE: &str =
    "One or more variations of this test failed. Details can be found under each variant.";

/// Produces a structured test report for a submission directory.
#[allow(async_fn_in_trait)]
pub trait TestRunner {
    /// Runs the submission's tests with `dir` as the working directory.
    async fn run(&self, dir: &Path) -> GradeResult<TestReport>;
}

/// [`TestRunner`] backed by a fresh pytest process per submission.
#[derive(Clone, Debug, Default)]
pub struct PytestRunner;

impl TestRunner for PytestRunner {
    async fn run(&self, dir: &Path) -> GradeResult<TestReport> {
        let scratch =
            tempfile::tempdir().map_err(|e| GradeError::tool(TOOL, format!("no temp dir: {e}")))?;
        let report_path = scratch.path().join("report.json");
        let env = install_task_plugin(scratch.path())?;

        let mut report_arg = OsString::from("--json-report-file=");
        report_arg.push(report_path.as_os_str());
        let extra: Vec<OsString> = vec![
            "--tb=no".into(),
            "-q".into(),
            "-p".into(),
            "no:cacheprovider".into(),
            "-p".into(),
            TASK_PLUGIN.into(),
            "--json-report".into(),
            report_arg,
        ];

        let cfg = config::get();
        let (program, args) =
            python_module_with_deps_command("pytest", cfg.pytest_packages(), &extra)
                .map_err(|e| GradeError::tool(TOOL, e.to_string()))?;

        let output = run_collect_with_env(
            &program,
            &args,
            &env,
            StdinSource::Null,
            Some(dir),
            cfg.test_timeout(),
        )
        .await
            .map_err(|e| GradeError::tool(TOOL, format!("{e:#}")))?;

        // A nonzero exit only means some tests failed; the report decides.
        let raw = std::fs::read_to_string(&report_path).map_err(|_| {
            let stderr = output.stderr_lossy();
            let detail = if stderr.is_empty() {
                output.stdout_lossy().trim().to_string()
            } else {
                stderr
            };
            GradeError::tool(TOOL, format!("no JSON report was written: {detail}"))
        })?;

        translate_report(&raw)
    }
}

/// Top level of a `pytest-json-report` document.
#[derive(Deserialize, Debug)]
struct JsonReport {
    /// pytest's exit code.
    exitcode:   i64,
    /// Collection results, one per collector node.
    #[serde(default)]
    collectors: Vec<JsonCollector>,
    /// One entry per executed test item, in run order.
    #[serde(default)]
    tests:      Vec<JsonTest>,
}

/// A collector node (module, class, package).
#[derive(Deserialize, Debug)]
struct JsonCollector {
    /// `passed` or `failed`.
    outcome:  String,
    /// Collection error text, when collection failed.
    #[serde(default)]
    longrepr: Option<String>,
}

/// One test item.
#[derive(Deserialize, Debug)]
struct JsonTest {
    /// Full node id, including any `[variant]` suffix.
    nodeid:   String,
    /// passed, failed, error, skipped, xfailed or xpassed.
    outcome:  String,
    /// Setup phase.
    #[serde(default)]
    setup:    Option<JsonPhase>,
    /// Call phase; absent when setup failed.
    #[serde(default)]
    call:     Option<JsonPhase>,
    /// Teardown phase.
    #[serde(default)]
    teardown: Option<JsonPhase>,
    /// Per-test metadata attached by the test suite.
    #[serde(default)]
    metadata: Option<serde_json::Value>,
}

impl JsonTest {
    /// Phases in execution order.
    fn phases(&self) -> impl Iterator<Item = &JsonPhase> {
        [&self.setup, &self.call, &self.teardown].into_iter().flatten()
    }

    /// Total wall time across phases.
    fn duration(&self) -> f64 {
        self.phases().map(|p| p.duration).sum()
    }

    /// Task number from `metadata.task`, as a number or numeric string.
    fn task_id(&self) -> Option<u32> {
        let task = self.metadata.as_ref()?.get("task")?;
        match task {
            serde_json::Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Message of the first phase that did not pass.
    fn message(&self) -> Option<String> {
        self.phases()
            .find(|p| p.outcome != "passed")
            .and_then(JsonPhase::message)
    }
}

/// One of setup, call or teardown.
#[derive(Deserialize, Debug)]
struct JsonPhase {
    /// Seconds spent in this phase.
    #[serde(default)]
    duration: f64,
    /// Outcome of this phase.
    #[serde(default)]
    outcome:  String,
    /// Location and message of the exception, if one was raised.
    #[serde(default)]
    crash:    Option<JsonCrash>,
    /// Full failure representation.
    #[serde(default)]
    longrepr: Option<String>,
}

impl JsonPhase {
    /// Builds the human message for a failed phase.
    fn message(&self) -> Option<String> {
        match (&self.crash, &self.longrepr) {
            (Some(crash), _) => Some(crash.describe()),
            (None, Some(longrepr)) => Some(last_entry(longrepr)),
            (None, None) => None,
        }
    }
}

/// Where an exception surfaced.
#[derive(Deserialize, Debug)]
struct JsonCrash {
    /// File the exception was raised in.
    #[serde(default)]
    path:    String,
    /// Line number in `path`.
    #[serde(default)]
    lineno:  i64,
    /// Exception text.
    #[serde(default)]
    message: String,
}

impl JsonCrash {
    /// Prefixes the exception text with its location. Code run from a string
    /// only gets a line number; failures raised inside unittest itself get no
    /// location at all.
    fn describe(&self) -> String {
        let prefix = if self.path.contains("<string>") {
            format!("Error at line {}:\n", self.lineno)
        } else if !self.path.contains("unittest/case.py") {
            format!("Error in {} at line {}:\n", self.path, self.lineno)
        } else {
            String::new()
        };
        format!("{prefix}{}", self.message)
    }
}

/// Last traceback entry of a long failure representation.
fn last_entry(longrepr: &str) -> String {
    longrepr
        .trim_end()
        .rsplit("\n\n")
        .next()
        .unwrap_or(longrepr)
        .to_string()
}

/// Splits `file.py::test_add[2-3]` into `("file.py::test_add", Some("2-3"))`.
fn split_variant(nodeid: &str) -> (&str, Option<&str>) {
    let search_from = nodeid.find("::").unwrap_or(0);
    match nodeid[search_from..].find('[') {
        Some(offset) if nodeid.ends_with(']') => {
            let open = search_from + offset;
            (&nodeid[..open], Some(&nodeid[open + 1..nodeid.len() - 1]))
        }
        _ => (nodeid, None),
    }
}

/// Maps a pytest outcome onto a [`Status`].
fn outcome_status(outcome: &str) -> Status {
    match outcome {
        "passed" | "skipped" | "xfailed" | "xpassed" => Status::Pass,
        "failed" => Status::Fail,
        _ => Status::Error,
    }
}

/// Translates a `pytest-json-report` document into a [`TestReport`].
///
/// Parameterized variants are grouped under their base node id. A variant
/// without its own task number inherits the group's, which is the first one
/// found among the variants.
pub fn translate_report(raw: &str) -> GradeResult<TestReport> {
    let report: JsonReport = serde_json::from_str(raw)
        .map_err(|e| GradeError::tool(TOOL, format!("unreadable JSON report: {e}")))?;

    let mut tests: Vec<TestCase> = Vec::new();
    let mut by_base: HashMap<String, usize> = HashMap::new();

    for item in &report.tests {
        let status = outcome_status(&item.outcome);
        let message = (!status.is_pass()).then(|| item.message()).flatten();
        let (base, variant) = split_variant(&item.nodeid);

        let Some(variant) = variant else {
            tests.push(
                TestCase::builder()
                    .nodeid(base)
                    .status(status)
                    .maybe_message(message)
                    .maybe_task_id(item.task_id())
                    .duration(item.duration())
                    .build(),
            );
            continue;
        };

        let index = *by_base.entry(base.to_string()).or_insert_with(|| {
            tests.push(TestCase::builder().nodeid(base).build());
            tests.len() - 1
        });
        let parent = &mut tests[index];
        parent.duration += item.duration();
        parent.sub_tests.push(
            SubTest::builder()
                .name(variant)
                .status(status)
                .maybe_message(message)
                .maybe_task_id(item.task_id())
                .build(),
        );
    }

    for parent in tests.iter_mut().filter(|t| !t.sub_tests.is_empty()) {
        parent.task_id = parent.sub_tests.iter().find_map(|s| s.task_id);
        for sub in parent.sub_tests.iter_mut() {
            sub.task_id = sub.task_id.or(parent.task_id);
        }
        if parent.sub_tests.iter().any(|s| !s.status.is_pass()) {
            parent.status = Status::Fail;
            parent.message = Some(VARIANT_FAILURE_MESSAGE.to_string());
        }
    }

    let (status, message) = match report.exitcode {
        0 => (Status::Pass, None),
        1 => (Status::Fail, None),
        code => {
            let collector_error = report
                .collectors
                .iter()
                .rev()
                .filter(|c| c.outcome != "passed")
                .find_map(|c| c.longrepr.clone())
                .filter(|m| !m.trim().is_empty());
            let message = collector_error.unwrap_or_else(|| {
                format!("Unexpected exit code {code}: check logs for details")
            });
            (Status::Error, Some(message))
        }
    };

    tracing::debug!("pytest reported {} tests with session status {status}", tests.len());
    Ok(TestReport {
        status,
        message,
        tests,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIXED: &str = r#"{
        "exitcode": 1,
        "collectors": [{"nodeid": "", "outcome": "passed", "result": []}],
        "tests": [
            {
                "nodeid": "test_calc.py::test_add[1-2]",
                "outcome": "passed",
                "setup": {"duration": 0.1, "outcome": "passed"},
                "call": {"duration": 0.2, "outcome": "passed"},
                "teardown": {"duration": 0.0, "outcome": "passed"},
                "metadata": {"task": 2}
            },
            {
                "nodeid": "test_calc.py::test_add[2-2]",
                "outcome": "failed",
                "setup": {"duration": 0.1, "outcome": "passed"},
                "call": {
                    "duration": 0.2,
                    "outcome": "failed",
                    "crash": {"path": "/home/s/test_calc.py", "lineno": 9, "message": "assert 5 == 4"},
                    "longrepr": "long text"
                },
                "teardown": {"duration": 0.0, "outcome": "passed"}
            },
            {
                "nodeid": "test_calc.py::TestDiv::test_zero",
                "outcome": "error",
                "setup": {
                    "duration": 0.0,
                    "outcome": "failed",
                    "crash": {"path": "<string>", "lineno": 3, "message": "NameError: x"}
                },
                "metadata": {"task": "3"}
            },
            {
                "nodeid": "test_calc.py::test_unittest",
                "outcome": "failed",
                "call": {
                    "outcome": "failed",
                    "crash": {
                        "path": "/usr/lib/python3.12/unittest/case.py",
                        "lineno": 700,
                        "message": "AssertionError: 1 != 2"
                    }
                }
            },
            {
                "nodeid": "test_calc.py::test_skip",
                "outcome": "skipped",
                "setup": {"outcome": "skipped", "longrepr": "skipped"}
            }
        ]
    }"#;

    #[test]
    fn variants_are_grouped_under_their_parent() {
        let report = translate_report(MIXED).unwrap();
        assert_eq!(report.status, Status::Fail);
        assert_eq!(report.message, None);
        assert_eq!(report.tests.len(), 4);

        let parent = &report.tests[0];
        assert_eq!(parent.nodeid, "test_calc.py::test_add");
        assert_eq!(parent.status, Status::Fail);
        assert_eq!(parent.message.as_deref(), Some(VARIANT_FAILURE_MESSAGE));
        assert_eq!(parent.task_id, Some(2));
        assert_eq!(parent.sub_tests.len(), 2);
        assert_eq!(parent.sub_tests[1].name, "2-2");
        assert_eq!(parent.sub_tests[1].task_id, Some(2));
        assert_eq!(
            parent.sub_tests[1].message.as_deref(),
            Some("Error in /home/s/test_calc.py at line 9:\nassert 5 == 4")
        );
        assert_eq!(parent.pass_fraction(), 0.5);
    }

    #[test]
    fn messages_follow_crash_location_rules() {
        let report = translate_report(MIXED).unwrap();

        let setup_error = &report.tests[1];
        assert_eq!(setup_error.status, Status::Error);
        assert_eq!(setup_error.task_id, Some(3));
        assert_eq!(setup_error.message.as_deref(), Some("Error at line 3:\nNameError: x"));

        let unittest = &report.tests[2];
        assert_eq!(unittest.message.as_deref(), Some("AssertionError: 1 != 2"));

        let skipped = &report.tests[3];
        assert_eq!(skipped.status, Status::Pass);
        assert_eq!(skipped.message, None);
    }

    #[test]
    fn collection_errors_become_session_errors() {
        let raw = r#"{
            "exitcode": 2,
            "collectors": [
                {"nodeid": "", "outcome": "passed"},
                {"nodeid": "test_calc.py", "outcome": "failed", "longrepr": "ImportError: no module calc"}
            ],
            "tests": []
        }"#;
        let report = translate_report(raw).unwrap();
        assert_eq!(report.status, Status::Error);
        assert_eq!(report.message.as_deref(), Some("ImportError: no module calc"));
        assert_eq!(report.pass_fraction(), 0.0);
    }

    #[test]
    fn unknown_exit_codes_get_a_generic_message() {
        let report = translate_report(r#"{"exitcode": 5, "tests": []}"#).unwrap();
        assert_eq!(
            report.message.as_deref(),
            Some("Unexpected exit code 5: check logs for details")
        );
    }

    #[test]
    fn garbage_is_a_tool_failure() {
        let err = translate_report("not json").unwrap_err();
        assert!(matches!(err, GradeError::ToolInvocation { tool: "pytest", .. }));
    }

    #[test]
    fn task_plugin_comes_first_on_the_python_path() {
        let dir = tempfile::tempdir().unwrap();
        let env = install_task_plugin(dir.path()).unwrap();

        let source = fs::read_to_string(dir.path().join("au_task_marks.py")).unwrap();
        assert!(source.contains("pytest_json_runtest_metadata"));
        assert!(source.contains("taskno"));

        let (key, value) = &env[0];
        assert_eq!(key, "PYTHONPATH");
        assert_eq!(env::split_paths(value).next().as_deref(), Some(dir.path()));
    }

    #[test]
    fn task_markers_reach_the_report() {
        let has_plugins = std::process::Command::new("python3")
            .args(["-c", "import pytest, pytest_jsonreport"])
            .output()
            .is_ok_and(|o| o.status.success());
        if !has_plugins {
            return;
        }

        let suite = tempfile::tempdir().unwrap();
        fs::write(
            suite.path().join("test_hw.py"),
            "import pytest\n\n\
             @pytest.mark.task(taskno=4)\n\
             @pytest.mark.parametrize('n', [1, 2])\n\
             def test_even(n):\n    assert n % 2 == 0\n\n\
             def test_untagged():\n    pass\n",
        )
        .unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let env = install_task_plugin(scratch.path()).unwrap();
        let report_path = scratch.path().join("report.json");

        std::process::Command::new("python3")
            .args(["-m", "pytest", "-q", "-p", "no:cacheprovider", "-p", TASK_PLUGIN])
            .arg("--json-report")
            .arg(format!("--json-report-file={}", report_path.display()))
            .envs(env)
            .current_dir(suite.path())
            .output()
            .unwrap();

        let report = translate_report(&fs::read_to_string(&report_path).unwrap()).unwrap();
        let even = report
            .tests
            .iter()
            .find(|t| t.nodeid == "test_hw.py::test_even")
            .unwrap();
        assert_eq!(even.task_id, Some(4));
        assert!(even.sub_tests.iter().all(|s| s.task_id == Some(4)));
        let untagged = report
            .tests
            .iter()
            .find(|t| t.nodeid == "test_hw.py::test_untagged")
            .unwrap();
        assert_eq!(untagged.task_id, None);
    }

    #[test]
    fn variant_suffix_only_splits_on_trailing_brackets() {
        assert_eq!(split_variant("t.py::test_a[x-y]"), ("t.py::test_a", Some("x-y")));
        assert_eq!(split_variant("t.py::test_a"), ("t.py::test_a", None));
        assert_eq!(split_variant("t.py::test_a[x]y"), ("t.py::test_a[x]y", None));
    }
}
