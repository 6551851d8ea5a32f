#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Runs pylint over a submission's non-test sources.

use std::{ffi::OsString, path::Path};

use super::util::{discover_lint_files, python_module_with_deps_command};
use crate::{
    config,
    constants::LINT_DISABLED,
    error::{GradeError, GradeResult},
    grade::results::StyleReport,
    process::{StdinSource, run_collect},
};

/// Name used for pylint in logs and errors.
const TOOL: &str = "pylint";

/// Produces a style report for a submission directory.
#[allow(async_fn_in_trait)]
pub trait LintRunner {
    /// Lints the submission in `dir`. `Ok(None)` means there was nothing to
    /// lint.
    async fn run(&self, dir: &Path) -> GradeResult<Option<StyleReport>>;
}

/// [`LintRunner`] backed by a fresh pylint process per submission.
#[derive(Clone, Debug, Default)]
pub struct PylintRunner;

impl LintRunner for PylintRunner {
    async fn run(&self, dir: &Path) -> GradeResult<Option<StyleReport>> {
        let files = discover_lint_files(dir).map_err(|e| GradeError::tool(TOOL, format!("{e:#}")))?;
        if files.is_empty() {
            tracing::error!("No Python files to lint in {}", dir.display());
            return Ok(None);
        }

        let mut extra: Vec<OsString> = vec![
            "--output-format=json2".into(),
            "--exit-zero".into(),
            format!("--disable={}", LINT_DISABLED.join(",")).into(),
        ];
        extra.extend(files.into_iter().map(OsString::from));

        let cfg = config::get();
        let (program, args) =
            python_module_with_deps_command("pylint", cfg.pylint_packages(), &extra)
                .map_err(|e| GradeError::tool(TOOL, e.to_string()))?;

        let output = run_collect(&program, &args, StdinSource::Null, Some(dir), cfg.lint_timeout())
            .await
            .map_err(|e| GradeError::tool(TOOL, format!("{e:#}")))?;

        parse_report(&output.stdout_lossy())
            .map_err(|e| match output.stderr_lossy() {
                stderr if stderr.is_empty() => e,
                stderr => GradeError::tool(TOOL, format!("{e}; stderr: {stderr}")),
            })
            .map(Some)
    }
}

/// Parses pylint's `json2` output.
pub fn parse_report(raw: &str) -> GradeResult<StyleReport> {
    serde_json::from_str(raw.trim())
        .map_err(|e| GradeError::tool(TOOL, format!("unreadable JSON output: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json2_output() {
        let raw = r#"{
            "messages": [
                {
                    "type": "warning",
                    "symbol": "unused-import",
                    "message": "Unused import os",
                    "messageId": "W0611",
                    "confidence": "UNDEFINED",
                    "module": "main",
                    "obj": "",
                    "line": 1,
                    "column": 0,
                    "endLine": 1,
                    "endColumn": 9,
                    "path": "main.py",
                    "absolutePath": "/tmp/s/main.py"
                }
            ],
            "statistics": {
                "messageTypeCount": {"fatal": 0, "error": 0, "warning": 1, "refactor": 0, "convention": 0, "info": 0},
                "modulesLinted": 1,
                "score": 9.0
            }
        }"#;

        let report = parse_report(raw).unwrap();
        assert_eq!(report.messages.len(), 1);
        let msg = &report.messages[0];
        assert_eq!(msg.kind, "warning");
        assert_eq!(msg.message_id, "W0611");
        assert_eq!(msg.line, Some(1));
        assert_eq!(report.statistics.modules_linted, 1);
        assert_eq!(report.statistics.message_type_count["warning"], 1);
        assert_eq!(report.score_fraction(), 0.9);
    }

    #[test]
    fn empty_output_is_a_tool_failure() {
        let err = parse_report("").unwrap_err();
        assert!(matches!(err, GradeError::ToolInvocation { tool: "pylint", .. }));
    }
}
