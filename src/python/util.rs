#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Python toolchain discovery and command construction.
//!
//! `uv` is preferred because it injects the grading tools for the duration of
//! one run (`uv run --with pytest -- python -m pytest`) without touching the
//! student's environment. Without `uv` we fall back to the interpreter on
//! `PATH` and assume the tools are installed there.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use walkdir::{DirEntry, WalkDir};
use which::which;

/// Finds `uv` on `PATH` or in its usual install locations.
pub fn uv_path() -> Result<PathBuf> {
    if let Ok(path) = which("uv") {
        return Ok(path);
    }

    let mut common_paths: Vec<PathBuf> = vec![
        PathBuf::from("/usr/local/bin/uv"),
        PathBuf::from("/opt/homebrew/bin/uv"),
    ];
    if let Ok(home) = std::env::var("HOME") {
        common_paths.push(PathBuf::from(&home).join(".cargo/bin/uv"));
        common_paths.push(PathBuf::from(home).join(".local/bin/uv"));
    }

    common_paths
        .into_iter()
        .find(|p| p.exists())
        .context("Could not find uv. Install it with: curl -LsSf https://astral.sh/uv/install.sh | sh")
}

/// Finds a Python interpreter on `PATH`.
pub fn python_path() -> Result<PathBuf> {
    which("python3")
        .or_else(|_| which("python"))
        .map_err(|_| anyhow!("Could not find a Python interpreter. Please install uv or python3."))
}

/// Returns the program and arguments running `python -m <module>` with
/// `with_deps` injected for this run only.
///
/// * `module` - the module to run, e.g. `pytest`
/// * `with_deps` - packages to inject, e.g. `["pytest"]`
/// * `extra_args` - arguments passed to the module
pub fn python_module_with_deps_command<S: AsRef<str>>(
    module: &str,
    with_deps: &[S],
    extra_args: &[OsString],
) -> Result<(OsString, Vec<OsString>)> {
    if let Ok(uv) = uv_path() {
        let mut args: Vec<OsString> = vec!["run".into()];
        for dep in with_deps {
            args.push("--with".into());
            args.push(dep.as_ref().into());
        }
        args.extend(["--".into(), "python".into(), "-m".into(), module.into()]);
        args.extend(extra_args.iter().cloned());
        Ok((uv.into_os_string(), args))
    } else {
        let python = python_path()?;
        let mut args: Vec<OsString> = vec!["-m".into(), module.into()];
        args.extend(extra_args.iter().cloned());
        Ok((python.into_os_string(), args))
    }
}

/// True for directories the linter never descends into: hidden ones and
/// `test`/`tests`.
fn is_skipped_dir(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    entry.depth() > 0
        && entry.file_type().is_dir()
        && (name.starts_with('.') || name == "test" || name == "tests")
}

/// True for Python sources that are neither hidden nor test modules.
pub fn is_lintable_file(name: &str) -> bool {
    name.ends_with(".py")
        && !name.starts_with('.')
        && !name.starts_with("test_")
        && !name.ends_with("_test.py")
}

/// Collects the non-test Python sources under `root`, relative to `root` and
/// sorted.
pub fn discover_lint_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e))
    {
        let entry = entry.with_context(|| format!("Could not walk {}", root.display()))?;
        if entry.file_type().is_file() && is_lintable_file(&entry.file_name().to_string_lossy()) {
            let rel = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .to_path_buf();
            files.push(rel);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modules_are_not_linted() {
        assert!(is_lintable_file("main.py"));
        assert!(is_lintable_file("helpers_testing.py"));
        assert!(!is_lintable_file("test_main.py"));
        assert!(!is_lintable_file("main_test.py"));
        assert!(!is_lintable_file(".hidden.py"));
        assert!(!is_lintable_file("notes.txt"));
    }

    #[test]
    fn discovery_skips_test_and_hidden_dirs() {
        let root = tempfile::tempdir().expect("temp dir");
        let base = root.path();
        for dir in ["pkg", "tests", "test", ".venv/lib"] {
            std::fs::create_dir_all(base.join(dir)).unwrap();
        }
        for file in [
            "main.py",
            "test_main.py",
            "pkg/util.py",
            "pkg/util_test.py",
            "tests/helpers.py",
            "test/conftest.py",
            ".venv/lib/site.py",
        ] {
            std::fs::write(base.join(file), "x = 1\n").unwrap();
        }

        let found = discover_lint_files(base).unwrap();
        assert_eq!(found, vec![PathBuf::from("main.py"), PathBuf::from("pkg/util.py")]);
    }
}
