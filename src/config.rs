#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Process-wide configuration read from the environment.
//!
//! Values are read once, on first use, and shared through a cheap
//! [`ConfigHandle`]. Per-assignment settings live in `assignment.toml`, see
//! [`crate::classroom::AssignmentSettings`].

use std::{
    sync::{Arc, Mutex, OnceLock},
    time::Duration,
};

use anyhow::Result;

use crate::constants::DEFAULT_BOT_MARKER;

/// Packages injected into the pytest run unless overridden.
const DEFAULT_PYTEST_PACKAGES: &[&str] = &["pytest", "pytest-json-report"];

/// Packages injected into the pylint run unless overridden.
const DEFAULT_PYLINT_PACKAGES: &[&str] = &["pylint"];

/// Runtime configuration shared across the crate.
#[derive(Debug)]
pub struct ConfigState {
    /// Upper bound for a single pytest run; `None` waits forever.
    test_timeout:    Option<Duration>,
    /// Upper bound for a single pylint run; `None` waits forever.
    lint_timeout:    Option<Duration>,
    /// Author-name marker that ends the commit scan.
    bot_marker:      String,
    /// Packages `uv` injects for pytest.
    pytest_packages: Vec<String>,
    /// Packages `uv` injects for pylint.
    pylint_packages: Vec<String>,
}

impl ConfigState {
    /// Builds a configuration from environment variables.
    fn new() -> Result<Self> {
        Ok(Self {
            test_timeout:    read_timeout_secs("AU_TEST_TIMEOUT_SECS"),
            lint_timeout:    read_timeout_secs("AU_LINT_TIMEOUT_SECS"),
            bot_marker:      std::env::var("AU_BOT_MARKER")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_BOT_MARKER.to_string()),
            pytest_packages: read_list("AU_PYTEST_PACKAGES", DEFAULT_PYTEST_PACKAGES),
            pylint_packages: read_list("AU_PYLINT_PACKAGES", DEFAULT_PYLINT_PACKAGES),
        })
    }

    /// Returns the pytest timeout, if any.
    pub fn test_timeout(&self) -> Option<Duration> {
        self.test_timeout
    }

    /// Returns the pylint timeout, if any.
    pub fn lint_timeout(&self) -> Option<Duration> {
        self.lint_timeout
    }

    /// Returns the bot author marker.
    pub fn bot_marker(&self) -> &str {
        &self.bot_marker
    }

    /// Returns the packages injected for pytest.
    pub fn pytest_packages(&self) -> &[String] {
        &self.pytest_packages
    }

    /// Returns the packages injected for pylint.
    pub fn pylint_packages(&self) -> &[String] {
        &self.pylint_packages
    }
}

/// Shared configuration handle used throughout the crate.
#[derive(Clone, Debug)]
pub struct ConfigHandle(Arc<ConfigState>);

impl std::ops::Deref for ConfigHandle {
    type Target = ConfigState;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Global storage for the lazily constructed configuration state.
static CONFIG_SLOT: OnceLock<Mutex<Option<Arc<ConfigState>>>> = OnceLock::new();

/// Returns the mutex guarding the global configuration slot.
fn slot() -> &'static Mutex<Option<Arc<ConfigState>>> {
    CONFIG_SLOT.get_or_init(|| Mutex::new(None))
}

/// Ensure the global configuration has been initialized and return a handle.
pub fn ensure_initialized() -> Result<ConfigHandle> {
    let mut guard = slot().lock().expect("config slot poisoned");
    if let Some(cfg) = guard.as_ref() {
        return Ok(ConfigHandle(Arc::clone(cfg)));
    }

    let cfg = Arc::new(ConfigState::new()?);
    *guard = Some(Arc::clone(&cfg));
    Ok(ConfigHandle(cfg))
}

/// Returns the active configuration, initializing it on demand.
pub fn get() -> ConfigHandle {
    ensure_initialized().expect("configuration initialization failed")
}

/// Returns the configured bot author marker.
pub fn bot_marker() -> String {
    get().bot_marker().to_string()
}

/// Parses an environment variable holding whole seconds. Unset, empty,
/// unparsable and zero values all mean "no timeout".
fn read_timeout_secs(env: &str) -> Option<Duration> {
    std::env::var(env)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

/// Parses a comma-separated environment variable, falling back to `default`.
fn read_list(env: &str, default: &[&str]) -> Vec<String> {
    let parsed: Vec<String> = std::env::var(env)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if parsed.is_empty() {
        default.iter().map(|s| s.to_string()).collect()
    } else {
        parsed
    }
}
