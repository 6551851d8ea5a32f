#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! External Python tooling: the test runner and the linter.

/// pylint invocation and report parsing
pub mod pylint;
/// pytest invocation and report translation
pub mod pytest;
/// Interpreter discovery and command construction
pub mod util;

pub use pylint::{LintRunner, PylintRunner};
pub use pytest::{PytestRunner, TestRunner};
