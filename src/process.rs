#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Child process plumbing shared by the git adapter and the tool runners.
//!
//! Every external tool runs in its own freshly spawned process, so nothing a
//! student's code does to interpreter state survives into the next
//! submission.

use std::{
    ffi::{OsStr, OsString},
    path::Path,
    process::Stdio,
    time::Duration,
};

use anyhow::{Context, Result};
use itertools::Itertools;
use tokio::{
    io::{AsyncReadExt, BufReader},
    process::{Child, Command},
    time::timeout,
};

/// Kills the wrapped child if it is dropped before being awaited.
struct ChildDropGuard(Option<Child>);

impl ChildDropGuard {
    /// Wraps the provided child process.
    fn new(child: Child) -> Self {
        Self(Some(child))
    }

    /// Returns a mutable reference to the underlying child process.
    fn child_mut(&mut self) -> Result<&mut Child> {
        self.0
            .as_mut()
            .context("child process already taken from guard")
    }

    /// Prevents the guard from killing the process on drop.
    fn disarm(mut self) {
        self.0 = None;
    }
}

impl Drop for ChildDropGuard {
    fn drop(&mut self) {
        if let Some(child) = self.0.as_mut() {
            let _ = child.start_kill();
        }
    }
}

/// Captured result of a finished subprocess.
#[derive(Debug)]
pub struct Collected {
    /// Exit status returned by the process.
    pub status: std::process::ExitStatus,
    /// Contents written to stdout.
    pub stdout: Vec<u8>,
    /// Contents written to stderr.
    pub stderr: Vec<u8>,
}

impl Collected {
    /// Returns true if the process exited with status zero.
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Stdout decoded lossily as UTF-8.
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Stderr decoded lossily as UTF-8, trimmed.
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

/// Describes how stdin should be wired for the spawned process.
#[derive(Clone, Copy, Debug)]
pub enum StdinSource {
    /// Inherit the parent's stdin.
    Inherit,
    /// Attach nothing to stdin.
    Null,
}

/// Spawns `program` with `args` in `cwd`, feeds stdin and collects
/// stdout/stderr. A `deadline` of `None` waits forever.
pub async fn run_collect(
    program: impl AsRef<OsStr>,
    args: &[OsString],
    stdin: StdinSource,
    cwd: Option<&Path>,
    deadline: Option<Duration>,
) -> Result<Collected> {
    run_collect_with_env(program, args, &[], stdin, cwd, deadline).await
}

/// Like [`run_collect`], with `env` set on top of the inherited environment.
pub async fn run_collect_with_env(
    program: impl AsRef<OsStr>,
    args: &[OsString],
    env: &[(OsString, OsString)],
    stdin: StdinSource,
    cwd: Option<&Path>,
    deadline: Option<Duration>,
) -> Result<Collected> {
    let program = program.as_ref();
    tracing::debug!(
        "running `{} {}` in {}",
        program.to_string_lossy(),
        args.iter().map(|a| a.to_string_lossy()).join(" "),
        cwd.map(|d| d.display().to_string())
            .unwrap_or_else(|| ".".to_string())
    );

    let mut cmd = Command::new(program);
    cmd.args(args)
        .envs(env.iter().map(|(k, v)| (k, v)))
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    match stdin {
        StdinSource::Inherit => {
            cmd.stdin(Stdio::inherit());
        }
        StdinSource::Null => {
            cmd.stdin(Stdio::null());
        }
    }

    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let mut guard = ChildDropGuard::new(
        cmd.spawn()
            .with_context(|| format!("failed to spawn {}", program.to_string_lossy()))?,
    );

    let stdout = guard
        .child_mut()?
        .stdout
        .take()
        .context("missing stdout pipe")?;
    let stderr = guard
        .child_mut()?
        .stderr
        .take()
        .context("missing stderr pipe")?;

    let out_task = tokio::spawn(read_all(stdout));
    let err_task = tokio::spawn(read_all(stderr));

    let wait_future = async move {
        let mut guard = guard;
        let status = guard
            .child_mut()?
            .wait()
            .await
            .context("failed to wait on process")?;
        let stdout = out_task.await.context("stdout task join error")??;
        let stderr = err_task.await.context("stderr task join error")??;
        guard.disarm();
        Ok(Collected {
            status,
            stdout,
            stderr,
        })
    };

    match deadline {
        Some(limit) => timeout(limit, wait_future)
            .await
            .with_context(|| format!("{} timed out", program.to_string_lossy()))?,
        None => wait_future.await,
    }
}

/// Drains a pipe to the end.
async fn read_all(pipe: impl tokio::io::AsyncRead + Unpin) -> Result<Vec<u8>> {
    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::new();
    reader
        .read_to_end(&mut buf)
        .await
        .context("failed to read child output")?;
    Ok(buf)
}
