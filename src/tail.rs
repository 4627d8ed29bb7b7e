//! Running the external `tail` program that feeds the tracker.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::key::Logger;

pub const TAIL_PROGRAM: &str = "tail";

/// Ids under which a followed file's output streams are tracked.
pub const STDOUT_ID: &str = "stdout";
pub const STDERR_ID: &str = "stderr";

/// Checks that `path` exists and returns it.
pub fn validate_path(path: &Path) -> Result<PathBuf> {
    match std::fs::metadata(path) {
        Ok(_) => Ok(path.to_path_buf()),
        Err(_) => Err(Error::InvalidPath {
            path: path.to_path_buf(),
        }),
    }
}

/// Checks that a `tail` executable can be launched.
pub async fn ensure_available() -> Result<()> {
    let status = Command::new(TAIL_PROGRAM)
        .args(["-n", "0"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    match status {
        Ok(_) => {
            debug!("valid tail command found on current system");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::TailUnavailable { source: e }),
        Err(e) => Err(Error::Spawn {
            program: TAIL_PROGRAM,
            source: e,
        }),
    }
}

/// An invocation of `tail`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TailCommand {
    follow: bool,
    number: u64,
    paths: Vec<PathBuf>,
}

impl TailCommand {
    /// Prints the last `number` lines. With no paths, tail reads stdin.
    pub fn new(number: u64) -> Self {
        TailCommand {
            follow: false,
            number,
            paths: Vec::new(),
        }
    }

    pub fn follow(mut self, follow: bool) -> Self {
        self.follow = follow;
        self
    }

    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.push(path.into());
        self
    }

    pub fn paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.paths.extend(paths.into_iter().map(Into::into));
        self
    }

    /// The argument list passed to `tail`.
    pub fn args(&self) -> Vec<OsString> {
        let mut args = Vec::with_capacity(self.paths.len() + 3);
        if self.follow {
            args.push("-f".into());
        }
        args.push("-n".into());
        args.push(self.number.to_string().into());
        args.extend(self.paths.iter().map(|path| path.as_os_str().to_owned()));
        args
    }

    fn command(&self) -> Command {
        let mut command = Command::new(TAIL_PROGRAM);
        command.args(self.args());
        command
    }

    /// Runs to completion and returns the captured output.
    ///
    /// Without paths, tail reads this process's stdin.
    pub async fn output(&self) -> Result<Output> {
        let mut command = self.command();
        if self.paths.is_empty() {
            command.stdin(Stdio::inherit());
        }

        let output = command.output().await.map_err(|e| Error::Spawn {
            program: TAIL_PROGRAM,
            source: e,
        })?;

        if !output.status.success() {
            let mut detail = String::from_utf8_lossy(&output.stderr).into_owned();
            detail.push_str(&String::from_utf8_lossy(&output.stdout));
            return Err(Error::TailFailed {
                status: output.status,
                detail: detail.trim_end().to_string(),
            });
        }

        Ok(output)
    }

    /// Spawns with stdout and stderr piped so both can be tracked.
    ///
    /// The child is killed if the returned process is dropped.
    pub fn spawn(&self) -> Result<TailProcess> {
        let child = self
            .command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Spawn {
                program: TAIL_PROGRAM,
                source: e,
            })?;

        let name = self
            .paths
            .iter()
            .map(|path| path.display().to_string())
            .collect::<Vec<_>>()
            .join(",");

        info!(source = %name, pid = ?child.id(), "spawned tail");

        Ok(TailProcess { name, child })
    }
}

/// A running `tail` spawned by [`TailCommand::spawn`].
#[derive(Debug)]
pub struct TailProcess {
    name: String,
    child: Child,
}

impl TailProcess {
    /// The name its loggers are registered under: the followed path(s).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hands out the child's stdout and stderr as loggers keyed
    /// `(name, "stdout")` and `(name, "stderr")`. Returns an empty list when
    /// they were already taken.
    pub fn take_loggers(&mut self) -> Vec<Logger> {
        let mut loggers = Vec::with_capacity(2);
        if let Some(stdout) = self.child.stdout.take() {
            loggers.push(Logger::new(stdout, self.name.clone(), STDOUT_ID));
        }
        if let Some(stderr) = self.child.stderr.take() {
            loggers.push(Logger::new(stderr, self.name.clone(), STDERR_ID));
        }
        loggers
    }

    /// Waits for tail to exit, failing if it exited unsuccessfully.
    pub async fn wait(&mut self) -> Result<()> {
        let status = self.child.wait().await.map_err(|e| Error::Spawn {
            program: TAIL_PROGRAM,
            source: e,
        })?;

        if !status.success() {
            return Err(Error::TailFailed {
                status,
                detail: format!("while following {}", self.name),
            });
        }

        debug!(source = %self.name, "tail exited");
        Ok(())
    }

    /// Kills tail and reaps it.
    pub async fn kill(&mut self) -> Result<()> {
        self.child.kill().await.map_err(|e| Error::Spawn {
            program: TAIL_PROGRAM,
            source: e,
        })
    }
}
