//! Error types shared by the tracker and the `tail` plumbing around it.

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

use crate::key::LoggerKey;

/// Alias for `Result` with the crate's [`enum@Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A logger or setting was rejected before anything was registered.
    #[error("validation failed: {reason}")]
    Validation { reason: String },

    /// A logger with the same `(id, name)` pair is already tracked.
    #[error("logger with key ({key}) already exists")]
    DuplicateKey { key: LoggerKey },

    #[error("filepath not provided, pass it as the first argument or with --filepath")]
    MissingPath,

    #[error("('{}') is not a valid filepath", path.display())]
    InvalidPath { path: PathBuf },

    #[error("no usable `tail` command found on this system")]
    TailUnavailable { source: io::Error },

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: &'static str,
        source: io::Error,
    },

    #[error("tail exited unsuccessfully ({status}): {detail}")]
    TailFailed { status: ExitStatus, detail: String },

    #[error("invalid config file {}: {source}", path.display())]
    Config {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("cannot read {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
}

impl Error {
    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        Error::Validation {
            reason: reason.into(),
        }
    }
}
