//! File configuration and the resolved settings of one invocation.
//!
//! Settings come from, in order of precedence: the command line, environment
//! variables, the TOML config file, and the defaults below. The binary merges
//! the first two with a [`FileConfig`] into a single [`RunConfig`] that is
//! threaded through the rest of the program.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use crate::error::{Error, Result};
use crate::sink::LineFormat;
use crate::tail;
use crate::tracker::TrackerConfig;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = ".log-tracker.toml";
/// Trailing lines printed when no count is configured.
pub const DEFAULT_LINE_COUNT: u64 = 10;
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1;

/// Contents of the TOML config file. Every key is optional.
///
/// ```toml
/// filepath = "/var/log/syslog"
/// number = 20
/// follow = true
/// prefix = false
/// channel_capacity = 16
/// ```
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub filepath: Option<PathBuf>,
    pub number: Option<u64>,
    pub follow: Option<bool>,
    pub prefix: Option<bool>,
    pub channel_capacity: Option<usize>,
}

impl FileConfig {
    /// Parses `contents`; `path` is only used for error reporting.
    pub fn from_toml(contents: &str, path: &Path) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Loads `path`. A missing file is an error only when `required`.
    pub fn load(path: &Path, required: bool) -> Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound && !required => {
                return Ok(FileConfig::default());
            }
            Err(e) => {
                return Err(Error::Io {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        let config = Self::from_toml(&contents, path)?;
        info!(path = %path.display(), "using config file");
        Ok(config)
    }
}

/// What one invocation does once its settings are resolved.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Mode {
    /// Print the trailing lines of `files` once, or of stdin when there are
    /// no files.
    Standard { files: Vec<PathBuf> },
    /// Keep printing lines from every file, and from stdin when `stdin` is
    /// set, as they are written.
    Follow { files: Vec<PathBuf>, stdin: bool },
}

impl Mode {
    /// Whether the mode runs `tail` at all. Following stdin alone does not.
    pub fn needs_tail(&self) -> bool {
        match self {
            Mode::Standard { .. } => true,
            Mode::Follow { files, .. } => !files.is_empty(),
        }
    }
}

/// Fully resolved settings for one invocation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RunConfig {
    /// Files to tail, in the order given.
    pub files: Vec<PathBuf>,
    pub number: u64,
    pub follow: bool,
    pub prefix: bool,
    pub channel_capacity: usize,
    /// Whether data is being piped into this process.
    pub stdin_piped: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            files: Vec::new(),
            number: DEFAULT_LINE_COUNT,
            follow: false,
            prefix: false,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            stdin_piped: false,
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity == 0 {
            return Err(Error::validation("channel_capacity must be at least 1"));
        }
        Ok(())
    }

    /// Checks every file exists and picks the mode to run in.
    ///
    /// Fails with [`Error::InvalidPath`] for a file that does not exist and
    /// with [`Error::MissingPath`] when there is neither a file nor piped
    /// input.
    pub fn mode(&self) -> Result<Mode> {
        let files = self
            .files
            .iter()
            .map(|path| tail::validate_path(path))
            .collect::<Result<Vec<_>>>()?;

        if files.is_empty() && !self.stdin_piped {
            return Err(Error::MissingPath);
        }

        if self.follow {
            Ok(Mode::Follow {
                files,
                stdin: self.stdin_piped,
            })
        } else {
            Ok(Mode::Standard { files })
        }
    }

    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            channel_capacity: self.channel_capacity,
        }
    }

    pub fn line_format(&self) -> LineFormat {
        if self.prefix {
            LineFormat::Prefixed
        } else {
            LineFormat::Plain
        }
    }
}
