//! Identity and ownership of tracked streams.

use std::fmt;
use std::sync::Arc;

use tokio::io::AsyncRead;
use tokio::sync::Mutex;

use crate::reader::{DrainState, SharedDrainState};

/// Composite identity of a tracked stream.
///
/// Two keys are equal only when both the name and the id match, so the same
/// name may be registered several times under different ids (for example a
/// file's stdout and stderr).
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct LoggerKey {
    name: String,
    id: String,
}

impl LoggerKey {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        LoggerKey {
            name: name.into(),
            id: id.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for LoggerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.id)
    }
}

/// A byte stream paired with the key it is tracked under.
///
/// The stream is owned exclusively by the logger from construction on and is
/// closed when the last run using it has finished and the logger is dropped.
pub struct Logger {
    key: LoggerKey,
    state: SharedDrainState,
}

impl Logger {
    /// Wraps `stream` for tracking. An empty `id` is accepted here and
    /// replaced with the logger's position when passed to
    /// [`LogTracker::new`](crate::LogTracker::new).
    pub fn new<R>(stream: R, name: impl Into<String>, id: impl Into<String>) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Logger::from_parts(LoggerKey::new(name, id), stream)
    }

    pub(crate) fn from_parts<R>(key: LoggerKey, stream: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Logger {
            key,
            state: Arc::new(Mutex::new(DrainState::new(Box::new(stream)))),
        }
    }

    pub fn key(&self) -> &LoggerKey {
        &self.key
    }

    pub(crate) fn with_id(mut self, id: String) -> Self {
        self.key.id = id;
        self
    }

    pub(crate) fn shared_state(&self) -> SharedDrainState {
        Arc::clone(&self.state)
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("key", &self.key)
            .field("stream", &"<elided>")
            .finish()
    }
}
