//! The coordinator: a keyed registry of loggers plus the runs started over it.

use std::collections::hash_map::{Entry, HashMap};
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::collector::{self, SharedSink, Unwritten};
use crate::error::{Error, Result};
use crate::key::{Logger, LoggerKey};
use crate::reader;
use crate::sink::{LineFormat, LineSink, WriterSink};

/// Tunables for a [`LogTracker`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TrackerConfig {
    /// How many lines may wait between the drains and the collector. Values
    /// below one are treated as one, a direct hand-off.
    pub channel_capacity: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            channel_capacity: 1,
        }
    }
}

/// Multiplexes lines from any number of registered streams into one sink.
///
/// Streams are registered under a [`LoggerKey`], either up front through
/// [`LogTracker::new`] or later with [`LogTracker::add_log_reader`]. Calling
/// [`LogTracker::start`] launches one drain task per registered stream and a
/// single collector task writing to the sink, and returns a [`StopHandle`].
///
/// A stream keeps its read position across runs: starting again after a stop
/// continues each stream where the previous run left it, beginning with any
/// line that had been read but not yet written.
pub struct LogTracker {
    loggers: Mutex<HashMap<LoggerKey, Logger>>,
    sink: SharedSink,
    config: TrackerConfig,
}

impl LogTracker {
    /// Builds a tracker writing plain lines to stdout.
    ///
    /// Every logger must have a name. A logger without an id is given its
    /// position in `loggers` as id. Loggers whose keys collide replace the
    /// earlier entry.
    pub fn new(loggers: impl IntoIterator<Item = Logger>) -> Result<Self> {
        Self::with_config(loggers, TrackerConfig::default())
    }

    pub fn with_config(
        loggers: impl IntoIterator<Item = Logger>,
        config: TrackerConfig,
    ) -> Result<Self> {
        let mut registry = HashMap::new();

        for (position, logger) in loggers.into_iter().enumerate() {
            if logger.key().name().is_empty() {
                return Err(Error::validation(
                    "logger name was empty, each tracked logger requires a name",
                ));
            }

            let logger = if logger.key().id().is_empty() {
                logger.with_id(position.to_string())
            } else {
                logger
            };

            if let Some(previous) = registry.insert(logger.key().clone(), logger) {
                warn!(logger = %previous.key(), "duplicate logger key, replacing the earlier entry");
            }
        }

        let sink: Box<dyn LineSink> = Box::new(WriterSink::stdout(LineFormat::Plain));

        Ok(LogTracker {
            loggers: Mutex::new(registry),
            sink: Arc::new(Mutex::new(sink)),
            config,
        })
    }

    /// Replaces the sink lines are written to.
    pub fn with_sink(mut self, sink: impl LineSink + 'static) -> Self {
        let sink: Box<dyn LineSink> = Box::new(sink);
        self.sink = Arc::new(Mutex::new(sink));
        self
    }

    /// Registers another stream under `(name, id)`.
    ///
    /// Both parts of the key must be non-empty and the key must not be tracked
    /// already; on error the registry is left unchanged and `stream` is
    /// dropped. A run that is already going does not pick the stream up.
    pub fn add_log_reader<R>(
        &self,
        stream: R,
        name: impl Into<String>,
        id: impl Into<String>,
    ) -> Result<()>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let key = LoggerKey::new(name, id);
        if key.id().is_empty() || key.name().is_empty() {
            return Err(Error::validation(
                "either id or name is empty, both must be populated",
            ));
        }

        match self.loggers.lock().entry(key) {
            Entry::Occupied(entry) => Err(Error::DuplicateKey {
                key: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                debug!(logger = %entry.key(), "log reader registered");
                let logger = Logger::from_parts(entry.key().clone(), stream);
                entry.insert(logger);
                Ok(())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.loggers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.loggers.lock().is_empty()
    }

    pub fn contains(&self, key: &LoggerKey) -> bool {
        self.loggers.lock().contains_key(key)
    }

    /// Keys of every registered logger, in no particular order.
    pub fn keys(&self) -> Vec<LoggerKey> {
        self.loggers.lock().keys().cloned().collect()
    }

    /// Starts draining every currently registered stream into the sink.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> StopHandle {
        let snapshot: Vec<_> = self
            .loggers
            .lock()
            .values()
            .map(|logger| (logger.key().clone(), logger.shared_state()))
            .collect();

        let cancel = CancellationToken::new();
        let unwritten = Arc::new(Unwritten::default());
        let running = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));

        let mut tasks = VecDeque::with_capacity(snapshot.len() + 1);
        for (key, state) in snapshot {
            tasks.push_back(spawn_counted(
                &running,
                reader::drain(key, state, tx.clone(), Arc::clone(&unwritten), cancel.clone()),
            ));
        }
        drop(tx);

        info!(loggers = tasks.len(), "log tracker started");

        // The collector goes last so that joining in order waits for every
        // drain before it.
        tasks.push_back(spawn_counted(
            &running,
            collector::collect(rx, Arc::clone(&self.sink), unwritten, cancel.clone()),
        ));

        StopHandle {
            cancel,
            running,
            tasks: tokio::sync::Mutex::new(tasks),
        }
    }
}

impl fmt::Debug for LogTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogTracker")
            .field("loggers", &self.keys())
            .field("config", &self.config)
            .finish()
    }
}

/// Controls one run started by [`LogTracker::start`].
///
/// Every method may be called any number of times, from any task.
#[derive(Debug)]
pub struct StopHandle {
    cancel: CancellationToken,
    running: Arc<AtomicUsize>,
    tasks: tokio::sync::Mutex<VecDeque<JoinHandle<()>>>,
}

impl StopHandle {
    /// Signals the run to stop without waiting for it.
    ///
    /// Once the collector observes the signal it writes nothing more.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Signals the run to stop and waits until every drain and the collector
    /// have exited.
    pub async fn stop(&self) {
        let first = !self.cancel.is_cancelled();
        self.cancel.cancel();
        self.join().await;
        if first {
            info!("log tracker stopped");
        }
    }

    /// Waits for the run to end, either because every stream reached its end
    /// and all lines were written, or because it was stopped.
    pub async fn wait(&self) {
        self.join().await;
    }

    /// Returns `true` once stopping has been requested.
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Returns `true` once every task of the run has exited.
    pub fn is_finished(&self) -> bool {
        self.running.load(Ordering::Acquire) == 0
    }

    async fn join(&self) {
        let mut tasks = self.tasks.lock().await;

        // Handles are removed only once joined, so a caller dropping this
        // future part way leaves the rest for the next one.
        while let Some(task) = tasks.front_mut() {
            let res = task.await;
            tasks.pop_front();
            if let Err(e) = res {
                error!(error = %e, "log tracker task failed");
            }
        }
    }
}

/// Counts a task as running until it returns, panics or is dropped.
struct Running(Arc<AtomicUsize>);

impl Drop for Running {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

fn spawn_counted<F>(running: &Arc<AtomicUsize>, task: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    running.fetch_add(1, Ordering::AcqRel);
    let guard = Running(Arc::clone(running));

    tokio::spawn(async move {
        let _guard = guard;
        task.await
    })
}
