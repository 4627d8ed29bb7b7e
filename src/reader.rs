//! Everything related to draining lines out of a tracked stream.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::collector::Unwritten;
use crate::key::LoggerKey;

/// Any byte stream a [`Logger`](crate::Logger) can drain.
pub type LogStream = Box<dyn AsyncRead + Send + Unpin>;

type LineReader = Lines<BufReader<LogStream>>;

fn new_linereader(stream: LogStream) -> LineReader {
    BufReader::new(stream).lines()
}

/// A single line captured from a tracked stream.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Line {
    /// The key of the logger the line was read from.
    source: LoggerKey,
    /// The line itself, without its trailing newline.
    line: String,
}

impl Line {
    pub fn new(source: LoggerKey, line: impl Into<String>) -> Self {
        Line {
            source,
            line: line.into(),
        }
    }

    /// Returns the key of the logger the line was read from.
    pub fn source(&self) -> &LoggerKey {
        &self.source
    }

    pub fn line(&self) -> &str {
        &self.line
    }

    /// Returns the internal components that make up a `Line`.
    pub fn into_inner(self) -> (LoggerKey, String) {
        let Line { source, line } = self;

        (source, line)
    }
}

/// Per-logger reading state that outlives a single run.
///
/// `pending` holds lines that were read from the stream but never written,
/// oldest first. They are emitted before anything new is read.
pub(crate) struct DrainState {
    lines: LineReader,
    pub(crate) pending: VecDeque<String>,
    finished: bool,
}

pub(crate) type SharedDrainState = Arc<Mutex<DrainState>>;

impl DrainState {
    pub(crate) fn new(stream: LogStream) -> Self {
        DrainState {
            lines: new_linereader(stream),
            pending: VecDeque::new(),
            finished: false,
        }
    }
}

/// Reads `state`'s stream line by line and hands each line to `tx`, in order.
///
/// Ends on end-of-stream, on a read error (logged, never propagated), when
/// the collector has gone away, or on cancellation. A line that was read but
/// could not be handed off is put back at the front of `pending`, and so are
/// the lines the collector took but never wrote. The stream stays locked
/// until then, so runs over the same logger never overlap.
pub(crate) async fn drain(
    key: LoggerKey,
    state: SharedDrainState,
    tx: mpsc::Sender<Line>,
    unwritten: Arc<Unwritten>,
    cancel: CancellationToken,
) {
    // A previous run may still hold the stream.
    let mut state = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        guard = state.lock_owned() => guard,
    };

    if state.finished && state.pending.is_empty() {
        return;
    }

    debug!(logger = %key, pending = state.pending.len(), "line drain started");

    let mut sent = 0usize;

    loop {
        let line = match state.pending.pop_front() {
            Some(line) => line,
            None if state.finished => break,
            None => {
                // `next_line` is cancel safe, partially read lines stay buffered.
                let res = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    res = state.lines.next_line() => res,
                };

                match res {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        debug!(logger = %key, "stream reached end");
                        state.finished = true;
                        break;
                    }
                    Err(e) => {
                        warn!(logger = %key, error = %e, "stream read failed, no more lines will be drained");
                        state.finished = true;
                        break;
                    }
                }
            }
        };

        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            permit = tx.reserve() => permit.ok(),
        };

        match permit {
            Some(permit) => {
                permit.send(Line::new(key.clone(), line));
                sent += 1;
            }
            None => {
                state.pending.push_front(line);
                break;
            }
        }
    }

    // The collector only settles once every sender is gone.
    drop(tx);

    // Lines the collector holds were read before anything kept above.
    let kept = unwritten.take(&key).await;
    for line in kept.into_iter().rev() {
        state.pending.push_front(line);
    }

    debug!(logger = %key, lines = sent, pending = state.pending.len(), "line drain finished");
}
