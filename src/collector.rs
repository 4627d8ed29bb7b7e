//! The single consumer that fans every drained line into the sink.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::key::LoggerKey;
use crate::reader::Line;
use crate::sink::LineSink;

pub(crate) type SharedSink = Arc<Mutex<Box<dyn LineSink>>>;

/// Lines a run's collector received but never wrote, handed back to the
/// drains they came from.
///
/// Drains hold on to their stream until the collector has settled, so a
/// later run never reads a stream before its unwritten lines are back in the
/// pending queue.
#[derive(Debug, Default)]
pub(crate) struct Unwritten {
    lines: Mutex<HashMap<LoggerKey, Vec<String>>>,
    settled: CancellationToken,
}

impl Unwritten {
    /// Waits for the collector to exit, then takes the lines it kept for
    /// `key`, oldest first.
    pub(crate) async fn take(&self, key: &LoggerKey) -> Vec<String> {
        self.settled.cancelled().await;
        self.lines.lock().remove(key).unwrap_or_default()
    }

    #[cfg(test)]
    pub(crate) fn settle(&self) {
        self.settled.cancel();
    }

    pub(crate) fn keep(&self, line: Line) {
        let (source, line) = line.into_inner();
        self.lines.lock().entry(source).or_default().push(line);
    }
}

/// Writes lines from `rx` to `sink` until cancelled, until every drain has
/// dropped its sender, or until the sink reports a broken pipe.
///
/// Cancellation takes priority over queued lines: once it is observed no
/// further line is written, and whatever is still queued is kept in
/// `unwritten` for the drain it came from. A broken pipe cancels the whole
/// run.
pub(crate) async fn collect(
    mut rx: mpsc::Receiver<Line>,
    sink: SharedSink,
    unwritten: Arc<Unwritten>,
    cancel: CancellationToken,
) {
    // Settles on every exit, unwinding included, so drains never wait forever.
    let _settle = unwritten.settled.clone().drop_guard();
    let mut written = 0usize;

    loop {
        let line = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                requeue(&mut rx, &unwritten).await;
                break;
            }
            line = rx.recv() => match line {
                Some(line) => line,
                None => break,
            },
        };

        let res = sink.lock().write_line(&line);
        match res {
            Ok(()) => written += 1,
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                warn!(error = %e, "output closed, stopping the run");
                cancel.cancel();
                unwritten.keep(line);
                requeue(&mut rx, &unwritten).await;
                break;
            }
            Err(e) => warn!(logger = %line.source(), error = %e, "failed to write line"),
        }
    }

    if let Err(e) = sink.lock().flush() {
        debug!(error = %e, "failed to flush output");
    }

    debug!(lines = written, "fan-in collector finished");
}

async fn requeue(rx: &mut mpsc::Receiver<Line>, unwritten: &Unwritten) {
    rx.close();

    let mut kept = 0usize;
    while let Some(line) = rx.recv().await {
        unwritten.keep(line);
        kept += 1;
    }

    if kept > 0 {
        debug!(lines = kept, "keeping unwritten lines for the next run");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::BufferSink;

    fn shared_sink(sink: impl LineSink + 'static) -> SharedSink {
        let sink: Box<dyn LineSink> = Box::new(sink);
        Arc::new(Mutex::new(sink))
    }

    /// Accepts `limit` lines, then fails every write with `kind`.
    struct FailingSink {
        inner: BufferSink,
        limit: usize,
        kind: io::ErrorKind,
    }

    impl LineSink for FailingSink {
        fn write_line(&mut self, line: &Line) -> io::Result<()> {
            if self.inner.len() >= self.limit {
                return Err(io::Error::from(self.kind));
            }
            self.inner.write_line(line)
        }
    }

    #[tokio::test]
    async fn test_collect_until_senders_dropped() {
        let sink = BufferSink::new();
        let (tx, rx) = mpsc::channel(4);
        let key = LoggerKey::new("app", "1");
        let unwritten = Arc::new(Unwritten::default());

        tx.send(Line::new(key.clone(), "one")).await.unwrap();
        tx.send(Line::new(key.clone(), "two")).await.unwrap();
        drop(tx);

        collect(
            rx,
            shared_sink(sink.clone()),
            unwritten.clone(),
            CancellationToken::new(),
        )
        .await;

        let lines: Vec<_> = sink.lines().into_iter().map(|l| l.into_inner().1).collect();
        assert_eq!(lines, vec!["one", "two"]);
        assert!(unwritten.take(&key).await.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_collect_keeps_lines_in_order() {
        let sink = BufferSink::new();
        let (tx, rx) = mpsc::channel(4);
        let key = LoggerKey::new("app", "1");
        let unwritten = Arc::new(Unwritten::default());

        tx.send(Line::new(key.clone(), "a")).await.unwrap();
        tx.send(Line::new(key.clone(), "b")).await.unwrap();
        drop(tx);

        let cancel = CancellationToken::new();
        cancel.cancel();

        collect(rx, shared_sink(sink.clone()), unwritten.clone(), cancel).await;

        assert!(sink.is_empty());
        assert_eq!(unwritten.take(&key).await, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_broken_pipe_ends_the_run() {
        let written = BufferSink::new();
        let sink = FailingSink {
            inner: written.clone(),
            limit: 1,
            kind: io::ErrorKind::BrokenPipe,
        };
        let (tx, rx) = mpsc::channel(4);
        let key = LoggerKey::new("app", "1");
        let unwritten = Arc::new(Unwritten::default());
        let cancel = CancellationToken::new();

        for line in ["a", "b", "c"] {
            tx.send(Line::new(key.clone(), line)).await.unwrap();
        }
        drop(tx);

        collect(rx, shared_sink(sink), unwritten.clone(), cancel.clone()).await;

        assert!(cancel.is_cancelled());
        assert_eq!(written.len(), 1);
        assert_eq!(unwritten.take(&key).await, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_other_write_errors_keep_going() {
        let written = BufferSink::new();
        let sink = FailingSink {
            inner: written.clone(),
            limit: 1,
            kind: io::ErrorKind::Other,
        };
        let (tx, rx) = mpsc::channel(4);
        let key = LoggerKey::new("app", "1");
        let cancel = CancellationToken::new();

        for line in ["a", "b", "c"] {
            tx.send(Line::new(key.clone(), line)).await.unwrap();
        }
        drop(tx);

        collect(
            rx,
            shared_sink(sink),
            Arc::new(Unwritten::default()),
            cancel.clone(),
        )
        .await;

        assert!(!cancel.is_cancelled());
        assert_eq!(written.len(), 1);
    }
}
