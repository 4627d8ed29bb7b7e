//! Output targets for multiplexed lines.

use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::reader::Line;

/// Destination the fan-in collector writes every line to, one call per line.
pub trait LineSink: Send {
    /// Writes one complete line.
    fn write_line(&mut self, line: &Line) -> io::Result<()>;

    /// Flushes any buffered output. Called once when a run ends.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// How a [`WriterSink`] renders each line.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum LineFormat {
    /// The line exactly as read.
    #[default]
    Plain,
    /// The line preceded by `[name/id] `.
    Prefixed,
}

/// Writes lines to any [`io::Write`], newline terminated.
#[derive(Debug)]
pub struct WriterSink<W> {
    writer: W,
    format: LineFormat,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W, format: LineFormat) -> Self {
        WriterSink { writer, format }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl WriterSink<io::Stdout> {
    /// A sink writing to the process's standard output.
    pub fn stdout(format: LineFormat) -> Self {
        WriterSink::new(io::stdout(), format)
    }
}

impl<W: Write + Send> LineSink for WriterSink<W> {
    fn write_line(&mut self, line: &Line) -> io::Result<()> {
        match self.format {
            LineFormat::Plain => writeln!(self.writer, "{}", line.line()),
            LineFormat::Prefixed => writeln!(self.writer, "[{}] {}", line.source(), line.line()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Keeps every line in memory. Clones share the same buffer, so a clone
/// handed to a tracker can be inspected from the outside.
#[derive(Clone, Debug, Default)]
pub struct BufferSink {
    lines: Arc<Mutex<Vec<Line>>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every line written so far, in write order.
    pub fn lines(&self) -> Vec<Line> {
        self.lines.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }
}

impl LineSink for BufferSink {
    fn write_line(&mut self, line: &Line) -> io::Result<()> {
        self.lines.lock().push(line.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::LoggerKey;

    #[test]
    fn test_writer_sink_formats() {
        let line = Line::new(LoggerKey::new("app.log", "stdout"), "started");

        let mut plain = WriterSink::new(Vec::new(), LineFormat::Plain);
        plain.write_line(&line).unwrap();
        plain.flush().unwrap();
        assert_eq!(plain.into_inner(), b"started\n");

        let mut prefixed = WriterSink::new(Vec::new(), LineFormat::Prefixed);
        prefixed.write_line(&line).unwrap();
        assert_eq!(prefixed.into_inner(), b"[app.log/stdout] started\n");
    }

    #[test]
    fn test_buffer_sink_clones_share_lines() {
        let sink = BufferSink::new();
        let mut writer = sink.clone();
        assert!(sink.is_empty());

        writer
            .write_line(&Line::new(LoggerKey::new("a", "1"), "one"))
            .unwrap();
        writer
            .write_line(&Line::new(LoggerKey::new("b", "1"), "two"))
            .unwrap();

        assert_eq!(sink.len(), 2);
        let lines: Vec<_> = sink.lines().into_iter().map(|l| l.into_inner().1).collect();
        assert_eq!(lines, vec!["one", "two"]);
    }
}
