//! Asynchronous fan-in of lines from many byte streams into a single output.
//!
//! A [`LogTracker`] keeps a registry of streams keyed by name and id. Starting
//! it drains every stream line by line on its own task and funnels all lines
//! through one channel to a single collector, which writes them to a
//! [`LineSink`] (stdout by default). Lines from one stream keep their order;
//! lines from different streams interleave as they arrive.
//!
//! ## Example
//!
//! ```no_run
//! use log_tracker::{LogTracker, Logger};
//! use tokio::process::Command;
//! use std::process::Stdio;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut child = Command::new("tail")
//!         .args(["-f", "/var/log/syslog"])
//!         .stdout(Stdio::piped())
//!         .spawn()?;
//!     let stdout = child.stdout.take().expect("stdout is piped");
//!
//!     let tracker = LogTracker::new(vec![Logger::new(stdout, "syslog", "")])?;
//!     tracker.add_log_reader(tokio::io::stdin(), "stdin", "0")?;
//!
//!     // Lines are printed until every stream ends or the run is stopped.
//!     let handle = tracker.start();
//!     tokio::signal::ctrl_c().await?;
//!     handle.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Stopping
//!
//! [`StopHandle::stop`] cancels both the collector and every drain and waits
//! for all of them to exit. Lines that were read but not yet written are kept
//! with their stream, so starting the tracker again picks up exactly where the
//! previous run stopped.

mod collector;
mod error;
mod key;
mod reader;
mod sink;
mod tracker;

pub mod config;
pub mod tail;

pub use error::{Error, Result};
pub use key::{Logger, LoggerKey};
pub use reader::{Line, LogStream};
pub use sink::{BufferSink, LineFormat, LineSink, WriterSink};
pub use tracker::{LogTracker, StopHandle, TrackerConfig};

#[cfg(doctest)]
doc_comment::doctest!("../README.md");
