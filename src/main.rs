//! log-tracker - tail(1) with several followed files multiplexed onto stdout
//!
//! Usage:
//!   log-tracker FILE                 Print the last 10 lines of FILE
//!   log-tracker -n 20 FILE           Print the last 20 lines
//!   log-tracker -f FILE [FILE...]    Follow one or more files
//!   cmd | log-tracker -f [FILE...]   Follow piped input alongside files

mod cli;
mod logging;

use std::io::{IsTerminal, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log_tracker::config::{FileConfig, Mode, RunConfig};
use log_tracker::tail::{self, TailCommand, TailProcess};
use log_tracker::{LogTracker, Logger, WriterSink};
use tracing::{debug, info, warn};

use crate::cli::Cli;

fn main() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the tokio runtime")?;

    let res = runtime.block_on(async_main());

    // A blocked read of stdin cannot be cancelled, do not wait for it.
    runtime.shutdown_background();
    res
}

async fn async_main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    let (config_path, required) = cli.config_source();
    let file_config = FileConfig::load(&config_path, required)?;

    let stdin_piped = !std::io::stdin().is_terminal();
    if stdin_piped {
        info!("data is being piped to stdin");
    }

    let config = cli.resolve(file_config, stdin_piped)?;
    debug!(?config, "resolved settings");

    run(&config).await
}

async fn run(config: &RunConfig) -> Result<()> {
    let mode = config.mode()?;

    if mode.needs_tail() {
        tail::ensure_available().await?;
    }

    match mode {
        Mode::Standard { files } => {
            debug!(lines = config.number, "printing trailing lines");
            standard_mode(config, files).await
        }
        Mode::Follow { files, stdin } => {
            info!("beginning follow mode");
            follow_mode(config, files, stdin).await
        }
    }
}

async fn standard_mode(config: &RunConfig, files: Vec<PathBuf>) -> Result<()> {
    let output = TailCommand::new(config.number).paths(files).output().await?;

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(&output.stdout)
        .context("failed to write to stdout")?;
    stdout.flush().context("failed to write to stdout")?;

    // tail reports things like "file truncated" here even on success.
    if !output.stderr.is_empty() {
        std::io::stderr()
            .write_all(&output.stderr)
            .context("failed to write to stderr")?;
    }

    Ok(())
}

async fn follow_mode(config: &RunConfig, files: Vec<PathBuf>, stdin: bool) -> Result<()> {
    let mut tails: Vec<TailProcess> = Vec::with_capacity(files.len());
    let mut loggers: Vec<Logger> = Vec::with_capacity(files.len() * 2 + 1);

    for path in files {
        let mut process = TailCommand::new(config.number)
            .follow(true)
            .path(path)
            .spawn()?;
        loggers.extend(process.take_loggers());
        tails.push(process);
    }

    if stdin {
        // Id is assigned from the logger's position.
        loggers.push(Logger::new(tokio::io::stdin(), "stdin", ""));
    }

    let tracker = LogTracker::with_config(loggers, config.tracker_config())?
        .with_sink(WriterSink::stdout(config.line_format()));

    let handle = tracker.start();

    tokio::select! {
        _ = handle.wait() => {
            debug!("every followed stream ended");
        }
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                warn!(error = %e, "failed to listen for ctrl-c, stopping");
            }
            info!("interrupted, stopping");
            handle.stop().await;
            kill_all(&mut tails).await;
            return Ok(());
        }
    }

    // The run stops itself once its output is closed.
    if handle.is_stopped() {
        debug!("output closed, stopping tail");
        kill_all(&mut tails).await;
        return Ok(());
    }

    for process in &mut tails {
        process.wait().await?;
    }

    Ok(())
}

async fn kill_all(tails: &mut [TailProcess]) {
    for process in tails {
        if let Err(e) = process.kill().await {
            debug!(source = %process.name(), error = %e, "tail already gone");
        }
    }
}
