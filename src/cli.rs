//! Command-line interface definition using clap.

use std::path::PathBuf;

use clap::Parser;
use log_tracker::config::{FileConfig, RunConfig, DEFAULT_CONFIG_FILE, DEFAULT_LINE_COUNT};
use log_tracker::Result;

/// Pretty version of the unix tail command, able to follow several files at once
#[derive(Parser, Debug, Default)]
#[command(name = "log-tracker")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Files to tail
    #[arg(value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// File to tail when none is given as an argument
    #[arg(long, value_name = "PATH", env = "LOG_TRACKER_FILEPATH")]
    pub filepath: Option<PathBuf>,

    /// Number of trailing lines to print (default: 10)
    #[arg(short = 'n', long, value_name = "LINES", env = "LOG_TRACKER_NUMBER")]
    pub number: Option<u64>,

    /// Keep printing lines as they are written
    #[arg(short, long, env = "LOG_TRACKER_FOLLOW")]
    pub follow: bool,

    /// Prefix each followed line with the file it came from
    #[arg(short, long, env = "LOG_TRACKER_PREFIX")]
    pub prefix: bool,

    /// Lines that may queue between readers and output (default: 1)
    #[arg(long, value_name = "N")]
    pub channel_capacity: Option<usize>,

    /// Config file (default: .log-tracker.toml, if present)
    #[arg(long, value_name = "PATH", env = "LOG_TRACKER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// The config file to read, and whether it has to exist.
    pub fn config_source(&self) -> (PathBuf, bool) {
        match &self.config {
            Some(path) => (path.clone(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        }
    }

    /// Merges the command line over `file` into the settings for this run.
    pub fn resolve(self, file: FileConfig, stdin_piped: bool) -> Result<RunConfig> {
        let files = if !self.files.is_empty() {
            self.files
        } else {
            self.filepath.or(file.filepath).into_iter().collect()
        };

        let config = RunConfig {
            files,
            number: self.number.or(file.number).unwrap_or(DEFAULT_LINE_COUNT),
            follow: self.follow || file.follow.unwrap_or(false),
            prefix: self.prefix || file.prefix.unwrap_or(false),
            channel_capacity: self
                .channel_capacity
                .or(file.channel_capacity)
                .unwrap_or(RunConfig::default().channel_capacity),
            stdin_piped,
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_defaults() {
        let cli = Cli::parse_from(["log-tracker"]);
        assert!(cli.files.is_empty());
        assert!(!cli.follow);
        assert!(!cli.verbose);
        assert_eq!(cli.number, None);
    }

    #[test]
    fn test_cli_parse_follow_number() {
        let cli = Cli::parse_from(["log-tracker", "-f", "-n", "25", "app.log", "db.log"]);
        assert!(cli.follow);
        assert_eq!(cli.number, Some(25));
        assert_eq!(
            cli.files,
            vec![PathBuf::from("app.log"), PathBuf::from("db.log")]
        );
    }

    #[test]
    fn test_cli_config_source() {
        let cli = Cli::parse_from(["log-tracker"]);
        assert_eq!(
            cli.config_source(),
            (PathBuf::from(DEFAULT_CONFIG_FILE), false)
        );

        let cli = Cli::parse_from(["log-tracker", "--config", "custom.toml"]);
        assert_eq!(cli.config_source(), (PathBuf::from("custom.toml"), true));
    }

    #[test]
    fn test_resolve_defaults() {
        let config = Cli::default().resolve(FileConfig::default(), false).unwrap();
        assert_eq!(config, RunConfig::default());
    }

    #[test]
    fn test_resolve_command_line_wins() {
        let cli = Cli::parse_from(["log-tracker", "-n", "3", "--filepath", "cli.log"]);
        let file = FileConfig {
            filepath: Some(PathBuf::from("file.log")),
            number: Some(50),
            follow: Some(true),
            channel_capacity: Some(4),
            ..FileConfig::default()
        };

        let config = cli.resolve(file, true).unwrap();
        assert_eq!(config.files, vec![PathBuf::from("cli.log")]);
        assert_eq!(config.number, 3);
        assert!(config.follow);
        assert_eq!(config.channel_capacity, 4);
        assert!(config.stdin_piped);
    }

    #[test]
    fn test_resolve_positional_over_filepath() {
        let cli = Cli::parse_from(["log-tracker", "--filepath", "flag.log", "arg.log"]);
        let config = cli.resolve(FileConfig::default(), false).unwrap();
        assert_eq!(config.files, vec![PathBuf::from("arg.log")]);
    }

    #[test]
    fn test_resolve_rejects_zero_capacity() {
        let cli = Cli::parse_from(["log-tracker", "--channel-capacity", "0"]);
        assert!(cli.resolve(FileConfig::default(), false).is_err());
    }
}
