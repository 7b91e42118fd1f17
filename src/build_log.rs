//! # Build Log
//!
//! The persistent, append-only record of a build run (the "log variant").
//!
//! Every line has the form `[YYYY-MM-DD HH:MM:SS] message`. The file is truncated
//! when the log is created, so it only ever describes the most recent run.
//! Failing to write a line is reported as a warning and never stops the build.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use log::{debug, info, warn};

/// `chrono` format of the timestamp between the brackets.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Sink for build progress messages. Disabled in the plain variant.
#[derive(Debug)]
pub struct BuildLog {
    file: Option<(PathBuf, File)>,
}

impl BuildLog {
    /// A log that only forwards messages to the console logger.
    pub fn disabled() -> Self {
        Self { file: None }
    }

    /// Creates (or truncates) the log file at `path`.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create build log at {}", path.display()))?;
        debug!("Build log initialised at {:?}", path);
        Ok(Self { file: Some((path.to_path_buf(), file)) })
    }

    /// Path of the backing file, if this log writes one.
    pub fn path(&self) -> Option<&Path> {
        self.file.as_ref().map(|(path, _)| path.as_path())
    }

    /// Records a progress message.
    pub fn record(&mut self, message: &str) {
        info!("{}", message);
        self.append(message);
    }

    /// Records a warning.
    pub fn record_warning(&mut self, message: &str) {
        warn!("{}", message);
        self.append(message);
    }

    /// Records a failure.
    pub fn record_error(&mut self, message: &str) {
        log::error!("{}", message);
        self.append(message);
    }

    /// Appends one line of tool output verbatim, blank lines included.
    pub fn record_output(&mut self, line: &str) {
        self.append(line);
    }

    fn append(&mut self, message: &str) {
        let Some((path, file)) = self.file.as_mut() else {
            return;
        };
        let line = format_line(Local::now(), message);
        if let Err(e) = writeln!(file, "{}", line) {
            warn!("Failed to write to build log {:?}: {}", path, e);
        }
    }
}

/// Renders one log line.
pub fn format_line(at: DateTime<Local>, message: &str) -> String {
    format!("[{}] {}", at.format(TIMESTAMP_FORMAT), message)
}

/// Splits a log line back into its timestamp and message.
#[cfg(test)]
pub fn parse_line(line: &str) -> Option<(chrono::NaiveDateTime, &str)> {
    let rest = line.strip_prefix('[')?;
    let (stamp, message) = rest.split_once("] ")?;
    let at = chrono::NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()?;
    Some((at, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_truncates_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("build.log");
        std::fs::write(&path, "OLD\nOLD\n").unwrap();

        let mut log = BuildLog::create(&path).unwrap();
        log.record("Upgrading pip");
        drop(log);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("OLD"));
        assert!(content.contains("Upgrading pip"));
    }

    #[test]
    fn every_line_carries_a_parseable_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("build.log");

        let mut log = BuildLog::create(&path).unwrap();
        log.record("first");
        for line in ["Collecting pip", "", "   ", "Successfully installed pip-24.0"] {
            log.record_output(line);
        }
        log.record_warning("second");
        drop(log);

        let content = std::fs::read_to_string(&path).unwrap();
        let messages: Vec<&str> = content
            .lines()
            .map(|l| parse_line(l).expect("unparseable log line").1)
            .collect();
        assert_eq!(
            messages,
            vec!["first", "Collecting pip", "", "   ", "Successfully installed pip-24.0", "second"]
        );
    }

    #[test]
    fn disabled_log_writes_nothing() {
        let mut log = BuildLog::disabled();
        log.record("nothing to see");
        assert!(log.path().is_none());
    }

    #[test]
    fn parse_line_rejects_garbage() {
        assert!(parse_line("no timestamp here").is_none());
        assert!(parse_line("[not a date] message").is_none());
    }

    #[test]
    fn format_and_parse_agree() {
        let now = Local::now();
        let line = format_line(now, "Packaging");
        let (at, message) = parse_line(&line).unwrap();
        assert_eq!(message, "Packaging");
        assert_eq!(at.format(TIMESTAMP_FORMAT).to_string(), now.format(TIMESTAMP_FORMAT).to_string());
    }
}
