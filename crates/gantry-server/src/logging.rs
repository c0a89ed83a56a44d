//! Logging initialisation.
//!
//! Supports stderr, rolling files or both, in plain or JSON form. File
//! output goes through a non-blocking writer whose guard must be held for
//! the program's lifetime; dropping it early loses buffered lines.

use serde::Deserialize;
use std::io;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Where log output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogOutput {
    /// Stderr only; no guard needed.
    #[default]
    Stderr,
    /// Rolling file only.
    File,
    /// Stderr and rolling file.
    Both,
    /// No logging.
    None,
}

/// File rotation cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogRotation {
    /// One file per day.
    #[default]
    Daily,
    /// One file per hour.
    Hourly,
    /// A single growing file.
    Never,
}

/// Logging configuration section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter level when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of the human format.
    pub structured: bool,
    /// Output target.
    pub output: LogOutput,
    /// Directory for file output.
    pub directory: Option<PathBuf>,
    /// File name prefix.
    pub file_prefix: String,
    /// Rotation cadence for file output.
    pub rotation: LogRotation,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            structured: false,
            output: LogOutput::Stderr,
            directory: None,
            file_prefix: "gantry".to_string(),
            rotation: LogRotation::Daily,
        }
    }
}

/// Guard that flushes buffered file logs on drop.
#[derive(Debug)]
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

impl LoggingConfig {
    /// Initialise the global subscriber.
    ///
    /// Returns `Some(guard)` for file-backed output; the caller must keep
    /// it alive. Returns an error when file output lacks a directory or
    /// a subscriber is already installed.
    pub fn init(&self) -> io::Result<Option<LoggingGuard>> {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        match self.output {
            LogOutput::None => Ok(None),
            LogOutput::Stderr => {
                let subscriber = tracing_subscriber::registry().with(filter);
                if self.structured {
                    subscriber
                        .with(fmt::layer().json().with_writer(io::stderr))
                        .try_init()
                        .map_err(|e| io::Error::other(e.to_string()))?;
                } else {
                    subscriber
                        .with(fmt::layer().with_writer(io::stderr))
                        .try_init()
                        .map_err(|e| io::Error::other(e.to_string()))?;
                }
                Ok(None)
            }
            LogOutput::File => {
                let (writer, guard) = self.file_writer()?;
                let subscriber = tracing_subscriber::registry().with(filter);
                if self.structured {
                    subscriber
                        .with(fmt::layer().json().with_writer(writer))
                        .try_init()
                        .map_err(|e| io::Error::other(e.to_string()))?;
                } else {
                    subscriber
                        .with(fmt::layer().with_writer(writer))
                        .try_init()
                        .map_err(|e| io::Error::other(e.to_string()))?;
                }
                Ok(Some(guard))
            }
            LogOutput::Both => {
                let (writer, guard) = self.file_writer()?;
                let subscriber = tracing_subscriber::registry().with(filter);
                if self.structured {
                    subscriber
                        .with(fmt::layer().json().with_writer(io::stderr))
                        .with(fmt::layer().json().with_writer(writer))
                        .try_init()
                        .map_err(|e| io::Error::other(e.to_string()))?;
                } else {
                    subscriber
                        .with(fmt::layer().with_writer(io::stderr))
                        .with(fmt::layer().with_writer(writer))
                        .try_init()
                        .map_err(|e| io::Error::other(e.to_string()))?;
                }
                Ok(Some(guard))
            }
        }
    }

    fn file_writer(&self) -> io::Result<(tracing_appender::non_blocking::NonBlocking, LoggingGuard)> {
        let dir = self.directory.as_ref().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "file logging requires logging.directory",
            )
        })?;
        std::fs::create_dir_all(dir)?;

        let appender = match self.rotation {
            LogRotation::Daily => tracing_appender::rolling::daily(dir, &self.file_prefix),
            LogRotation::Hourly => tracing_appender::rolling::hourly(dir, &self.file_prefix),
            LogRotation::Never => tracing_appender::rolling::never(dir, &self.file_prefix),
        };
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        Ok((non_blocking, LoggingGuard { _file_guard: guard }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_log_to_stderr_at_info() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.output, LogOutput::Stderr);
        assert!(config.directory.is_none());
    }

    #[test]
    fn file_output_requires_a_directory() {
        let config = LoggingConfig {
            output: LogOutput::File,
            directory: None,
            ..Default::default()
        };
        assert!(config.init().is_err());
    }

    #[test]
    fn output_names_deserialize() {
        #[derive(Deserialize)]
        struct Wrapper {
            output: LogOutput,
            rotation: LogRotation,
        }
        let w: Wrapper = serde_json::from_str(r#"{"output":"both","rotation":"hourly"}"#).unwrap();
        assert_eq!(w.output, LogOutput::Both);
        assert_eq!(w.rotation, LogRotation::Hourly);
    }
}
