use std::env;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter, Layer};

const DEFAULT_LOG_FILE: &str = "./logs/tfm.log";
const DEFAULT_CONSOLE_LEVEL: &str = "info";
// The file keeps the executor's per-operation debug lines for later review.
const FILE_LEVEL: &str = "tfm=debug,tfm_core=debug";

/// Where and how much to log, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub console_filter: String,
    pub file_filter: String,
    pub log_file: PathBuf,
}

impl LogSettings {
    /// `TRACING_LEVEL` drives the console, `TFM_LOG_FILE` (or `LOG_FILE_PATH`)
    /// picks the file. `TRACING_LEVEL` also widens the file filter when set.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let console_filter =
            lookup("TRACING_LEVEL").unwrap_or_else(|| DEFAULT_CONSOLE_LEVEL.to_string());
        let file_filter = match lookup("TRACING_LEVEL") {
            Some(level) => format!("{},{}", level, FILE_LEVEL),
            None => FILE_LEVEL.to_string(),
        };
        let log_file = lookup("TFM_LOG_FILE")
            .or_else(|| lookup("LOG_FILE_PATH"))
            .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string());
        Self {
            console_filter,
            file_filter,
            log_file: PathBuf::from(log_file),
        }
    }

    /// Directory and file name for the appender. A bare name lands in `.`.
    fn split_log_file(&self) -> (PathBuf, PathBuf) {
        let dir = match self.log_file.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let name = self
            .log_file
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("tfm.log"));
        (dir, name)
    }
}

/// Console logging on stderr, so command output on stdout stays clean, plus a
/// plain-text file log. Keep the returned guard alive for the whole run or
/// buffered file output is lost.
pub fn init_logger(settings: &LogSettings) -> impl Drop {
    let (dir, name) = settings.split_log_file();
    let file_appender = tracing_appender::rolling::never(&dir, &name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .with_ansi(true)
        .with_filter(EnvFilter::new(&settings.console_filter));

    let file = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_filter(EnvFilter::new(&settings.file_filter));

    tracing_subscriber::registry().with(console).with(file).init();

    info!("Logging to {}", dir.join(&name).display());

    guard
}
