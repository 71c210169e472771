// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Logging setup for the sentry binaries
//!
//! Every binary installs one global `tracing` subscriber through this crate so
//! that filters, formats and log file locations behave the same everywhere.
//! `RUST_LOG` overrides the level picked on the command line.

pub mod logging_config;

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::Dispatch;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

pub use clap;
pub use logging_config::LoggingConfig;
pub use tracing::Level;

/// Application directory under the platform data directory
const APP_DIR: &str = "sentry";

/// Output format for log messages
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plaintext,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Plaintext => write!(f, "plaintext"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "plaintext" => Ok(LogFormat::Plaintext),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("invalid log format: {s}. Use 'plaintext' or 'json'")),
        }
    }
}

/// Log level as accepted on the command line and in config files
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CliLogLevel {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for Level {
    fn from(level: CliLogLevel) -> Self {
        match level {
            CliLogLevel::Error => Level::ERROR,
            CliLogLevel::Warn => Level::WARN,
            CliLogLevel::Info => Level::INFO,
            CliLogLevel::Debug => Level::DEBUG,
            CliLogLevel::Trace => Level::TRACE,
        }
    }
}

impl fmt::Display for CliLogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CliLogLevel::Error => "error",
            CliLogLevel::Warn => "warn",
            CliLogLevel::Info => "info",
            CliLogLevel::Debug => "debug",
            CliLogLevel::Trace => "trace",
        };
        f.write_str(name)
    }
}

/// Logging flags shared by all binaries; use with `#[command(flatten)]`.
///
/// Logs go to stderr unless `--log-file` or `--log-dir` is given, so that
/// stdout stays free for command output.
#[derive(Clone, Debug, Default, clap::Args, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CliLoggingArgs {
    /// Log verbosity level (default: warn)
    #[arg(long, value_enum)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<CliLogLevel>,

    /// Log output format (default: plaintext)
    #[arg(long, value_enum)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_format: Option<LogFormat>,

    /// Directory for log files
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,

    /// Log filename, relative to --log-dir when one is given
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,
}

impl CliLoggingArgs {
    /// Fill options not given on the command line from a config file section
    pub fn with_config_defaults(mut self, config: &LoggingConfig) -> Self {
        self.log_level = self.log_level.or(config.level);
        self.log_format = self.log_format.or(config.format);
        if self.log_dir.is_none() {
            self.log_dir = config.dir.clone();
        }
        if self.log_file.is_none() {
            self.log_file = config.file.clone();
        }
        self
    }

    pub fn logs_to_file(&self) -> bool {
        self.log_file.is_some() || self.log_dir.is_some()
    }

    /// Install the global subscriber for `component`
    pub fn init(self, component: &str) -> anyhow::Result<()> {
        let level = self.log_level.unwrap_or_default().into();
        let format = self.log_format.unwrap_or_default();
        if self.logs_to_file() {
            let log_path = self.resolve_log_path(component);
            init_to_file(component, level, format, &log_path)
        } else {
            init(component, level, format)
        }
    }

    /// Where file logging writes for `component`:
    /// an absolute `--log-file` is used as is, a relative one is joined to
    /// `--log-dir` when present, and `--log-dir` alone gets `<component>.log`.
    pub fn resolve_log_path(&self, component: &str) -> PathBuf {
        match (&self.log_file, &self.log_dir) {
            (Some(file), _) if Path::new(file).is_absolute() => PathBuf::from(file),
            (Some(file), Some(dir)) => Path::new(dir).join(file),
            (Some(file), None) => PathBuf::from(file),
            (None, Some(dir)) => Path::new(dir).join(format!("{component}.log")),
            (None, None) => standard_log_path(component),
        }
    }
}

/// Platform log location for `component`
pub fn standard_log_path(component: &str) -> PathBuf {
    let file = format!("{component}.log");

    #[cfg(target_os = "macos")]
    {
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/tmp"));
        path.push("Library");
        path.push("Logs");
        path.push(APP_DIR);
        path.push(file);
        path
    }

    #[cfg(not(target_os = "macos"))]
    {
        let mut path = dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("/tmp"));
        path.push(APP_DIR);
        path.push(file);
        path
    }
}

/// Initialize console logging on stderr
pub fn init(component: &str, default_level: Level, format: LogFormat) -> anyhow::Result<()> {
    init_with_writer(component, default_level, format, io::stderr)
}

/// Initialize logging appended to `log_path`, creating its directory
pub fn init_to_file(
    component: &str,
    default_level: Level,
    format: LogFormat,
    log_path: &Path,
) -> anyhow::Result<()> {
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let log_file = std::fs::OpenOptions::new().create(true).append(true).open(log_path)?;
    init_with_writer(component, default_level, format, log_file)
}

pub fn init_with_writer<W>(
    component: &str,
    default_level: Level,
    format: LogFormat,
    writer: W,
) -> anyhow::Result<()>
where
    W: for<'writer> tracing_subscriber::fmt::MakeWriter<'writer> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(component, default_level)));
    tracing::dispatcher::set_global_default(build_dispatch(filter, format, writer))?;
    Ok(())
}

/// Filter used when `RUST_LOG` is unset: the default level everywhere,
/// repeated for the component's own target
pub fn default_directives(component: &str, level: Level) -> String {
    let target = component.replace('-', "_");
    format!("{level},{target}={level}")
}

/// Subscriber for `filter` and `format` writing to `writer`, not yet installed
pub fn build_dispatch<W>(filter: EnvFilter, format: LogFormat, writer: W) -> Dispatch
where
    W: for<'writer> tracing_subscriber::fmt::MakeWriter<'writer> + Send + Sync + 'static,
{
    match format {
        LogFormat::Json => {
            let layer = tracing_subscriber::fmt::layer().with_writer(writer).json();
            #[cfg(debug_assertions)]
            let layer = layer.with_file(true).with_line_number(true);
            Dispatch::new(tracing_subscriber::registry().with(filter).with(layer))
        }
        LogFormat::Plaintext => {
            let layer = tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false);
            #[cfg(debug_assertions)]
            let layer = layer.with_file(true).with_line_number(true);
            Dispatch::new(tracing_subscriber::registry().with(filter).with(layer))
        }
    }
}

/// Log capture for tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    use std::io::Write;
    use std::sync::{Arc, Mutex, MutexGuard};

    use tracing_subscriber::fmt::MakeWriter;

    /// Writer appending every log line to a shared buffer
    #[derive(Clone, Default)]
    pub struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

    pub struct CaptureGuard<'a>(MutexGuard<'a, Vec<u8>>);

    impl CaptureWriter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl Write for CaptureGuard<'_> {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CaptureWriter {
        type Writer = CaptureGuard<'a>;

        fn make_writer(&'a self) -> Self::Writer {
            CaptureGuard(self.0.lock().unwrap())
        }
    }
}
