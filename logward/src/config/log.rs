//! Configuration and initialization for application logging.
//!
//! This module provides the `LogConfig` struct for defining logging
//! preferences, such as output targets (stdout, stderr, journald, file) and
//! log level, and the `LogDriver` enum that creates the matching `tracing`
//! layers.
use std::{fs::OpenOptions, path::PathBuf};

use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use tracing_subscriber::{
    Layer, layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt,
};

/// Represents the configuration for the webhook's logging system.
///
/// This struct allows specifying where log messages should be emitted (e.g.,
/// stdout, stderr, journald, or a file) and at what level. It integrates with
/// `serde` for deserialization from the configuration file.
#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LogConfig {
    /// Optional path to a file where logs should be written.
    /// If `None`, logs will not be written to a file.
    #[serde(default = "LogConfig::default_file_path")]
    pub file_path: Option<PathBuf>,

    /// A boolean indicating whether logs should be emitted to `journald`.
    #[serde(default = "LogConfig::default_emit_journald")]
    pub emit_journald: bool,

    /// A boolean indicating whether logs should be emitted to standard
    /// output.
    #[serde(default = "LogConfig::default_emit_stdout")]
    pub emit_stdout: bool,

    /// A boolean indicating whether logs should be emitted to standard error.
    #[serde(default = "LogConfig::default_emit_stderr")]
    pub emit_stderr: bool,

    /// The minimum log level to be recorded.
    /// Messages with a level below this will be filtered out.
    #[serde(default = "LogConfig::default_log_level")]
    #[serde_as(as = "DisplayFromStr")]
    pub level: tracing::Level,
}

impl Default for LogConfig {
    /// By default, logs are set to `INFO` level and emitted to `stdout`
    /// only, which suits the containerized deployment of the webhook.
    fn default() -> Self {
        Self {
            file_path: Self::default_file_path(),
            emit_journald: Self::default_emit_journald(),
            emit_stdout: Self::default_emit_stdout(),
            emit_stderr: Self::default_emit_stderr(),
            level: Self::default_log_level(),
        }
    }
}

impl LogConfig {
    /// Returns the default log level, which is `INFO`.
    #[inline]
    #[must_use]
    pub const fn default_log_level() -> tracing::Level { tracing::Level::INFO }

    /// Returns the default file path for logs, which is `None`.
    #[inline]
    #[must_use]
    pub const fn default_file_path() -> Option<PathBuf> { None }

    /// Returns the default setting for `emit_journald`, which is `false`.
    #[inline]
    #[must_use]
    pub const fn default_emit_journald() -> bool { false }

    /// Returns the default setting for `emit_stdout`, which is `true`.
    #[inline]
    #[must_use]
    pub const fn default_emit_stdout() -> bool { true }

    /// Returns the default setting for `emit_stderr`, which is `false`.
    #[inline]
    #[must_use]
    pub const fn default_emit_stderr() -> bool { false }

    /// Initializes the global `tracing` subscriber registry based on this
    /// `LogConfig`.
    ///
    /// # Panics
    ///
    /// This method panics if called more than once in the same application
    /// lifetime, as `tracing_subscriber::util::SubscriberInitExt::init()`
    /// will panic if a global subscriber is already set.
    pub fn registry(&self) {
        let Self { emit_journald, file_path, emit_stdout, emit_stderr, level: log_level } = self;

        let filter_layer = tracing_subscriber::filter::LevelFilter::from_level(*log_level);

        tracing_subscriber::registry()
            .with(filter_layer)
            .with(emit_journald.then(|| LogDriver::Journald.layer()))
            .with(file_path.clone().map(|path| LogDriver::File(path).layer()))
            .with(emit_stdout.then(|| LogDriver::Stdout.layer()))
            .with(emit_stderr.then(|| LogDriver::Stderr.layer()))
            .init();
    }
}

/// Enumerates the possible log output drivers.
#[derive(Clone, Debug)]
enum LogDriver {
    /// Logs will be written to standard output.
    Stdout,
    /// Logs will be written to standard error.
    Stderr,
    /// Logs will be written to the system's `journald` service.
    Journald,
    /// Logs will be written to a specified file path.
    File(PathBuf),
}

impl LogDriver {
    /// Creates a `tracing_subscriber::Layer` for the specific log driver.
    ///
    /// Returns `None` if the layer could not be created, e.g. when the log
    /// file cannot be opened or `journald` is unavailable.
    #[allow(clippy::type_repetition_in_bounds)]
    fn layer<S>(self) -> Option<Box<dyn Layer<S> + Send + Sync + 'static>>
    where
        S: tracing::Subscriber,
        for<'a> S: LookupSpan<'a>,
    {
        // Shared configuration regardless of where logs are output to.
        let fmt =
            tracing_subscriber::fmt::layer().pretty().with_thread_ids(true).with_thread_names(true);

        // Configure the writer based on the desired log target:
        match self {
            Self::Stdout => Some(Box::new(fmt.with_writer(std::io::stdout))),
            Self::Stderr => Some(Box::new(fmt.with_writer(std::io::stderr))),
            Self::File(path) => {
                let file = OpenOptions::new().create(true).append(true).open(path).ok()?;
                Some(Box::new(fmt.with_writer(file)))
            }
            Self::Journald => Some(Box::new(tracing_journald::layer().ok()?)),
        }
    }
}
