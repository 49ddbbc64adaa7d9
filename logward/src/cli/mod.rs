//! The `logward` binary runs a Kubernetes mutating admission webhook that
//! injects a log-shipping sidecar container and a shared log volume into
//! pods that opt in via the `logward.dev/injection: enabled` annotation.
//!
//! # Examples
//!
//! ```bash
//! # Run the webhook with defaults taken from the environment
//! AGGREGATOR_HOST=aggregator.logging.svc APPLICATION_LOG_DIR=/var/log/app \
//!     logward serve --tls-cert-file /certs/tls.crt --tls-key-file /certs/tls.key
//!
//! # Print the default configuration file
//! logward default-config
//! ```

pub mod error;
mod serve;

use std::{io::Write, path::PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use futures::FutureExt;
use logward_base::CLI_PROGRAM_NAME;
use snafu::ResultExt;
use tokio::runtime::Runtime;

pub use self::error::Error;
use self::serve::ServeCommand;
use crate::{config::Config, shadow};

/// `Cli` is the entry point of the Logward admission webhook binary.
///
/// It parses command-line arguments and dispatches to the matching
/// subcommand.
#[derive(Parser)]
#[command(
    name = CLI_PROGRAM_NAME,
    author,
    version,
    long_version = shadow::CLAP_LONG_VERSION,
    about = "Logward: a Kubernetes admission webhook that injects a log-shipping sidecar.",
    long_about = "Logward is a Kubernetes mutating admission webhook. Pods annotated with \
                  `logward.dev/injection: enabled` gain a log-shipping sidecar container and a \
                  shared volume mounted into every application container, so logs written to \
                  the configured directory are forwarded to a central aggregator without \
                  touching application manifests.",
    color = clap::ColorChoice::Always
)]
pub struct Cli {
    /// The subcommand to execute.
    #[clap(subcommand)]
    commands: Option<Commands>,

    /// Path to the configuration file.
    #[clap(
        long = "config",
        short = 'c',
        env = "LOGWARD_CONFIG_FILE_PATH",
        help = "Specify a configuration file. Defaults to ~/.config/logward/config.yaml or \
                LOGWARD_CONFIG_FILE_PATH env var."
    )]
    config_file: Option<PathBuf>,

    /// Sets the logging level for the application.
    #[clap(
        long = "log-level",
        env = "LOGWARD_LOG_LEVEL",
        help = "Set the logging level (e.g., info, debug, trace)."
    )]
    log_level: Option<tracing::Level>,
}

/// `Commands` enumerates the available subcommands.
#[allow(variant_size_differences)]
#[derive(Clone, Subcommand)]
pub enum Commands {
    /// Displays version information.
    #[command(about = "Display version information")]
    Version,

    /// Generates a shell completion script for the specified shell.
    #[command(about = "Generate shell completion script for the specified shell (bash, zsh, fish)")]
    Completions { shell: clap_complete::Shell },

    /// Outputs the default configuration in YAML format to standard output.
    #[command(about = "Output the default configuration in YAML format")]
    DefaultConfig,

    /// Runs the TLS admission webhook server.
    #[command(alias = "s", about = "Run the TLS admission webhook server")]
    Serve(ServeCommand),
}

impl Default for Cli {
    /// Creates a new `Cli` instance by parsing command-line arguments.
    fn default() -> Self { Self::parse() }
}

impl Cli {
    /// Loads the application configuration, applying any overrides from CLI
    /// arguments.
    ///
    /// An explicitly given configuration file must exist; without one the
    /// default locations are searched and the built-in defaults are used if
    /// nothing is found, since the webhook usually runs in a container
    /// without a config file.
    ///
    /// # Errors
    ///
    /// Returns an `Error` if the configuration file cannot be loaded or
    /// parsed.
    fn load_config(&self) -> Result<Config, Error> {
        let mut config = match &self.config_file {
            Some(path) => Config::load(path)?,
            None => {
                let path = Config::search_config_file_path();
                if path.try_exists().unwrap_or(false) {
                    Config::load(path)?
                } else {
                    Config::default()
                }
            }
        };

        if let Some(log_level) = self.log_level {
            config.log.level = log_level;
        }

        Ok(config)
    }

    /// Executes the selected subcommand.
    ///
    /// Returns the process exit code on success.
    ///
    /// # Errors
    ///
    /// Returns an `Error` if configuration loading fails, the tokio runtime
    /// cannot be initialized, or the webhook server fails to start.
    pub fn run(self) -> Result<i32, Error> {
        match self.commands {
            Some(Commands::Version) => {
                std::io::stdout()
                    .write_all(Self::command().render_long_version().as_bytes())
                    .context(error::WriteStdoutSnafu)?;
                return Ok(0);
            }
            Some(Commands::Completions { shell }) => {
                let mut app = Self::command();
                let bin_name = app.get_name().to_string();
                clap_complete::generate(shell, &mut app, bin_name, &mut std::io::stdout());
                return Ok(0);
            }
            Some(Commands::DefaultConfig) => {
                std::io::stdout()
                    .write_all(Config::template_basic().as_slice())
                    .context(error::WriteStdoutSnafu)?;
                return Ok(0);
            }
            _ => {}
        }

        let config = self.load_config()?;
        config.log.registry();

        let fut = async move {
            match self.commands {
                Some(Commands::Serve(cmd)) => cmd.run().boxed().await?,
                _ => {
                    let help = Self::command().render_long_help().ansi().to_string();
                    std::io::stderr()
                        .write_all(help.as_bytes())
                        .context(error::WriteStdoutSnafu)?;
                    return Ok(-1);
                }
            }

            Ok(0)
        };

        Runtime::new().context(error::InitializeTokioRuntimeSnafu)?.block_on(fut)
    }
}
