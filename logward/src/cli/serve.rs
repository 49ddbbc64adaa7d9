use std::{net::SocketAddr, path::PathBuf};

use clap::Args;

use crate::{
    cli::Error,
    config::SidecarDefaults,
    inject::SidecarInjector,
    server::{self, ServerConfig},
};

/// Command-line arguments for running the admission webhook.
///
/// The sidecar defaults are flattened in, so the environment variables the
/// deployment manifest sets (`DOCKER_IMAGE`, `AGGREGATOR_HOST`, ...) are
/// captured exactly once when the command starts.
#[derive(Args, Clone)]
pub struct ServeCommand {
    #[arg(
        long = "listen",
        env = "LISTEN_ADDRESS",
        default_value = "0.0.0.0:8080",
        help = "Socket address the TLS admission endpoint binds to."
    )]
    pub listen_address: SocketAddr,

    #[arg(
        long = "tls-cert-file",
        env = "TLS_CERT_FILE",
        help = "Path to the PEM-encoded serving certificate presented to the API server."
    )]
    pub tls_cert_file: PathBuf,

    #[arg(
        long = "tls-key-file",
        env = "TLS_KEY_FILE",
        help = "Path to the PEM-encoded private key matching the serving certificate."
    )]
    pub tls_key_file: PathBuf,

    #[command(flatten)]
    pub defaults: SidecarDefaults,
}

impl ServeCommand {
    /// Starts the admission webhook and blocks until it shuts down.
    ///
    /// # Errors
    ///
    /// Fails when the TLS credentials cannot be loaded or the listener
    /// cannot be bound.
    pub async fn run(self) -> Result<(), Error> {
        let Self { listen_address, tls_cert_file, tls_key_file, defaults } = self;

        let injector = SidecarInjector::new(defaults);
        let server_config = ServerConfig { listen_address, tls_cert_file, tls_key_file };

        server::serve(server_config, injector).await.map_err(Error::from)
    }
}
