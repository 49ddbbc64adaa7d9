use std::{net::SocketAddr, path::PathBuf};

use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display(
        "Failed to load TLS credentials from {} and {}, error: {source}",
        cert_file.display(),
        key_file.display()
    ))]
    LoadTlsCredentials { cert_file: PathBuf, key_file: PathBuf, source: std::io::Error },

    #[snafu(display(
        "Failed to serve the admission webhook on {listen_address}, error: {source}"
    ))]
    ServeAdmission { listen_address: SocketAddr, source: std::io::Error },
}
