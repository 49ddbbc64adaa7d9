use std::collections::BTreeMap;

use logward_base::consts::k8s::annotations;
use snafu::ensure;

use crate::{
    config::SidecarDefaults,
    inject::{Error, error},
};

const DEFAULT_SEND_TIMEOUT: &str = "60s";
const DEFAULT_RECOVER_WAIT: &str = "10s";
const DEFAULT_HARD_TIMEOUT: &str = "120s";

/// The effective sidecar configuration for a single pod: the process
/// defaults overridden by the pod's annotations.
///
/// Built fresh for every admission request and discarded afterwards.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SidecarSettings {
    pub docker_image: String,
    pub application_log_dir: String,
    pub time_format: String,
    pub time_key: String,
    pub tag_prefix: String,
    pub aggregator_host: String,
    pub aggregator_port: String,
    pub send_timeout: String,
    pub recover_wait: String,
    pub hard_timeout: String,
}

impl SidecarSettings {
    /// Resolves the effective configuration for one pod.
    ///
    /// Every field prefers the pod annotation over the process default. The
    /// forwarder timeouts fall back to fixed literals when neither source
    /// sets them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingRequiredConfig`] when the aggregator host or
    /// the application log directory is still empty after resolution; the
    /// aggregator host is checked first.
    pub fn resolve(
        defaults: &SidecarDefaults,
        annotations: &BTreeMap<String, String>,
    ) -> Result<Self, Error> {
        let settings = Self {
            docker_image: annotation_or(
                annotations,
                annotations::DOCKER_IMAGE.as_str(),
                &defaults.docker_image,
            ),
            application_log_dir: annotation_or(
                annotations,
                annotations::APPLICATION_LOG_DIR.as_str(),
                &defaults.application_log_dir,
            ),
            time_format: annotation_or(
                annotations,
                annotations::TIME_FORMAT.as_str(),
                &defaults.time_format,
            ),
            time_key: annotation_or(
                annotations,
                annotations::TIME_KEY.as_str(),
                &defaults.time_key,
            ),
            tag_prefix: annotation_or(
                annotations,
                annotations::TAG_PREFIX.as_str(),
                &defaults.tag_prefix,
            ),
            aggregator_host: annotation_or(
                annotations,
                annotations::AGGREGATOR_HOST.as_str(),
                &defaults.aggregator_host,
            ),
            aggregator_port: annotation_or(
                annotations,
                annotations::AGGREGATOR_PORT.as_str(),
                &defaults.aggregator_port,
            ),
            send_timeout: annotation_or(
                annotations,
                annotations::SEND_TIMEOUT.as_str(),
                DEFAULT_SEND_TIMEOUT,
            ),
            recover_wait: annotation_or(
                annotations,
                annotations::RECOVER_WAIT.as_str(),
                DEFAULT_RECOVER_WAIT,
            ),
            hard_timeout: annotation_or(
                annotations,
                annotations::HARD_TIMEOUT.as_str(),
                DEFAULT_HARD_TIMEOUT,
            ),
        };

        ensure!(
            !settings.aggregator_host.is_empty(),
            error::MissingRequiredConfigSnafu { field: "aggregator host" }
        );
        ensure!(
            !settings.application_log_dir.is_empty(),
            error::MissingRequiredConfigSnafu { field: "application log dir" }
        );

        Ok(settings)
    }
}

/// Looks `key` up in `annotations` and falls back to `fallback` when the key
/// is absent. A present key wins even when its value is empty.
fn annotation_or(annotations: &BTreeMap<String, String>, key: &str, fallback: &str) -> String {
    annotations.get(key).map_or_else(|| fallback.to_string(), Clone::clone)
}
