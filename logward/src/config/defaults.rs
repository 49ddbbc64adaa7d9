use clap::Args;
use logward_base::consts;

/// Process-wide defaults for the injected sidecar, read from the environment
/// exactly once when the `serve` command starts.
///
/// Every field can be overridden per pod through the matching
/// `logward.dev/...` annotation. The process values never change while the
/// webhook runs, so concurrent admission requests all observe the same
/// defaults.
#[derive(Args, Clone, Debug)]
pub struct SidecarDefaults {
    #[arg(
        long = "docker-image",
        env = "DOCKER_IMAGE",
        default_value = consts::DEFAULT_SIDECAR_IMAGE,
        help = "Container image for the injected log-shipping sidecar."
    )]
    pub docker_image: String,

    #[arg(
        long = "application-log-dir",
        env = "APPLICATION_LOG_DIR",
        default_value = "",
        help = "Directory the application containers write their logs to. Required unless every \
                injected pod carries the application-log-dir annotation."
    )]
    pub application_log_dir: String,

    #[arg(
        long = "time-format",
        env = "TIME_FORMAT",
        default_value = "%Y-%m-%dT%H:%M:%S%z",
        help = "Timestamp format of forwarded log events."
    )]
    pub time_format: String,

    #[arg(
        long = "time-key",
        env = "TIME_KEY",
        default_value = "time",
        help = "Record key holding the event timestamp."
    )]
    pub time_key: String,

    #[arg(
        long = "tag-prefix",
        env = "TAG_PREFIX",
        default_value = "app",
        help = "Tag prefix attached to forwarded log events."
    )]
    pub tag_prefix: String,

    #[arg(
        long = "aggregator-host",
        env = "AGGREGATOR_HOST",
        default_value = "",
        help = "Host of the log aggregator the sidecar ships to. Required unless every injected \
                pod carries the aggregator-host annotation."
    )]
    pub aggregator_host: String,

    #[arg(
        long = "aggregator-port",
        env = "AGGREGATOR_PORT",
        default_value = "24224",
        help = "Port of the log aggregator the sidecar ships to."
    )]
    pub aggregator_port: String,
}
