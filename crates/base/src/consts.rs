pub mod k8s {
    //! Logward-specific Kubernetes definitions.

    pub mod annotations {
        //! Pod annotations recognized by the Logward webhook.
        //!
        //! All keys live under the fixed `logward.dev` namespace; the prefix
        //! is baked in at build time and never changes while the process
        //! runs.

        use std::sync::LazyLock;

        use crate::PROJECT_NAME;

        /// The value the [`INJECTION`] annotation must carry for the webhook
        /// to touch a pod at all.
        pub const INJECTION_ENABLED: &str = "enabled";

        /// The gate annotation: injection happens only when this is exactly
        /// [`INJECTION_ENABLED`].
        pub static INJECTION: LazyLock<String> = LazyLock::new(|| key("injection"));

        /// Overrides the sidecar container image.
        pub static DOCKER_IMAGE: LazyLock<String> = LazyLock::new(|| key("docker-image"));

        /// Overrides the forwarder's send timeout.
        pub static SEND_TIMEOUT: LazyLock<String> = LazyLock::new(|| key("send-timeout"));

        /// Overrides the forwarder's recover wait.
        pub static RECOVER_WAIT: LazyLock<String> = LazyLock::new(|| key("recover-wait"));

        /// Overrides the forwarder's hard timeout.
        pub static HARD_TIMEOUT: LazyLock<String> = LazyLock::new(|| key("hard-timeout"));

        /// Overrides the log aggregator host.
        pub static AGGREGATOR_HOST: LazyLock<String> = LazyLock::new(|| key("aggregator-host"));

        /// Overrides the log aggregator port.
        pub static AGGREGATOR_PORT: LazyLock<String> = LazyLock::new(|| key("aggregator-port"));

        /// Overrides the directory the application writes its logs to.
        pub static APPLICATION_LOG_DIR: LazyLock<String> =
            LazyLock::new(|| key("application-log-dir"));

        /// Overrides the tag prefix attached to forwarded log events.
        pub static TAG_PREFIX: LazyLock<String> = LazyLock::new(|| key("tag-prefix"));

        /// Overrides the record key holding the event timestamp.
        pub static TIME_KEY: LazyLock<String> = LazyLock::new(|| key("time-key"));

        /// Overrides the timestamp format of forwarded log events.
        pub static TIME_FORMAT: LazyLock<String> = LazyLock::new(|| key("time-format"));

        fn key(name: &str) -> String { format!("{PROJECT_NAME}.dev/{name}") }
    }
}

/// Name of the injected sidecar container.
pub const SIDECAR_CONTAINER_NAME: &str = "logward-sidecar";

/// Name of the shared log volume added to mutated pods.
pub const LOG_VOLUME_NAME: &str = "logward-logs";

/// The sidecar image used when neither the environment nor a pod annotation
/// picks one.
pub const DEFAULT_SIDECAR_IMAGE: &str = "ghcr.io/logward-io/log-forward:latest";
