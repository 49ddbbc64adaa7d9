use std::collections::BTreeMap;

use k8s_openapi::{
    api::core::v1::{
        Container, EmptyDirVolumeSource, EnvVar, ResourceRequirements, Volume, VolumeMount,
    },
    apimachinery::pkg::api::resource::Quantity,
};
use logward_base::consts;

use crate::inject::SidecarSettings;

const MEMORY_REQUEST: &str = "200Mi";
const CPU_REQUEST: &str = "100m";
const MEMORY_LIMIT: &str = "1000Mi";

/// Builds the log-shipping sidecar container for `settings`.
#[must_use]
pub fn build(settings: &SidecarSettings) -> Container {
    Container {
        name: consts::SIDECAR_CONTAINER_NAME.to_string(),
        image: Some(settings.docker_image.clone()),
        resources: Some(resources()),
        env: Some(env_list(settings)),
        volume_mounts: Some(vec![log_volume_mount(&settings.application_log_dir)]),
        ..Container::default()
    }
}

/// The shared empty-dir volume every mutated pod gains. Its contents live
/// only as long as the pod does.
#[must_use]
pub fn log_volume() -> Volume {
    Volume {
        name: consts::LOG_VOLUME_NAME.to_string(),
        empty_dir: Some(EmptyDirVolumeSource::default()),
        ..Volume::default()
    }
}

/// A read-write mount of the shared log volume at `application_log_dir`.
/// The same mount is attached to the sidecar and to every application
/// container.
#[must_use]
pub fn log_volume_mount(application_log_dir: &str) -> VolumeMount {
    VolumeMount {
        name: consts::LOG_VOLUME_NAME.to_string(),
        mount_path: application_log_dir.to_string(),
        read_only: Some(false),
        ..VolumeMount::default()
    }
}

fn resources() -> ResourceRequirements {
    ResourceRequirements {
        requests: Some(BTreeMap::from_iter([
            ("memory".to_string(), Quantity(MEMORY_REQUEST.to_string())),
            ("cpu".to_string(), Quantity(CPU_REQUEST.to_string())),
        ])),
        // No CPU limit: log shipping may burst while flushing backlogs.
        limits: Some(BTreeMap::from_iter([(
            "memory".to_string(),
            Quantity(MEMORY_LIMIT.to_string()),
        )])),
        ..ResourceRequirements::default()
    }
}

// The forwarder reads its configuration from these variables. Their order is
// fixed; empty values are left out entirely rather than set to "".
fn env_list(settings: &SidecarSettings) -> Vec<EnvVar> {
    let mut env = Vec::new();
    push_env(&mut env, "SEND_TIMEOUT", &settings.send_timeout);
    push_env(&mut env, "RECOVER_WAIT", &settings.recover_wait);
    push_env(&mut env, "HARD_TIMEOUT", &settings.hard_timeout);
    push_env(&mut env, "AGGREGATOR_HOST", &settings.aggregator_host);
    push_env(&mut env, "AGGREGATOR_PORT", &settings.aggregator_port);
    push_env(&mut env, "APPLICATION_LOG_DIR", &settings.application_log_dir);
    push_env(&mut env, "TAG_PREFIX", &settings.tag_prefix);
    push_env(&mut env, "TIME_KEY", &settings.time_key);
    push_env(&mut env, "TIME_FORMAT", &settings.time_format);
    env
}

fn push_env(env: &mut Vec<EnvVar>, name: &str, value: &str) {
    if !value.is_empty() {
        env.push(EnvVar {
            name: name.to_string(),
            value: Some(value.to_string()),
            ..EnvVar::default()
        });
    }
}

#[cfg(test)]
mod tests {
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

    use super::{build, log_volume, log_volume_mount};
    use crate::inject::SidecarSettings;

    fn settings() -> SidecarSettings {
        SidecarSettings {
            docker_image: "ghcr.io/logward-io/log-forward:latest".to_string(),
            application_log_dir: "/var/log/app".to_string(),
            time_format: "%Y-%m-%dT%H:%M:%S%z".to_string(),
            time_key: "time".to_string(),
            tag_prefix: "app".to_string(),
            aggregator_host: "agg.example.com".to_string(),
            aggregator_port: "24224".to_string(),
            send_timeout: "60s".to_string(),
            recover_wait: "10s".to_string(),
            hard_timeout: "120s".to_string(),
        }
    }

    fn env_pairs(container: &k8s_openapi::api::core::v1::Container) -> Vec<(String, String)> {
        container
            .env
            .iter()
            .flatten()
            .map(|var| (var.name.clone(), var.value.clone().unwrap_or_default()))
            .collect()
    }

    #[test]
    fn test_env_list_order() {
        let sidecar = build(&settings());
        let expected = [
            ("SEND_TIMEOUT", "60s"),
            ("RECOVER_WAIT", "10s"),
            ("HARD_TIMEOUT", "120s"),
            ("AGGREGATOR_HOST", "agg.example.com"),
            ("AGGREGATOR_PORT", "24224"),
            ("APPLICATION_LOG_DIR", "/var/log/app"),
            ("TAG_PREFIX", "app"),
            ("TIME_KEY", "time"),
            ("TIME_FORMAT", "%Y-%m-%dT%H:%M:%S%z"),
        ]
        .map(|(name, value)| (name.to_string(), value.to_string()));
        assert_eq!(env_pairs(&sidecar), expected.to_vec());
    }

    #[test]
    fn test_empty_optional_values_are_omitted() {
        let settings = SidecarSettings {
            aggregator_port: String::new(),
            tag_prefix: String::new(),
            time_key: String::new(),
            time_format: String::new(),
            ..settings()
        };
        let sidecar = build(&settings);
        let names: Vec<String> =
            env_pairs(&sidecar).into_iter().map(|(name, _)| name).collect();
        assert_eq!(
            names,
            [
                "SEND_TIMEOUT",
                "RECOVER_WAIT",
                "HARD_TIMEOUT",
                "AGGREGATOR_HOST",
                "APPLICATION_LOG_DIR",
            ]
            .map(ToString::to_string)
            .to_vec()
        );
    }

    #[test]
    fn test_sidecar_identity_and_resources() {
        let sidecar = build(&settings());
        assert_eq!(sidecar.name, "logward-sidecar");
        assert_eq!(sidecar.image.as_deref(), Some("ghcr.io/logward-io/log-forward:latest"));

        let resources = sidecar.resources.expect("resources are set");
        let requests = resources.requests.expect("requests are set");
        assert_eq!(requests.get("memory"), Some(&Quantity("200Mi".to_string())));
        assert_eq!(requests.get("cpu"), Some(&Quantity("100m".to_string())));
        let limits = resources.limits.expect("limits are set");
        assert_eq!(limits.get("memory"), Some(&Quantity("1000Mi".to_string())));
        assert_eq!(limits.get("cpu"), None);
    }

    #[test]
    fn test_sidecar_mounts_log_volume_read_write() {
        let sidecar = build(&settings());
        let mounts = sidecar.volume_mounts.expect("mounts are set");
        assert_eq!(mounts, vec![log_volume_mount("/var/log/app")]);
        assert_eq!(mounts[0].name, "logward-logs");
        assert_eq!(mounts[0].mount_path, "/var/log/app");
        assert_eq!(mounts[0].read_only, Some(false));
    }

    #[test]
    fn test_log_volume_is_empty_dir() {
        let volume = log_volume();
        assert_eq!(volume.name, "logward-logs");
        assert!(volume.empty_dir.is_some());
        assert!(volume.host_path.is_none());
    }
}
