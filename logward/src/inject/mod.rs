//! The sidecar injection decision and construction logic.
//!
//! Everything here is synchronous, in-memory work over the decoded admission
//! object; the transport in [`crate::server`] may run any number of
//! mutations concurrently against one shared [`SidecarInjector`].

mod error;
mod settings;
pub mod sidecar;

use std::{collections::BTreeMap, fmt};

use k8s_openapi::api::core::v1::Pod;
use kube::core::DynamicObject;

pub use self::{error::Error, settings::SidecarSettings};
use crate::{config::SidecarDefaults, ext::PodExt};

/// The closed set of object shapes an admission request can carry. Only the
/// pod variant is ever mutated; everything else passes through untouched.
#[derive(Clone, Debug)]
pub enum AdmissionObject {
    Pod(Box<Pod>),
    #[allow(dead_code, reason = "retained for Debug/Clone; only the variant tag is read")]
    Other(Box<DynamicObject>),
}

impl AdmissionObject {
    /// Classifies a decoded admission object.
    ///
    /// An object announcing itself as a core/v1 `Pod` whose body does not
    /// actually deserialize as one is treated as not pod-shaped.
    #[must_use]
    pub fn from_dynamic(object: DynamicObject) -> Self {
        let claims_pod = object
            .types
            .as_ref()
            .is_some_and(|types| types.api_version == "v1" && types.kind == "Pod");
        if claims_pod
            && let Ok(pod) =
                serde_json::to_value(&object).and_then(serde_json::from_value::<Pod>)
        {
            Self::Pod(Box::new(pod))
        } else {
            Self::Other(Box::new(object))
        }
    }

    /// JSON rendering of the pod variant, used to compute admission patches.
    #[must_use]
    pub fn pod_json(&self) -> Option<serde_json::Value> {
        match self {
            Self::Pod(pod) => serde_json::to_value(pod).ok(),
            Self::Other(_) => None,
        }
    }
}

/// What a single mutation call did.
///
/// Both variants mean "continue admission processing"; the mutator never
/// asks for the chain to halt. Genuine failures are reported through
/// [`Error`] instead.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// The shared volume, the per-container mounts and the sidecar were
    /// added.
    Injected,
    /// The object was left untouched.
    Skipped(SkipReason),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SkipReason {
    /// The candidate is not a pod; unrelated kinds are never rejected.
    NotAPod,
    /// The gate annotation is absent or not exactly `enabled`.
    InjectionDisabled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let val = match self {
            Self::NotAPod => "object is not a pod",
            Self::InjectionDisabled => "injection is not enabled",
        };
        f.write_str(val)
    }
}

/// The mutating webhook's decision logic.
///
/// A pure function of the process defaults captured at startup and the
/// candidate object; holds no other state, so one instance is shared
/// read-only across all in-flight admission requests.
#[derive(Clone, Debug)]
pub struct SidecarInjector {
    defaults: SidecarDefaults,
}

impl SidecarInjector {
    #[must_use]
    pub const fn new(defaults: SidecarDefaults) -> Self { Self { defaults } }

    /// Decides whether to inject and rewrites the pod in place.
    ///
    /// Configuration is validated before any list is touched, so a failed
    /// call never leaves a partially mutated pod behind. Applying the
    /// mutation to its own output appends a second volume and sidecar; a
    /// pod is only admitted once, so repeated application is the caller's
    /// concern, not guarded against here.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingRequiredConfig`] when neither the process
    /// defaults nor the pod's annotations yield an aggregator host or an
    /// application log directory.
    pub fn mutate(&self, candidate: &mut AdmissionObject) -> Result<Outcome, Error> {
        let AdmissionObject::Pod(pod) = candidate else {
            return Ok(Outcome::Skipped(SkipReason::NotAPod));
        };

        if !pod.injection_enabled() {
            return Ok(Outcome::Skipped(SkipReason::InjectionDisabled));
        }

        let empty = BTreeMap::new();
        let annotations = pod.metadata.annotations.as_ref().unwrap_or(&empty);
        let settings = SidecarSettings::resolve(&self.defaults, annotations)?;

        let sidecar = sidecar::build(&settings);
        let mount = sidecar::log_volume_mount(&settings.application_log_dir);

        let spec = pod.spec.get_or_insert_default();
        spec.volumes.get_or_insert_default().push(sidecar::log_volume());
        for container in &mut spec.containers {
            container.volume_mounts.get_or_insert_default().push(mount.clone());
        }
        spec.containers.push(sidecar);

        Ok(Outcome::Injected)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use k8s_openapi::api::core::v1::{Container, Pod, PodSpec, Volume, VolumeMount};
    use kube::{api::ObjectMeta, core::DynamicObject};
    use logward_base::consts::k8s::annotations;

    use super::{AdmissionObject, Outcome, SidecarInjector, SkipReason};
    use crate::{config::SidecarDefaults, inject::Error};

    fn defaults() -> SidecarDefaults {
        SidecarDefaults {
            docker_image: "ghcr.io/logward-io/log-forward:latest".to_string(),
            application_log_dir: String::new(),
            time_format: "%Y-%m-%dT%H:%M:%S%z".to_string(),
            time_key: "time".to_string(),
            tag_prefix: "app".to_string(),
            aggregator_host: String::new(),
            aggregator_port: "24224".to_string(),
        }
    }

    fn app_container(name: &str) -> Container {
        Container {
            name: name.to_string(),
            image: Some("docker.io/library/nginx:1.29".to_string()),
            volume_mounts: Some(vec![VolumeMount {
                name: "config".to_string(),
                mount_path: "/etc/app".to_string(),
                ..VolumeMount::default()
            }]),
            ..Container::default()
        }
    }

    fn pod(annotations: BTreeMap<String, String>) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some("workload".to_string()),
                annotations: Some(annotations),
                ..ObjectMeta::default()
            },
            spec: Some(PodSpec {
                containers: vec![app_container("app-a"), app_container("app-b")],
                volumes: Some(vec![Volume {
                    name: "config".to_string(),
                    ..Volume::default()
                }]),
                ..PodSpec::default()
            }),
            ..Pod::default()
        }
    }

    fn enabled_annotations() -> BTreeMap<String, String> {
        BTreeMap::from_iter([
            (annotations::INJECTION.clone(), "enabled".to_string()),
            (annotations::AGGREGATOR_HOST.clone(), "agg.example.com".to_string()),
            (annotations::APPLICATION_LOG_DIR.clone(), "/var/log/app".to_string()),
        ])
    }

    #[test]
    fn test_non_pod_objects_pass_through() {
        let injector = SidecarInjector::new(defaults());
        let object = DynamicObject {
            types: Some(kube::core::TypeMeta {
                api_version: "apps/v1".to_string(),
                kind: "Deployment".to_string(),
            }),
            metadata: ObjectMeta::default(),
            data: serde_json::json!({}),
        };
        let mut candidate = AdmissionObject::from_dynamic(object);

        let outcome = injector.mutate(&mut candidate).expect("never fails for non-pods");
        assert_eq!(outcome, Outcome::Skipped(SkipReason::NotAPod));
        assert!(matches!(candidate, AdmissionObject::Other(_)));
    }

    #[test]
    fn test_gate_missing_leaves_pod_unchanged() {
        let injector = SidecarInjector::new(defaults());
        let original = pod(BTreeMap::new());
        let mut candidate = AdmissionObject::Pod(Box::new(original.clone()));

        let outcome = injector.mutate(&mut candidate).expect("skip is not a failure");
        assert_eq!(outcome, Outcome::Skipped(SkipReason::InjectionDisabled));
        let AdmissionObject::Pod(mutated) = candidate else { panic!("still a pod") };
        assert_eq!(*mutated, original);
    }

    #[test]
    fn test_gate_value_other_than_enabled_leaves_pod_unchanged() {
        let injector = SidecarInjector::new(defaults());
        let original = pod(BTreeMap::from_iter([(
            annotations::INJECTION.clone(),
            "disabled".to_string(),
        )]));
        let mut candidate = AdmissionObject::Pod(Box::new(original.clone()));

        let outcome = injector.mutate(&mut candidate).expect("skip is not a failure");
        assert_eq!(outcome, Outcome::Skipped(SkipReason::InjectionDisabled));
        let AdmissionObject::Pod(mutated) = candidate else { panic!("still a pod") };
        assert_eq!(*mutated, original);
    }

    #[test]
    fn test_missing_required_config_fails_without_mutation() {
        let injector = SidecarInjector::new(defaults());
        let original = pod(BTreeMap::from_iter([(
            annotations::INJECTION.clone(),
            "enabled".to_string(),
        )]));
        let mut candidate = AdmissionObject::Pod(Box::new(original.clone()));

        let err = injector.mutate(&mut candidate).unwrap_err();
        assert_eq!(err, Error::MissingRequiredConfig { field: "aggregator host" });
        let AdmissionObject::Pod(untouched) = candidate else { panic!("still a pod") };
        assert_eq!(*untouched, original);
    }

    #[test]
    fn test_injection_rewrites_containers_and_volumes() {
        let injector = SidecarInjector::new(defaults());
        let mut candidate = AdmissionObject::Pod(Box::new(pod(enabled_annotations())));

        let outcome = injector.mutate(&mut candidate).expect("injectable");
        assert_eq!(outcome, Outcome::Injected);

        let AdmissionObject::Pod(mutated) = candidate else { panic!("still a pod") };
        let spec = mutated.spec.expect("spec is present");

        let volumes = spec.volumes.expect("volumes are present");
        assert_eq!(volumes.len(), 2);
        assert_eq!(volumes[0].name, "config");
        assert_eq!(volumes[1].name, "logward-logs");
        assert!(volumes[1].empty_dir.is_some());

        assert_eq!(spec.containers.len(), 3);
        assert_eq!(spec.containers[0].name, "app-a");
        assert_eq!(spec.containers[1].name, "app-b");
        assert_eq!(spec.containers[2].name, "logward-sidecar");

        // Application containers keep their mounts and gain the shared one.
        for container in &spec.containers[..2] {
            let mounts = container.volume_mounts.as_ref().expect("mounts are present");
            assert_eq!(mounts.len(), 2);
            assert_eq!(mounts[0].name, "config");
            assert_eq!(mounts[1].name, "logward-logs");
            assert_eq!(mounts[1].mount_path, "/var/log/app");
            assert_eq!(mounts[1].read_only, Some(false));
        }

        let sidecar_env: Vec<(String, String)> = spec.containers[2]
            .env
            .iter()
            .flatten()
            .map(|var| (var.name.clone(), var.value.clone().unwrap_or_default()))
            .collect();
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
        assert_eq!(sidecar_env, expected.to_vec());
    }

    #[test]
    fn test_empty_aggregator_port_annotation_omits_env_entry() {
        let injector = SidecarInjector::new(defaults());
        let mut pod_annotations = enabled_annotations();
        let _previous =
            pod_annotations.insert(annotations::AGGREGATOR_PORT.clone(), String::new());
        let mut candidate = AdmissionObject::Pod(Box::new(pod(pod_annotations)));

        assert_eq!(injector.mutate(&mut candidate).expect("injectable"), Outcome::Injected);
        let AdmissionObject::Pod(mutated) = candidate else { panic!("still a pod") };
        let spec = mutated.spec.expect("spec is present");
        let names: Vec<&str> = spec.containers[2]
            .env
            .iter()
            .flatten()
            .map(|var| var.name.as_str())
            .collect();
        assert!(!names.contains(&"AGGREGATOR_PORT"));
    }

    #[test]
    fn test_reapplication_appends_a_second_sidecar() {
        // Applying the mutation to its own output is defined to stack
        // another sidecar and volume, not to be a no-op.
        let injector = SidecarInjector::new(defaults());
        let mut candidate = AdmissionObject::Pod(Box::new(pod(enabled_annotations())));

        assert_eq!(injector.mutate(&mut candidate).expect("first pass"), Outcome::Injected);
        assert_eq!(injector.mutate(&mut candidate).expect("second pass"), Outcome::Injected);

        let AdmissionObject::Pod(mutated) = candidate else { panic!("still a pod") };
        let spec = mutated.spec.expect("spec is present");
        assert_eq!(spec.containers.len(), 4);
        assert_eq!(spec.containers[2].name, "logward-sidecar");
        assert_eq!(spec.containers[3].name, "logward-sidecar");
        assert_eq!(
            spec.volumes.expect("volumes are present").iter().filter(|volume| volume.name == "logward-logs").count(),
            2
        );
    }

    #[test]
    fn test_pod_without_spec_gains_volume_and_sidecar() {
        let injector = SidecarInjector::new(defaults());
        let bare = Pod {
            metadata: ObjectMeta {
                annotations: Some(enabled_annotations()),
                ..ObjectMeta::default()
            },
            ..Pod::default()
        };
        let mut candidate = AdmissionObject::Pod(Box::new(bare));

        assert_eq!(injector.mutate(&mut candidate).expect("injectable"), Outcome::Injected);
        let AdmissionObject::Pod(mutated) = candidate else { panic!("still a pod") };
        let spec = mutated.spec.expect("spec was materialized");
        assert_eq!(spec.containers.len(), 1);
        assert_eq!(spec.containers[0].name, "logward-sidecar");
    }

    #[test]
    fn test_from_dynamic_classifies_pods() {
        let pod_object = DynamicObject {
            types: Some(kube::core::TypeMeta {
                api_version: "v1".to_string(),
                kind: "Pod".to_string(),
            }),
            metadata: ObjectMeta { name: Some("workload".to_string()), ..ObjectMeta::default() },
            data: serde_json::json!({ "spec": { "containers": [] } }),
        };
        assert!(matches!(
            AdmissionObject::from_dynamic(pod_object),
            AdmissionObject::Pod(_)
        ));

        let config_map = DynamicObject {
            types: Some(kube::core::TypeMeta {
                api_version: "v1".to_string(),
                kind: "ConfigMap".to_string(),
            }),
            metadata: ObjectMeta::default(),
            data: serde_json::json!({}),
        };
        assert!(matches!(
            AdmissionObject::from_dynamic(config_map),
            AdmissionObject::Other(_)
        ));
    }
}
