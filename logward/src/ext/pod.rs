use k8s_openapi::api::core::v1::Pod;
use logward_base::consts::k8s::annotations;

pub trait PodExt {
    fn injection_enabled(&self) -> bool;
}

impl PodExt for Pod {
    fn injection_enabled(&self) -> bool {
        self.metadata
            .annotations
            .as_ref()
            .and_then(|map| map.get(annotations::INJECTION.as_str()))
            .is_some_and(|value| value == annotations::INJECTION_ENABLED)
    }
}
