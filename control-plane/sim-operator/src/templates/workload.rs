//! Small builders for the core workload kinds.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, ContainerPort, EnvVar, EnvVarSource,
    HTTPGetAction, ObjectFieldSelector, PodSpec, PodTemplateSpec, Probe,
    Service, ServicePort, ServiceSpec, TCPSocketAction, Volume,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

pub const APP_NAME_LABEL: &str = "app.kubernetes.io/name";
pub const COMPONENT_LABEL: &str = "llm-d.ai/component";
pub const ROLE_LABEL: &str = "llm-d.ai/role";
pub const INFERENCE_SERVING_LABEL: &str = "llm-d.ai/inferenceServing";

pub fn string_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn tcp_port(name: &str, port: i32) -> ContainerPort {
    ContainerPort {
        name: Some(name.to_string()),
        container_port: port,
        protocol: Some("TCP".to_string()),
        ..Default::default()
    }
}

pub fn service_port(name: &str, port: i32, target: i32) -> ServicePort {
    ServicePort {
        name: Some(name.to_string()),
        port,
        target_port: Some(IntOrString::Int(target)),
        protocol: Some("TCP".to_string()),
        ..Default::default()
    }
}

pub fn field_env(name: &str, field_path: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            field_ref: Some(ObjectFieldSelector {
                api_version: Some("v1".to_string()),
                field_path: field_path.to_string(),
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn value_env(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..Default::default()
    }
}

/// Probe timings: (initial delay, period, timeout, success, failure).
#[derive(Clone, Copy, Debug)]
pub struct Timing(pub i32, pub i32, pub i32, pub i32, pub i32);

fn timed(probe: Probe, t: Timing) -> Probe {
    let Timing(initial, period, timeout, success, failure) = t;
    Probe {
        initial_delay_seconds: (initial > 0).then_some(initial),
        period_seconds: Some(period),
        timeout_seconds: Some(timeout),
        success_threshold: Some(success),
        failure_threshold: Some(failure),
        ..probe
    }
}

pub fn tcp_probe(port: i32, t: Timing) -> Probe {
    timed(
        Probe {
            tcp_socket: Some(TCPSocketAction {
                port: IntOrString::Int(port),
                ..Default::default()
            }),
            ..Default::default()
        },
        t,
    )
}

pub fn http_probe(path: &str, port: i32, t: Timing) -> Probe {
    timed(
        Probe {
            http_get: Some(HTTPGetAction {
                path: Some(path.to_string()),
                port: IntOrString::Int(port),
                scheme: Some("HTTP".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        },
        t,
    )
}

pub fn config_map_volume(name: &str, config_map: &str) -> Volume {
    Volume {
        name: name.to_string(),
        config_map: Some(ConfigMapVolumeSource {
            name: config_map.to_string(),
            default_mode: Some(0o644),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Pod-level shape of a generated Deployment.
#[derive(Clone, Debug, Default)]
pub struct PodShape {
    pub selector: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub service_account: Option<String>,
    pub containers: Vec<Container>,
    pub volumes: Vec<Volume>,
}

pub fn deployment(replicas: i32, pod: PodShape) -> Deployment {
    Deployment {
        metadata: ObjectMeta::default(),
        spec: Some(DeploymentSpec {
            replicas: Some(replicas),
            selector: LabelSelector {
                match_labels: Some(pod.selector),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(pod.labels),
                    annotations: (!pod.annotations.is_empty())
                        .then_some(pod.annotations),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    service_account_name: pod.service_account,
                    containers: pod.containers,
                    volumes: (!pod.volumes.is_empty()).then_some(pod.volumes),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn service(
    type_: &str,
    selector: BTreeMap<String, String>,
    ports: Vec<ServicePort>,
) -> Service {
    Service {
        metadata: ObjectMeta::default(),
        spec: Some(ServiceSpec {
            type_: Some(type_.to_string()),
            selector: Some(selector),
            ports: Some(ports),
            ..Default::default()
        }),
        ..Default::default()
    }
}
