//! Endpoint picker (EPP): identity, RBAC, plugin config, workload and service.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    ConfigMap, Container, ResourceRequirements, ServiceAccount, VolumeMount,
};
use k8s_openapi::api::rbac::v1::{PolicyRule, Role, RoleBinding, RoleRef, Subject};

use super::descriptor::{ChildDescriptor, DesiredState, RootRef};
use super::workload::{
    APP_NAME_LABEL, COMPONENT_LABEL, PodShape, Timing, deployment, field_env,
    service, service_port, string_map, tcp_port, tcp_probe,
};

pub const GRPC_PORT: i32 = 9002;
pub const GRPC_HEALTH_PORT: i32 = 9003;
pub const METRICS_PORT: i32 = 9090;
pub const POOL_GROUP: &str = "inference.networking.x-k8s.io";

/// Scorer/filter/picker pipeline. Emitted verbatim; each scorer contributes
/// `weight * normalized score`, filters run first, the picker takes the max.
pub const PLUGINS_CONFIG: &str = r#"apiVersion: inference.networking.x-k8s.io/v1alpha1
kind: EndpointPickerConfig
plugins:
- type: load-aware-scorer
- type: prefix-cache-scorer
  parameters:
    hashBlockSize: 5
    maxPrefixBlocksToMatch: 256
    lruCapacityPerServer: 31250
- type: kv-cache-utilization-scorer
- type: decode-filter
- type: max-score-picker
- type: single-profile-handler
schedulingProfiles:
- name: default
  plugins:
  - pluginRef: decode-filter
  - pluginRef: max-score-picker
  - pluginRef: load-aware-scorer
    weight: 1
  - pluginRef: prefix-cache-scorer
    weight: 2
  - pluginRef: kv-cache-utilization-scorer
    weight: 1
"#;

/// Everything that differs between the scheduler's picker and the
/// simulator's picker.
#[derive(Clone, Debug)]
pub struct EppParams<'a> {
    pub root_name: &'a str,
    pub name: &'a str,
    /// Namespace of the picker workload and its service account.
    pub namespace: &'a str,
    pub replicas: i32,
    pub image: &'a str,
    pub service_port: i32,
    pub verbosity: i32,
    pub pool_name: &'a str,
    /// Namespace of the inference pool the picker is pointed at.
    pub pool_namespace: &'a str,
    /// Namespace holding the picker's Role and RoleBinding.
    pub rbac_namespace: &'a str,
    pub extra_args: &'a [String],
    pub resources: Option<&'a ResourceRequirements>,
    pub config_key: &'a str,
    pub mount_path: &'a str,
    pub volume_name: &'a str,
}

impl EppParams<'_> {
    pub fn config_map_name(&self) -> String {
        super::names::epp_config(self.name)
    }

    fn labels(&self) -> BTreeMap<String, String> {
        string_map(&[
            ("app", self.name),
            (APP_NAME_LABEL, self.root_name),
            (COMPONENT_LABEL, "epp"),
        ])
    }

    pub fn args(&self) -> Vec<String> {
        let config_file = format!(
            "{}/{}",
            self.mount_path.trim_end_matches('/'),
            self.config_key
        );
        let mut args: Vec<String> = [
            "--pool-name",
            self.pool_name,
            "--pool-namespace",
            self.pool_namespace,
            "--pool-group",
            POOL_GROUP,
            "--zap-encoder",
            "json",
            "--config-file",
            config_file.as_str(),
            "--kv-cache-usage-percentage-metric",
            "vllm:kv_cache_usage_perc",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        args.extend([
            "--grpc-port".to_string(),
            GRPC_PORT.to_string(),
            "--grpc-health-port".to_string(),
            GRPC_HEALTH_PORT.to_string(),
            "--v".to_string(),
            self.verbosity.to_string(),
            "--tracing=false".to_string(),
        ]);
        args.extend(self.extra_args.iter().cloned());
        args
    }

    fn container(&self) -> Container {
        Container {
            name: "epp".to_string(),
            image: Some(self.image.to_string()),
            image_pull_policy: Some("IfNotPresent".to_string()),
            args: Some(self.args()),
            env: Some(vec![
                field_env("NAMESPACE", "metadata.namespace"),
                field_env("POD_NAME", "metadata.name"),
            ]),
            ports: Some(vec![
                tcp_port("grpc", GRPC_PORT),
                tcp_port("grpc-health", GRPC_HEALTH_PORT),
                tcp_port("metrics", METRICS_PORT),
            ]),
            liveness_probe: Some(tcp_probe(
                GRPC_HEALTH_PORT,
                Timing(5, 10, 1, 1, 3),
            )),
            readiness_probe: Some(tcp_probe(
                GRPC_HEALTH_PORT,
                Timing(0, 2, 1, 1, 3),
            )),
            volume_mounts: Some(vec![VolumeMount {
                name: self.volume_name.to_string(),
                mount_path: self.mount_path.to_string(),
                read_only: Some(true),
                ..Default::default()
            }]),
            resources: self.resources.cloned(),
            ..Default::default()
        }
    }
}

fn rules() -> Vec<PolicyRule> {
    vec![
        PolicyRule {
            api_groups: Some(vec!["".to_string()]),
            resources: Some(
                ["pods", "services", "endpoints"].map(String::from).to_vec(),
            ),
            verbs: ["get", "list", "watch"].map(String::from).to_vec(),
            ..Default::default()
        },
        PolicyRule {
            api_groups: Some(vec![POOL_GROUP.to_string()]),
            resources: Some(
                ["inferencepools", "inferenceobjectives"]
                    .map(String::from)
                    .to_vec(),
            ),
            verbs: ["get", "list", "watch", "update", "patch"]
                .map(String::from)
                .to_vec(),
            ..Default::default()
        },
    ]
}

/// Service account, then RBAC, then config, then the workload that mounts
/// it, then its service.
pub fn descriptors(root: &RootRef, p: &EppParams<'_>) -> Vec<ChildDescriptor> {
    let labels = p.labels();
    let config_name = p.config_map_name();

    let sa = ChildDescriptor::new(
        root,
        p.namespace,
        p.name,
        labels.clone(),
        DesiredState::ServiceAccount(ServiceAccount::default()),
    );

    let role = ChildDescriptor::new(
        root,
        p.rbac_namespace,
        p.name,
        labels.clone(),
        DesiredState::Role(Role {
            rules: Some(rules()),
            ..Default::default()
        }),
    );

    let binding = ChildDescriptor::new(
        root,
        p.rbac_namespace,
        p.name,
        labels.clone(),
        DesiredState::RoleBinding(RoleBinding {
            role_ref: RoleRef {
                api_group: "rbac.authorization.k8s.io".to_string(),
                kind: "Role".to_string(),
                name: p.name.to_string(),
            },
            subjects: Some(vec![Subject {
                kind: "ServiceAccount".to_string(),
                name: p.name.to_string(),
                namespace: Some(p.namespace.to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        }),
    );

    let config = ChildDescriptor::new(
        root,
        p.namespace,
        &config_name,
        labels.clone(),
        DesiredState::ConfigMap(ConfigMap {
            data: Some(BTreeMap::from([(
                p.config_key.to_string(),
                PLUGINS_CONFIG.to_string(),
            )])),
            ..Default::default()
        }),
    );

    let workload = ChildDescriptor::new(
        root,
        p.namespace,
        p.name,
        labels.clone(),
        DesiredState::Deployment(deployment(
            p.replicas,
            PodShape {
                selector: labels.clone(),
                labels: labels.clone(),
                service_account: Some(p.name.to_string()),
                containers: vec![p.container()],
                volumes: vec![super::workload::config_map_volume(
                    p.volume_name,
                    &config_name,
                )],
                ..Default::default()
            },
        )),
    )
    .tracked();

    let svc = ChildDescriptor::new(
        root,
        p.namespace,
        p.name,
        labels.clone(),
        DesiredState::Service(service(
            "ClusterIP",
            labels,
            vec![service_port("grpc", p.service_port, GRPC_PORT)],
        )),
    );

    vec![sa, role, binding, config, workload, svc]
}
