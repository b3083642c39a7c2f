use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ResourceRequirements;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::common::{Condition, LoadBalancingConfig, RootStatus};

/// Installs the inference-scheduling stack (endpoint picker, gateway,
/// routing and traffic policy) in front of a simulator namespace.
#[derive(
    CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq,
)]
#[kube(
    group = "sim.llm-d.io",
    version = "v1alpha1",
    kind = "SchedulerInstall",
    plural = "schedulerinstalls",
    shortname = "schedinst",
    namespaced,
    status = "SchedulerInstallStatus"
)]
#[serde(default, rename_all = "camelCase")]
pub struct SchedulerInstallSpec {
    /// Namespace for the picker and gateway. Defaults to the root namespace.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub scheduler_namespace: String,
    /// Namespace where the simulator workloads run. Required.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub simulator_namespace: String,
    pub proxy_service: ProxyServiceConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epp: Option<SchedulerEppConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<SchedulerGatewayConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing: Option<SchedulerRoutingConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_rule: Option<LoadBalancingConfig>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ProxyServiceConfig {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub port: i32,
    pub target_port: i32,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub selector: BTreeMap<String, String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SchedulerEppConfig {
    pub enabled: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub replicas: i32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image: String,
    /// Service port; the container always listens on 9002.
    pub port: i32,
    /// Value passed to `--v`.
    pub verbosity: i32,
    /// Extra arguments appended after the fixed ones.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub pool_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub pool_namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SchedulerGatewayConfig {
    pub enabled: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub class_name: String,
    pub listener_port: i32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub listener_protocol: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SchedulerRoutingConfig {
    pub enabled: bool,
    /// `Service` (the proxy service) or `InferencePool`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub backend_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inference_pool: Option<InferencePoolRef>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub http_route_name: String,
    pub parent_gateway: GatewayRef,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct GatewayRef {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct InferencePoolRef {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    /// Optional backend port; omitted from the route when zero.
    pub port: i32,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SchedulerInstallStatus {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl RootStatus for SchedulerInstallStatus {
    fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self.conditions
    }
}
