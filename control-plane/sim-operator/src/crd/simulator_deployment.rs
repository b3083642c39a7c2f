use k8s_openapi::api::core::v1::ResourceRequirements;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::common::{Condition, LoadBalancingConfig, RootStatus};

/// A set of model-serving simulators, optionally split into prefill and
/// decode stages, with an endpoint picker and inference gateways.
#[derive(
    CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq,
)]
#[kube(
    group = "sim.llm-d.io",
    version = "v1alpha1",
    kind = "SimulatorDeployment",
    plural = "simulatordeployments",
    shortname = "simdep",
    namespaced,
    status = "SimulatorDeploymentStatus"
)]
#[serde(default, rename_all = "camelCase")]
pub struct SimulatorDeploymentSpec {
    /// Replicas of the single decode deployment used when no stage is enabled.
    pub replicas: i32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    pub service: ServiceConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_balancing: Option<LoadBalancingConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epp: Option<EppConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefill: Option<StageConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decode: Option<StageConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inference_gateway: Option<InferenceGatewayConfig>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ServiceConfig {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub port: i32,
    /// ClusterIP, NodePort or LoadBalancer
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub type_: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct EppConfig {
    pub enabled: bool,
    pub replicas: i32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image: String,
    pub port: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct StageConfig {
    pub enabled: bool,
    pub replicas: i32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image: String,
    pub port: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    /// Appended after `--model/--mode/--port`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct InferenceGatewayConfig {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standard: Option<GatewayInstanceConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub istio: Option<GatewayInstanceConfig>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct GatewayInstanceConfig {
    pub enabled: bool,
    pub replicas: i32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image: String,
    pub port: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SimulatorDeploymentStatus {
    pub replicas: i32,
    pub ready_replicas: i32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub endpoints: Vec<String>,
    #[serde(rename = "gatewayURL", skip_serializing_if = "String::is_empty")]
    pub gateway_url: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl RootStatus for SimulatorDeploymentStatus {
    fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self.conditions
    }
}

impl SimulatorDeploymentSpec {
    pub fn stage_enabled(&self) -> bool {
        self.prefill.as_ref().is_some_and(|s| s.enabled)
            || self.decode.as_ref().is_some_and(|s| s.enabled)
    }
}
