use schemars::JsonSchema;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

pub const READY_CONDITION: &str = "Ready";

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Free-form so conditions written by other actors survive a round trip.
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl From<bool> for ConditionStatus {
    fn from(v: bool) -> Self {
        if v {
            ConditionStatus::True
        } else {
            ConditionStatus::False
        }
    }
}

/// Traffic policy rendered into an Istio DestinationRule.
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct LoadBalancingConfig {
    pub enabled: bool,
    /// ROUND_ROBIN, LEAST_REQUEST, RANDOM, LEAST_CONN or PASSTHROUGH
    #[serde(skip_serializing_if = "String::is_empty")]
    pub algorithm: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_pool: Option<ConnectionPoolConfig>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ConnectionPoolConfig {
    pub http1_max_pending_requests: i32,
    pub max_requests_per_connection: i32,
}

/// Status shape shared by both roots as far as readiness is concerned.
pub trait RootStatus:
    Serialize + DeserializeOwned + Default + Clone + PartialEq + Send + Sync
{
    fn conditions(&self) -> &[Condition];
    fn conditions_mut(&mut self) -> &mut Vec<Condition>;
}
