//! Spec defaulting and validation.
//!
//! Defaulting is a pure transform: it never mutates its input and running it
//! on its own output yields the same value. Rules run in dependency order so
//! a field derived from a sibling sees the sibling's defaulted value.

use std::collections::BTreeMap;

use crate::crd::scheduler_install::{
    InferencePoolRef, SchedulerInstallSpec,
};
use crate::crd::simulator_deployment::{
    GatewayInstanceConfig, SimulatorDeploymentSpec, StageConfig,
};
use crate::crd::{ConnectionPoolConfig, LoadBalancingConfig};
use crate::templates::names;

pub const PROXY_PORT: i32 = 8200;
pub const EPP_IMAGE: &str = "ghcr.io/llm-d/llm-d-inference-scheduler:v0.4.0";
pub const EPP_PORT: i32 = 9002;
pub const EPP_VERBOSITY: i32 = 1;
pub const POOL_NAME: &str = "gaie-inference-scheduling";
pub const GATEWAY_CLASS: &str = "istio";
pub const GATEWAY_LISTENER_PORT: i32 = 80;
pub const GATEWAY_LISTENER_PROTOCOL: &str = "HTTP";
pub const BACKEND_SERVICE: &str = "Service";
pub const BACKEND_INFERENCE_POOL: &str = "InferencePool";
pub const LB_ALGORITHM: &str = "ROUND_ROBIN";
pub const LB_ALGORITHMS: [&str; 5] =
    ["ROUND_ROBIN", "LEAST_REQUEST", "RANDOM", "LEAST_CONN", "PASSTHROUGH"];

pub const SIM_REPLICAS: i32 = 2;
pub const SIM_IMAGE: &str = "docker.io/library/llm-d-simulator:local";
pub const SIM_EPP_PORT: i32 = 8100;
pub const SERVICE_TYPE: &str = "ClusterIP";
pub const SERVICE_TYPES: [&str; 3] = ["ClusterIP", "NodePort", "LoadBalancer"];
pub const STAGE_REPLICAS: i32 = 2;
pub const STANDARD_GATEWAY_IMAGE: &str =
    "cr.kgateway.dev/kgateway-dev/envoy-wrapper:v2.1.1";
pub const ISTIO_GATEWAY_IMAGE: &str = "docker.io/istio/proxyv2:1.28.1";
pub const GATEWAY_INSTANCE_PORT: i32 = 8080;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SpecError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: i32 },
    #[error("{field} must be a valid port, got {value}")]
    PortOutOfRange { field: &'static str, value: i32 },
    #[error("{field} does not support {value:?} (expected one of {allowed})")]
    Unsupported {
        field: &'static str,
        value: String,
        allowed: String,
    },
}

/// Assign `f()` when `slot` still holds its zero value.
fn fill<T: Default + PartialEq>(slot: &mut T, f: impl FnOnce() -> T) {
    if *slot == T::default() {
        *slot = f();
    }
}

fn decode_selector() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("llm-d.ai/role".to_string(), "decode".to_string()),
        ("llm-d.ai/inferenceServing".to_string(), "true".to_string()),
    ])
}

fn default_load_balancing(lb: &mut LoadBalancingConfig) {
    fill(&mut lb.algorithm, || LB_ALGORITHM.to_string());
    if lb.enabled && lb.connection_pool.is_none() {
        lb.connection_pool = Some(ConnectionPoolConfig::default());
    }
    if let Some(pool) = lb.connection_pool.as_mut() {
        fill(&mut pool.http1_max_pending_requests, || 1);
        fill(&mut pool.max_requests_per_connection, || 1);
    }
}

pub fn default_scheduler_install(
    root_name: &str,
    root_namespace: &str,
    spec: &SchedulerInstallSpec,
) -> SchedulerInstallSpec {
    let mut s = spec.clone();
    fill(&mut s.scheduler_namespace, || root_namespace.to_string());

    let proxy = &mut s.proxy_service;
    fill(&mut proxy.name, || names::proxy(root_name));
    fill(&mut proxy.port, || PROXY_PORT);
    let port = proxy.port;
    fill(&mut proxy.target_port, || port);
    fill(&mut proxy.selector, decode_selector);

    let sim_ns = s.simulator_namespace.clone();
    if let Some(epp) = s.epp.as_mut() {
        fill(&mut epp.name, || names::epp(root_name));
        fill(&mut epp.replicas, || 1);
        fill(&mut epp.image, || EPP_IMAGE.to_string());
        fill(&mut epp.port, || EPP_PORT);
        fill(&mut epp.verbosity, || EPP_VERBOSITY);
        fill(&mut epp.pool_name, || POOL_NAME.to_string());
        fill(&mut epp.pool_namespace, || sim_ns.clone());
    }

    if let Some(gw) = s.gateway.as_mut() {
        fill(&mut gw.name, || names::gateway(root_name));
        fill(&mut gw.class_name, || GATEWAY_CLASS.to_string());
        fill(&mut gw.listener_port, || GATEWAY_LISTENER_PORT);
        fill(&mut gw.listener_protocol, || {
            GATEWAY_LISTENER_PROTOCOL.to_string()
        });
    }

    let gateway_name = s
        .gateway
        .as_ref()
        .map(|g| g.name.clone())
        .unwrap_or_else(|| names::gateway(root_name));
    let pool_name = s
        .epp
        .as_ref()
        .map(|e| e.pool_name.clone())
        .unwrap_or_else(|| POOL_NAME.to_string());
    let sched_ns = s.scheduler_namespace.clone();
    if let Some(routing) = s.routing.as_mut() {
        fill(&mut routing.http_route_name, || names::http_route(root_name));
        fill(&mut routing.backend_type, || BACKEND_SERVICE.to_string());
        fill(&mut routing.parent_gateway.name, || gateway_name);
        fill(&mut routing.parent_gateway.namespace, || sched_ns);
        if routing.backend_type == BACKEND_INFERENCE_POOL {
            let pool = routing
                .inference_pool
                .get_or_insert_with(InferencePoolRef::default);
            fill(&mut pool.name, || pool_name);
            fill(&mut pool.namespace, || sim_ns.clone());
        }
    }

    if let Some(lb) = s.destination_rule.as_mut() {
        default_load_balancing(lb);
    }
    s
}

fn default_stage(stage: &mut StageConfig, image: &str) {
    fill(&mut stage.replicas, || STAGE_REPLICAS);
    fill(&mut stage.image, || image.to_string());
    fill(&mut stage.port, || PROXY_PORT);
}

fn default_gateway_instance(gw: &mut GatewayInstanceConfig, image: &str) {
    fill(&mut gw.replicas, || 1);
    fill(&mut gw.image, || image.to_string());
    fill(&mut gw.port, || GATEWAY_INSTANCE_PORT);
}

pub fn default_simulator_deployment(
    root_name: &str,
    spec: &SimulatorDeploymentSpec,
) -> SimulatorDeploymentSpec {
    let mut s = spec.clone();
    fill(&mut s.replicas, || SIM_REPLICAS);
    fill(&mut s.image, || SIM_IMAGE.to_string());
    fill(&mut s.service.name, || names::sim_proxy(root_name));
    fill(&mut s.service.port, || PROXY_PORT);
    fill(&mut s.service.type_, || SERVICE_TYPE.to_string());

    if let Some(epp) = s.epp.as_mut() {
        fill(&mut epp.replicas, || 1);
        fill(&mut epp.image, || EPP_IMAGE.to_string());
        fill(&mut epp.port, || SIM_EPP_PORT);
    }

    let image = s.image.clone();
    for stage in [s.prefill.as_mut(), s.decode.as_mut()].into_iter().flatten()
    {
        default_stage(stage, &image);
    }

    if let Some(igw) = s.inference_gateway.as_mut() {
        if let Some(standard) = igw.standard.as_mut() {
            default_gateway_instance(standard, STANDARD_GATEWAY_IMAGE);
        }
        if let Some(istio) = igw.istio.as_mut() {
            default_gateway_instance(istio, ISTIO_GATEWAY_IMAGE);
        }
    }

    if let Some(lb) = s.load_balancing.as_mut() {
        default_load_balancing(lb);
    }
    s
}

fn positive(field: &'static str, value: i32) -> Result<(), SpecError> {
    if value <= 0 {
        return Err(SpecError::NotPositive { field, value });
    }
    Ok(())
}

fn port(field: &'static str, value: i32) -> Result<(), SpecError> {
    positive(field, value)?;
    if value > 65535 {
        return Err(SpecError::PortOutOfRange { field, value });
    }
    Ok(())
}

fn one_of(
    field: &'static str,
    value: &str,
    allowed: &[&str],
) -> Result<(), SpecError> {
    if allowed.contains(&value) {
        return Ok(());
    }
    Err(SpecError::Unsupported {
        field,
        value: value.to_string(),
        allowed: allowed.join(", "),
    })
}

fn validate_load_balancing(
    prefix: &'static str,
    lb: &LoadBalancingConfig,
) -> Result<(), SpecError> {
    one_of(prefix, &lb.algorithm, &LB_ALGORITHMS)?;
    if let Some(pool) = lb.connection_pool.as_ref() {
        positive(
            "connectionPool.http1MaxPendingRequests",
            pool.http1_max_pending_requests,
        )?;
        positive(
            "connectionPool.maxRequestsPerConnection",
            pool.max_requests_per_connection,
        )?;
    }
    Ok(())
}

/// Validate a defaulted SchedulerInstall spec.
pub fn validate_scheduler_install(
    s: &SchedulerInstallSpec,
) -> Result<(), SpecError> {
    if s.simulator_namespace.trim().is_empty() {
        return Err(SpecError::Missing("spec.simulatorNamespace"));
    }
    port("spec.proxyService.port", s.proxy_service.port)?;
    port("spec.proxyService.targetPort", s.proxy_service.target_port)?;
    if let Some(epp) = s.epp.as_ref() {
        positive("spec.epp.replicas", epp.replicas)?;
        port("spec.epp.port", epp.port)?;
        positive("spec.epp.verbosity", epp.verbosity)?;
    }
    if let Some(gw) = s.gateway.as_ref() {
        port("spec.gateway.listenerPort", gw.listener_port)?;
    }
    if let Some(routing) = s.routing.as_ref() {
        one_of(
            "spec.routing.backendType",
            &routing.backend_type,
            &[BACKEND_SERVICE, BACKEND_INFERENCE_POOL],
        )?;
        if let Some(pool) = routing.inference_pool.as_ref() {
            if pool.port != 0 {
                port("spec.routing.inferencePool.port", pool.port)?;
            }
        }
    }
    if let Some(lb) = s.destination_rule.as_ref() {
        validate_load_balancing("spec.destinationRule.algorithm", lb)?;
    }
    Ok(())
}

/// Validate a defaulted SimulatorDeployment spec.
pub fn validate_simulator_deployment(
    s: &SimulatorDeploymentSpec,
) -> Result<(), SpecError> {
    positive("spec.replicas", s.replicas)?;
    port("spec.service.port", s.service.port)?;
    one_of("spec.service.type", &s.service.type_, &SERVICE_TYPES)?;
    if let Some(epp) = s.epp.as_ref() {
        positive("spec.epp.replicas", epp.replicas)?;
        port("spec.epp.port", epp.port)?;
    }
    if let Some(stage) = s.prefill.as_ref() {
        positive("spec.prefill.replicas", stage.replicas)?;
        port("spec.prefill.port", stage.port)?;
    }
    if let Some(stage) = s.decode.as_ref() {
        positive("spec.decode.replicas", stage.replicas)?;
        port("spec.decode.port", stage.port)?;
    }
    if let Some(igw) = s.inference_gateway.as_ref() {
        for gw in [igw.standard.as_ref(), igw.istio.as_ref()]
            .into_iter()
            .flatten()
        {
            positive("spec.inferenceGateway.replicas", gw.replicas)?;
            port("spec.inferenceGateway.port", gw.port)?;
        }
    }
    if let Some(lb) = s.load_balancing.as_ref() {
        validate_load_balancing("spec.loadBalancing.algorithm", lb)?;
    }
    Ok(())
}
