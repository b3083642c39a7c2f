//! Desired-state builders for both root kinds.
//!
//! Builders are pure: given a defaulted spec and the resolved capabilities
//! they return every child in apply order, prerequisites first. Optional
//! kinds that the cluster does not serve are left out here so the engine
//! never sees them.

use tracing::info;

use super::descriptor::{ChildDescriptor, DesiredState, RootRef};
use super::epp::{self, EppParams};
use super::gateway::{self, GatewayFlavor};
use super::simulator;
use super::workload::{APP_NAME_LABEL, service, service_port, string_map};
use super::{names, routing, traffic};
use crate::capability::Capabilities;
use crate::crd::{SchedulerInstallSpec, SimulatorDeploymentSpec};
use crate::resources::Kind;

pub const SIM_POOL_NAME: &str = "gaie-sim";

/// Produces the ordered children of one root.
pub trait DesiredStateBuilder {
    fn build(&self, root: &RootRef, caps: &Capabilities) -> Vec<ChildDescriptor>;
}

fn gated(caps: &Capabilities, root: &RootRef, kinds: &[Kind]) -> bool {
    match kinds.iter().find(|k| !caps.supports(**k)) {
        Some(kind) => {
            info!(root = %root.key(), %kind, "kind not served by cluster; skipping");
            false
        }
        None => true,
    }
}

impl DesiredStateBuilder for SchedulerInstallSpec {
    fn build(&self, root: &RootRef, caps: &Capabilities) -> Vec<ChildDescriptor> {
        let mut out = Vec::new();
        let sched_ns = self.scheduler_namespace.as_str();
        let sim_ns = self.simulator_namespace.as_str();

        if let Some(e) = self.epp.as_ref().filter(|e| e.enabled) {
            let params = EppParams {
                root_name: &root.name,
                name: &e.name,
                namespace: sched_ns,
                replicas: e.replicas,
                image: &e.image,
                service_port: e.port,
                verbosity: e.verbosity,
                pool_name: &e.pool_name,
                pool_namespace: &e.pool_namespace,
                rbac_namespace: sim_ns,
                extra_args: &e.args,
                resources: e.resources.as_ref(),
                config_key: "epp-config.yaml",
                mount_path: "/etc/epp",
                volume_name: "epp-config",
            };
            out.extend(epp::descriptors(root, &params));
        }

        if let Some(gw) = self.gateway.as_ref().filter(|g| g.enabled) {
            if gated(caps, root, &[Kind::Gateway]) {
                out.push(gateway::scheduler_gateway(root, sched_ns, gw));
            }
        }

        let proxy = &self.proxy_service;
        out.push(ChildDescriptor::new(
            root,
            sim_ns,
            &proxy.name,
            string_map(&[(APP_NAME_LABEL, root.name.as_str())]),
            DesiredState::Service(service(
                "ClusterIP",
                proxy.selector.clone(),
                vec![service_port("http", proxy.port, proxy.target_port)],
            )),
        ));

        if self.routing.as_ref().is_some_and(|r| r.enabled) {
            if gated(caps, root, &[Kind::HttpRoute, Kind::ReferenceGrant]) {
                out.push(routing::reference_grant(root, self));
            }
            if gated(caps, root, &[Kind::HttpRoute]) {
                out.extend(routing::http_route(root, self));
            }
        }

        if let Some(lb) = self.destination_rule.as_ref().filter(|l| l.enabled) {
            if gated(caps, root, &[Kind::DestinationRule]) {
                out.push(traffic::destination_rule(root, sim_ns, &proxy.name, lb));
            }
        }
        out
    }
}

impl DesiredStateBuilder for SimulatorDeploymentSpec {
    fn build(&self, root: &RootRef, caps: &Capabilities) -> Vec<ChildDescriptor> {
        let mut out = Vec::new();
        let ns = root.namespace.as_str();
        let epp_name = names::sim_epp(&root.name);

        if let Some(e) = self.epp.as_ref().filter(|e| e.enabled) {
            let params = EppParams {
                root_name: &root.name,
                name: &epp_name,
                namespace: ns,
                replicas: e.replicas,
                image: &e.image,
                service_port: e.port,
                verbosity: crate::defaults::EPP_VERBOSITY,
                pool_name: SIM_POOL_NAME,
                pool_namespace: ns,
                rbac_namespace: ns,
                extra_args: &[],
                resources: e.resources.as_ref(),
                config_key: "default-plugins.yaml",
                mount_path: "/config",
                volume_name: "plugins-config-volume",
            };
            out.extend(epp::descriptors(root, &params));
        }

        let (serving, serving_port) = simulator::serving_service(root, self);
        for (name, flavor, cfg) in gateway_instances(root, self) {
            out.extend(gateway::simulator_gateway(
                root,
                &name,
                flavor,
                cfg,
                (&serving, serving_port),
            ));
        }

        for workload in simulator::workloads(root, self) {
            out.extend(workload.descriptors(root));
        }

        if let Some(lb) = self.load_balancing.as_ref().filter(|l| l.enabled) {
            if gated(caps, root, &[Kind::DestinationRule]) {
                out.push(traffic::destination_rule(root, ns, &serving, lb));
            }
        }
        out
    }
}

/// Enabled gateway instances, standard first: (name, flavor, config).
pub fn gateway_instances<'a>(
    root: &RootRef,
    spec: &'a SimulatorDeploymentSpec,
) -> Vec<(
    String,
    GatewayFlavor,
    &'a crate::crd::simulator_deployment::GatewayInstanceConfig,
)> {
    let Some(igw) = spec.inference_gateway.as_ref().filter(|g| g.enabled) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    if let Some(cfg) = igw.standard.as_ref().filter(|c| c.enabled) {
        out.push((names::sim_gateway(&root.name), GatewayFlavor::Standard, cfg));
    }
    if let Some(cfg) = igw.istio.as_ref().filter(|c| c.enabled) {
        out.push((
            names::sim_gateway_istio(&root.name),
            GatewayFlavor::Istio,
            cfg,
        ));
    }
    out
}
