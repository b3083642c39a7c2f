//! Model-serving simulator workloads: per-stage pairs or the single legacy
//! decode deployment.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Container, ResourceRequirements};

use super::descriptor::{ChildDescriptor, DesiredState, RootRef};
use super::workload::{
    APP_NAME_LABEL, INFERENCE_SERVING_LABEL, PodShape, ROLE_LABEL, deployment,
    service, service_port, string_map, tcp_port,
};
use crate::crd::simulator_deployment::{SimulatorDeploymentSpec, StageConfig};

pub const PREFILL: &str = "prefill";
pub const DECODE: &str = "decode";

/// One simulator workload and the Service in front of it.
#[derive(Clone, Debug)]
pub struct SimWorkload<'a> {
    pub stage: &'a str,
    pub deployment_name: String,
    pub service_name: String,
    pub service_type: &'a str,
    pub replicas: i32,
    pub image: &'a str,
    pub port: i32,
    pub resources: Option<&'a ResourceRequirements>,
    pub args: &'a [String],
}

impl SimWorkload<'_> {
    fn labels(&self, root: &RootRef) -> BTreeMap<String, String> {
        string_map(&[
            (ROLE_LABEL, self.stage),
            (INFERENCE_SERVING_LABEL, "true"),
            (APP_NAME_LABEL, root.name.as_str()),
        ])
    }

    pub fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["--model", "random", "--mode", "random"]
            .map(String::from)
            .to_vec();
        args.push("--port".to_string());
        args.push(self.port.to_string());
        args.extend(self.args.iter().cloned());
        args
    }

    fn container(&self) -> Container {
        Container {
            name: self.stage.to_string(),
            image: Some(self.image.to_string()),
            // simulator images are side-loaded into the cluster
            image_pull_policy: Some("Never".to_string()),
            args: Some(self.args()),
            ports: Some(vec![tcp_port("http", self.port)]),
            resources: self.resources.cloned(),
            ..Default::default()
        }
    }

    pub fn descriptors(&self, root: &RootRef) -> Vec<ChildDescriptor> {
        let labels = self.labels(root);
        let workload = ChildDescriptor::new(
            root,
            &root.namespace,
            &self.deployment_name,
            labels.clone(),
            DesiredState::Deployment(deployment(
                self.replicas,
                PodShape {
                    selector: labels.clone(),
                    labels: labels.clone(),
                    containers: vec![self.container()],
                    ..Default::default()
                },
            )),
        )
        .tracked();
        let svc = ChildDescriptor::new(
            root,
            &root.namespace,
            &self.service_name,
            labels.clone(),
            DesiredState::Service(service(
                self.service_type,
                labels,
                vec![service_port("http", self.port, self.port)],
            )),
        );
        vec![workload, svc]
    }
}

fn stage<'a>(
    root: &RootRef,
    name: &'a str,
    cfg: &'a StageConfig,
) -> SimWorkload<'a> {
    let deployment_name = super::names::stage(&root.name, name);
    SimWorkload {
        stage: name,
        service_name: deployment_name.clone(),
        deployment_name,
        service_type: "ClusterIP",
        replicas: cfg.replicas,
        image: &cfg.image,
        port: cfg.port,
        resources: cfg.resources.as_ref(),
        args: &cfg.args,
    }
}

/// Serving workloads in apply order: prefill then decode when any stage is
/// enabled, otherwise the legacy decode deployment behind `service.name`.
pub fn workloads<'a>(
    root: &RootRef,
    spec: &'a SimulatorDeploymentSpec,
) -> Vec<SimWorkload<'a>> {
    if !spec.stage_enabled() {
        return vec![SimWorkload {
            stage: DECODE,
            deployment_name: super::names::legacy_decode(&root.name),
            service_name: spec.service.name.clone(),
            service_type: &spec.service.type_,
            replicas: spec.replicas,
            image: &spec.image,
            port: spec.service.port,
            resources: spec.resources.as_ref(),
            args: &[],
        }];
    }
    [(PREFILL, spec.prefill.as_ref()), (DECODE, spec.decode.as_ref())]
        .into_iter()
        .filter_map(|(name, cfg)| cfg.filter(|c| c.enabled).map(|c| (name, c)))
        .map(|(name, cfg)| stage(root, name, cfg))
        .collect()
}

/// The Service that receives traffic: decode if enabled, else prefill, else
/// the legacy service. Returns (name, port).
pub fn serving_service(
    root: &RootRef,
    spec: &SimulatorDeploymentSpec,
) -> (String, i32) {
    let all = workloads(root, spec);
    let chosen = all
        .iter()
        .find(|w| w.stage == DECODE)
        .or_else(|| all.first());
    match chosen {
        Some(w) => (w.service_name.clone(), w.port),
        None => (spec.service.name.clone(), spec.service.port),
    }
}
