use std::sync::Arc;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tokio_util::sync::CancellationToken;

use super::{ControllerContext, NoopEvents};
use crate::capability::CapabilityGate;
use crate::config::OperatorConfig;
use crate::crd::{
    RootKind, SchedulerInstall, SchedulerInstallSpec, SimulatorDeployment,
    SimulatorDeploymentSpec,
};
use crate::store::memory::MemoryStore;
use crate::templates::RootRef;

pub const NS: &str = "default";

pub fn meta(name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(NS.to_string()),
        uid: Some(format!("uid-{name}")),
        generation: Some(1),
        ..Default::default()
    }
}

pub fn root(kind: RootKind, name: &str) -> RootRef {
    RootRef {
        kind,
        name: name.to_string(),
        namespace: NS.to_string(),
        uid: format!("uid-{name}"),
    }
}

/// Build a SchedulerInstall and seed it into `store`.
pub fn seed_install(
    store: &MemoryStore,
    name: &str,
    spec: SchedulerInstallSpec,
) -> SchedulerInstall {
    let mut obj = SchedulerInstall::new(name, spec);
    obj.metadata = meta(name);
    store.insert_typed(root(RootKind::SchedulerInstall, name).key(), &obj);
    obj
}

pub fn seed_simulator(
    store: &MemoryStore,
    name: &str,
    spec: SimulatorDeploymentSpec,
) -> SimulatorDeployment {
    let mut obj = SimulatorDeployment::new(name, spec);
    obj.metadata = meta(name);
    store.insert_typed(root(RootKind::SimulatorDeployment, name).key(), &obj);
    obj
}

pub fn context_with(
    store: Arc<MemoryStore>,
    gate: CapabilityGate,
    cfg: OperatorConfig,
) -> Arc<ControllerContext> {
    Arc::new(ControllerContext::new(
        cfg,
        store,
        gate,
        Arc::new(NoopEvents),
        CancellationToken::new(),
    ))
}

pub fn context(store: Arc<MemoryStore>) -> Arc<ControllerContext> {
    context_with(store, CapabilityGate::fail_open(), OperatorConfig::default())
}
