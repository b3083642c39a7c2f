pub mod cleanup;
pub mod engine;
pub mod events;
pub mod merge;
pub mod ownership;
pub mod reconcile;
pub mod status;

use std::fmt::Debug;
use std::sync::Arc;

use futures_util::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service, ServiceAccount};
use kube::runtime::controller::{Action, Error as ControllerError};
use kube::runtime::watcher::Config;
use kube::runtime::Controller;
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::capability::{CachedDiscovery, CapabilityGate, KubeDiscovery};
use crate::config::OperatorConfig;
use crate::crd::{RootKind, SchedulerInstall, SimulatorDeployment};
use crate::defaults::SpecError;
use crate::resources::ObjectKey;
use crate::store::{KubeStore, ObjectStore, StoreError};

pub use engine::{ApplyOutcome, ApplyReport, ReconcileEngine};
pub use events::{EventSink, KubeEvents, NoopEvents};
pub use ownership::OwnershipTable;

#[derive(thiserror::Error, Debug)]
pub enum ReconcileError {
    #[error("invalid spec: {0}")]
    InvalidSpec(#[from] SpecError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("reconciliation cancelled")]
    Cancelled,
}

/// Shared state handed to every reconcile pass.
#[derive(Clone)]
pub struct ControllerContext {
    pub cfg: OperatorConfig,
    pub store: Arc<dyn ObjectStore>,
    pub gate: CapabilityGate,
    pub engine: ReconcileEngine,
    pub ownership: OwnershipTable,
    pub events: Arc<dyn EventSink>,
    pub token: CancellationToken,
}

impl ControllerContext {
    pub fn new(
        cfg: OperatorConfig,
        store: Arc<dyn ObjectStore>,
        gate: CapabilityGate,
        events: Arc<dyn EventSink>,
        token: CancellationToken,
    ) -> Self {
        let ownership = OwnershipTable::new();
        Self {
            engine: ReconcileEngine::new(store.clone(), ownership.clone()),
            cfg,
            store,
            gate,
            ownership,
            events,
            token,
        }
    }

    /// Context wired to a live cluster.
    pub fn for_cluster(
        client: Client,
        cfg: OperatorConfig,
        token: CancellationToken,
    ) -> Self {
        let gate = if cfg.features.discovery {
            let live = Arc::new(KubeDiscovery::new(client.clone()));
            CapabilityGate::new(Arc::new(CachedDiscovery::new(
                live,
                cfg.discovery_ttl(),
            )))
        } else {
            CapabilityGate::fail_open()
        };
        let store = Arc::new(KubeStore::new(
            client.clone(),
            cfg.field_manager.clone(),
        ));
        let events = Arc::new(KubeEvents::new(client, &cfg.field_manager));
        Self::new(cfg, store, gate, events, token)
    }
}

fn scoped<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    K::DynamicType: Default,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

fn error_policy<K>(
    _obj: Arc<K>,
    error: &ReconcileError,
    ctx: Arc<ControllerContext>,
) -> Action {
    warn!(%error, "reconcile failed; requeueing");
    Action::requeue(ctx.cfg.error_requeue_after())
}

async fn run_root<K, F, Fut>(
    client: Client,
    ctx: Arc<ControllerContext>,
    kind: RootKind,
    reconcile: F,
) where
    K: Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Debug
        + Send
        + Sync
        + 'static,
    F: FnMut(Arc<K>, Arc<ControllerContext>) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Result<Action, ReconcileError>>
        + Send
        + 'static,
{
    let ns = ctx.cfg.watch_namespace().map(str::to_string);
    let ns = ns.as_deref();
    let wc = Config::default();
    info!(kind = %K::kind(&()), namespace = ?ns, "starting controller");
    let ownership = ctx.ownership.clone();
    Controller::new(scoped::<K>(&client, ns), wc.clone())
        .owns(scoped::<Deployment>(&client, ns), wc.clone())
        .owns(scoped::<Service>(&client, ns), wc.clone())
        .owns(scoped::<ConfigMap>(&client, ns), wc.clone())
        .owns(scoped::<ServiceAccount>(&client, ns), wc)
        .run(reconcile, error_policy, ctx)
        .for_each(move |res| {
            let ownership = ownership.clone();
            async move {
                match res {
                    Ok((obj_ref, action)) => {
                        info!(object = %obj_ref, ?action, "reconciled")
                    }
                    // deleted while queued; no pass will run for it again
                    Err(ControllerError::ObjectNotFound(obj_ref)) => {
                        info!(object = %obj_ref, "root gone; forgetting its children");
                        let key = ObjectKey::new(
                            kind.resource_kind(),
                            obj_ref.namespace.unwrap_or_default(),
                            obj_ref.name,
                        );
                        ownership.forget(&key).await;
                    }
                    Err(e) => error!(error = %e, "reconcile error"),
                }
            }
        })
        .await;
}

/// Run one controller per enabled root kind until `token` is cancelled.
pub async fn run_controllers(
    client: Client,
    cfg: OperatorConfig,
    token: CancellationToken,
) -> anyhow::Result<()> {
    let ctx = Arc::new(ControllerContext::for_cluster(
        client.clone(),
        cfg.clone(),
        token.clone(),
    ));

    let (sched_on, sim_on) = (
        cfg.features.scheduler_install,
        cfg.features.simulator_deployment,
    );
    let sched = {
        let (client, ctx) = (client.clone(), ctx.clone());
        async move {
            if sched_on {
                run_root::<SchedulerInstall, _, _>(
                    client,
                    ctx,
                    RootKind::SchedulerInstall,
                    reconcile::reconcile_scheduler_install,
                )
                .await;
            }
        }
    };
    let sim = async move {
        if sim_on {
            run_root::<SimulatorDeployment, _, _>(
                client,
                ctx,
                RootKind::SimulatorDeployment,
                reconcile::reconcile_simulator_deployment,
            )
            .await;
        }
    };

    tokio::select! {
        _ = futures_util::future::join(sched, sim) => {
            info!("controllers stopped");
        }
        _ = token.cancelled() => {
            info!("shutdown requested; stopping controllers");
        }
    }
    Ok(())
}

#[cfg(test)]
mod test_support;
#[cfg(test)]
mod engine_tests;
#[cfg(test)]
mod merge_tests;
